use std::cmp::min;

use glam::Vec3A;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{bvh::row_centroid, Axis, Grow, AABB};

/// Cost of visiting one node
pub const TRAVERSAL_COST: f32 = 1.0;
/// Cost of testing one primitive
pub const PRIMITIVE_COST: f32 = 1.25;
/// Number of SAH bins per axis
pub const BIN_COUNT: usize = 32;
/// Below this count SAH evaluates every primitive centroid instead of bins
pub const FULL_SWEEP_THRESHOLD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPlane {
    pub axis: Axis,
    pub split_position: f32,
}

#[inline]
fn row_aabb(row: &[f32; 6]) -> AABB {
    AABB::from_array(row)
}

pub trait SplitPlaneStrategy {
    /// Pick a split plane for a node given its bounds and the bounds rows of its primitives.
    /// `None` turns the node into a leaf.
    fn get_split_plane(&self, node_bounds: &AABB, primitive_bounds: &[[f32; 6]]) -> Option<SplitPlane>;
}

/// Midpoint of the longest edge
pub struct CenterStrategy;

impl SplitPlaneStrategy for CenterStrategy {
    fn get_split_plane(&self, node_bounds: &AABB, _primitive_bounds: &[[f32; 6]]) -> Option<SplitPlane> {
        let axis = node_bounds.longest_axis();
        Some(SplitPlane {
            axis,
            split_position: node_bounds.center()[axis],
        })
    }
}

/// Mean primitive centroid along the longest edge
pub struct AverageStrategy;

impl SplitPlaneStrategy for AverageStrategy {
    fn get_split_plane(&self, node_bounds: &AABB, primitive_bounds: &[[f32; 6]]) -> Option<SplitPlane> {
        if primitive_bounds.is_empty() {
            return None;
        }
        let axis = node_bounds.longest_axis();
        let sum: f32 = primitive_bounds.iter().map(|row| row_centroid(row, axis)).sum();
        Some(SplitPlane {
            axis,
            split_position: sum / primitive_bounds.len() as f32,
        })
    }
}

/// Surface area heuristic, binned over the centroid bounds
pub struct SahStrategy;

/// Upper edge of bin `i`, which is also the split position scored for bins `0..=i`
#[inline]
fn bin_boundary(centroid_min: f32, width: f32, i: usize) -> f32 {
    centroid_min + width * (i + 1) as f32
}

/// Bin `i` holds the centroids in `(bin_boundary(i - 1), bin_boundary(i)]`. A centroid on a
/// boundary goes to the lower bin, as the partition routes it right.
#[inline]
fn bin_index(centroid: f32, centroid_min: f32, width: f32) -> usize {
    let mut bin = min(BIN_COUNT - 1, ((centroid - centroid_min) / width).max(0.0) as usize);
    while bin > 0 && centroid <= bin_boundary(centroid_min, width, bin - 1) {
        bin -= 1;
    }
    while bin < BIN_COUNT - 1 && centroid > bin_boundary(centroid_min, width, bin) {
        bin += 1;
    }
    bin
}

#[derive(Debug, Clone, Copy, Default)]
struct Bin {
    bounds: AABB,
    count: u32,
}

impl SahStrategy {
    /// Cost of a split where `high` primitives go left (centroid above the plane) and
    /// `low` ones go right
    #[inline]
    fn split_cost(high_count: u32, high_area: f32, low_count: u32, low_area: f32, parent_area: f32) -> f32 {
        TRAVERSAL_COST
            + PRIMITIVE_COST * (high_count as f32 * high_area + low_count as f32 * low_area) / parent_area
    }

    /// Every centroid is a candidate position, for small nodes
    fn full_sweep(primitive_bounds: &[[f32; 6]], axis: Axis, parent_area: f32) -> Option<(f32, f32)> {
        let mut best: Option<(f32, f32)> = None;
        for candidate in primitive_bounds {
            let position = row_centroid(candidate, axis);

            let mut high_box = AABB::default();
            let mut low_box = AABB::default();
            let mut high_count = 0;
            let mut low_count = 0;
            for row in primitive_bounds {
                if row_centroid(row, axis) > position {
                    high_count += 1;
                    high_box.grow(&row_aabb(row));
                } else {
                    low_count += 1;
                    low_box.grow(&row_aabb(row));
                }
            }
            if high_count == 0 || low_count == 0 {
                continue;
            }

            let cost = Self::split_cost(high_count, high_box.area(), low_count, low_box.area(), parent_area);
            if best.map_or(true, |(best_cost, _)| cost < best_cost) {
                best = Some((cost, position));
            }
        }
        best
    }

    fn binned(
        primitive_bounds: &[[f32; 6]],
        axis: Axis,
        centroid_min: f32,
        centroid_max: f32,
        parent_area: f32,
    ) -> Option<(f32, f32)> {
        let mut bins = [Bin::default(); BIN_COUNT];
        let width = (centroid_max - centroid_min) / BIN_COUNT as f32;

        for row in primitive_bounds {
            let bin = &mut bins[bin_index(row_centroid(row, axis), centroid_min, width)];
            bin.count += 1;
            bin.bounds.grow(&row_aabb(row));
        }

        // low_*[i]: bins 0..=i, high_*[i]: bins i+1..
        let mut low_area = [0.0_f32; BIN_COUNT - 1];
        let mut high_area = [0.0_f32; BIN_COUNT - 1];
        let mut low_count = [0_u32; BIN_COUNT - 1];
        let mut high_count = [0_u32; BIN_COUNT - 1];

        let mut low_box = AABB::default();
        let mut high_box = AABB::default();
        let mut low_sum = 0;
        let mut high_sum = 0;

        for i in 0..(BIN_COUNT - 1) {
            low_sum += bins[i].count;
            low_count[i] = low_sum;
            low_box.grow(&bins[i].bounds);
            low_area[i] = low_box.area();

            high_sum += bins[BIN_COUNT - 1 - i].count;
            high_count[BIN_COUNT - 2 - i] = high_sum;
            high_box.grow(&bins[BIN_COUNT - 1 - i].bounds);
            high_area[BIN_COUNT - 2 - i] = high_box.area();
        }

        let mut best: Option<(f32, f32)> = None;
        for i in 0..(BIN_COUNT - 1) {
            if low_count[i] == 0 || high_count[i] == 0 {
                continue;
            }
            let cost = Self::split_cost(high_count[i], high_area[i], low_count[i], low_area[i], parent_area);
            if best.map_or(true, |(best_cost, _)| cost < best_cost) {
                best = Some((cost, bin_boundary(centroid_min, width, i)));
            }
        }
        best
    }
}

impl SplitPlaneStrategy for SahStrategy {
    fn get_split_plane(&self, node_bounds: &AABB, primitive_bounds: &[[f32; 6]]) -> Option<SplitPlane> {
        let count = primitive_bounds.len();
        let parent_area = node_bounds.area();
        if count < 2 || parent_area <= 0.0 {
            return AverageStrategy.get_split_plane(node_bounds, primitive_bounds);
        }

        let mut centroid_min = Vec3A::splat(f32::INFINITY);
        let mut centroid_max = Vec3A::splat(-f32::INFINITY);
        for row in primitive_bounds {
            let centroid = row_aabb(row).center();
            centroid_min = centroid_min.min(centroid);
            centroid_max = centroid_max.max(centroid);
        }

        let mut best: Option<(f32, SplitPlane)> = None;
        for axis in Axis::iter() {
            if centroid_max[axis] <= centroid_min[axis] {
                continue;
            }
            let candidate = if count < FULL_SWEEP_THRESHOLD {
                Self::full_sweep(primitive_bounds, axis, parent_area)
            } else {
                Self::binned(primitive_bounds, axis, centroid_min[axis], centroid_max[axis], parent_area)
            };
            if let Some((cost, split_position)) = candidate {
                if best.map_or(true, |(best_cost, _)| cost < best_cost) {
                    best = Some((cost, SplitPlane { axis, split_position }));
                }
            }
        }

        let leaf_cost = PRIMITIVE_COST * count as f32;
        match best {
            Some((cost, plane)) if cost < leaf_cost => Some(plane),
            _ => AverageStrategy.get_split_plane(node_bounds, primitive_bounds),
        }
    }
}

/// Split heuristic selected by name in build options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SplitStrategy {
    #[default]
    Center,
    Average,
    Sah,
}

impl SplitPlaneStrategy for SplitStrategy {
    #[inline]
    fn get_split_plane(&self, node_bounds: &AABB, primitive_bounds: &[[f32; 6]]) -> Option<SplitPlane> {
        match self {
            SplitStrategy::Center => CenterStrategy.get_split_plane(node_bounds, primitive_bounds),
            SplitStrategy::Average => AverageStrategy.get_split_plane(node_bounds, primitive_bounds),
            SplitStrategy::Sah => SahStrategy.get_split_plane(node_bounds, primitive_bounds),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use approx::*;
    use glam::Vec3A;
    use strum::IntoEnumIterator;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{bin_boundary, bin_index};
    use crate::*;

    fn unit_row(center: Vec3A) -> [f32; 6] {
        AABB::new(center - Vec3A::splat(0.1), center + Vec3A::splat(0.1)).to_array()
    }

    fn bounds_of(rows: &[[f32; 6]]) -> AABB {
        let mut aabb = AABB::default();
        for row in rows {
            aabb.grow(&AABB::from_array(row));
        }
        aabb
    }

    #[test]
    fn strategy_names() {
        for strategy in SplitStrategy::iter() {
            assert_eq!(SplitStrategy::from_str(&strategy.to_string()).unwrap(), strategy);
        }
        assert_eq!(SplitStrategy::from_str("sah").unwrap(), SplitStrategy::Sah);
        assert!(SplitStrategy::from_str("median").is_err());
    }

    #[test]
    fn center_splits_longest_axis() {
        let rows = [unit_row(Vec3A::ZERO), unit_row(Vec3A::new(0.0, 4.0, 0.0))];
        let plane = CenterStrategy.get_split_plane(&bounds_of(&rows), &rows).unwrap();
        assert_eq!(plane.axis, Axis::Y);
        assert_relative_eq!(plane.split_position, 2.0);
    }

    #[test]
    fn average_uses_centroid_mean() {
        let rows = [
            unit_row(Vec3A::ZERO),
            unit_row(Vec3A::new(1.0, 0.0, 0.0)),
            unit_row(Vec3A::new(8.0, 0.0, 0.0)),
        ];
        let plane = AverageStrategy.get_split_plane(&bounds_of(&rows), &rows).unwrap();
        assert_eq!(plane.axis, Axis::X);
        assert_relative_eq!(plane.split_position, 3.0);
    }

    #[test]
    fn sah_separates_clusters() {
        let mut rows = Vec::new();
        for i in 0..20 {
            rows.push(unit_row(Vec3A::new(i as f32 * 0.01, 0.0, 0.0)));
            rows.push(unit_row(Vec3A::new(10.0 + i as f32 * 0.01, 0.0, 0.0)));
        }
        let plane = SahStrategy.get_split_plane(&bounds_of(&rows), &rows).unwrap();
        assert_eq!(plane.axis, Axis::X);
        assert!(plane.split_position > 0.2 && plane.split_position < 10.0);
    }

    #[test]
    fn sah_small_node_sweeps_centroids() {
        let rows = [
            unit_row(Vec3A::ZERO),
            unit_row(Vec3A::new(0.1, 0.0, 0.0)),
            unit_row(Vec3A::new(5.0, 0.0, 0.0)),
            unit_row(Vec3A::new(5.1, 0.0, 0.0)),
        ];
        let plane = SahStrategy.get_split_plane(&bounds_of(&rows), &rows).unwrap();
        assert_eq!(plane.axis, Axis::X);
        // the candidate sits on the upper centroid of the low cluster
        assert_relative_eq!(plane.split_position, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn sah_falls_back_to_average_for_coincident_centroids() {
        let rows = [unit_row(Vec3A::ONE); 4];
        let plane = SahStrategy.get_split_plane(&bounds_of(&rows), &rows).unwrap();
        assert_relative_eq!(plane.split_position, 1.0);
    }

    #[test]
    fn boundary_centroids_bin_low() {
        assert_eq!(bin_index(0.0, 0.0, 1.0), 0);
        assert_eq!(bin_index(1.0, 0.0, 1.0), 0);
        assert_eq!(bin_index(1.5, 0.0, 1.0), 1);
        assert_eq!(bin_index(2.0, 0.0, 1.0), 1);
        assert_eq!(bin_index(32.0, 0.0, 1.0), BIN_COUNT - 1);

        // binning agrees with the partition rule `centroid > position` at every boundary
        let mut rng = StdRng::seed_from_u64(7);
        let (centroid_min, centroid_max) = (-3.7_f32, 11.3_f32);
        let width = (centroid_max - centroid_min) / BIN_COUNT as f32;
        for _ in 0..2000 {
            let centroid = if rng.gen_bool(0.5) {
                bin_boundary(centroid_min, width, rng.gen_range(0..BIN_COUNT - 1))
            } else {
                rng.gen_range(centroid_min..=centroid_max)
            };
            let bin = bin_index(centroid, centroid_min, width);
            for i in 0..BIN_COUNT - 1 {
                assert_eq!(bin <= i, centroid <= bin_boundary(centroid_min, width, i));
            }
        }
    }
}
