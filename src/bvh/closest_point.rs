//! Branch-and-bound nearest point searches.

use glam::{Affine3A, Vec3A};
use smallvec::SmallVec;

use super::{BoundsIntersection, MeshBvh, PrimitiveReader, ShapecastCallbacks};
use crate::{Primitive, AABB};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPointHit {
    pub point: Vec3A,
    pub distance: f32,
    pub primitive_id: u32,
}

/// Closest points between two hierarchies, both in the space of the queried one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPairHit {
    pub point: Vec3A,
    pub other_point: Vec3A,
    pub distance: f32,
    pub primitive_id: u32,
    pub other_primitive_id: u32,
}

struct PointSearch {
    target: Vec3A,
    min_sq: f32,
    best_sq: f32,
    best: Option<(Vec3A, u32)>,
}

impl ShapecastCallbacks for PointSearch {
    fn intersects_bounds(&mut self, _: &AABB, _: bool, score: Option<f32>, _: u32, _: u32) -> BoundsIntersection {
        match score {
            Some(distance_sq) if distance_sq >= self.best_sq => BoundsIntersection::NotIntersected,
            _ => BoundsIntersection::Intersected,
        }
    }

    fn bounds_traverse_order(&mut self, bounds: &AABB) -> Option<f32> {
        Some(bounds.distance_squared_to_point(self.target))
    }

    fn intersects_primitive(&mut self, primitive: &Primitive, primitive_id: u32, _: bool, _: u32) -> bool {
        let point = primitive.closest_point_to_point(self.target);
        let distance_sq = point.distance_squared(self.target);
        if distance_sq < self.best_sq {
            self.best_sq = distance_sq;
            self.best = Some((point, primitive_id));
        }
        distance_sq <= self.min_sq
    }
}

impl MeshBvh {
    /// Closest point of the mesh to `point`, `None` if nothing lies closer than
    /// `max_threshold`. The search stops early once a point within `min_threshold` is found.
    pub fn closest_point_to_point(&self, point: Vec3A, min_threshold: f32, max_threshold: f32) -> Option<ClosestPointHit> {
        let mut search = PointSearch {
            target: point,
            min_sq: min_threshold * min_threshold,
            best_sq: max_threshold * max_threshold,
            best: None,
        };
        self.shapecast(&mut search);
        search.best.map(|(closest, primitive_id)| ClosestPointHit {
            point: closest,
            distance: search.best_sq.sqrt(),
            primitive_id,
        })
    }

    /// Closest pair of points between this mesh and `other`, where `other_to_self` carries
    /// `other` into this mesh's space. Thresholds behave as in [`MeshBvh::closest_point_to_point`].
    pub fn closest_point_to_bvh(
        &self,
        other: &MeshBvh,
        other_to_self: &Affine3A,
        min_threshold: f32,
        max_threshold: f32,
    ) -> Option<ClosestPairHit> {
        let reader = self.reader();
        let other_reader = other.reader();
        let mut search = PairSearch {
            other,
            other_reader: &other_reader,
            other_to_self,
            other_bounds: other.bounds().transformed(other_to_self),
            min_sq: min_threshold * min_threshold,
            best_sq: max_threshold * max_threshold,
            best: None,
            leaf: SmallVec::new(),
        };
        self.shapecast_with(&reader, &mut OuterPairSearch {
            reader: &reader,
            search: &mut search,
        });
        search.best.map(|(point, other_point, primitive_id, other_primitive_id)| ClosestPairHit {
            point,
            other_point,
            distance: search.best_sq.sqrt(),
            primitive_id,
            other_primitive_id,
        })
    }
}

/// Shared state of a pair search; also walks `other` for one leaf of the outer mesh
struct PairSearch<'o, 'r> {
    other: &'o MeshBvh,
    other_reader: &'r PrimitiveReader<'o>,
    other_to_self: &'r Affine3A,
    other_bounds: AABB,
    min_sq: f32,
    best_sq: f32,
    best: Option<(Vec3A, Vec3A, u32, u32)>,
    /// Primitives of the current outer leaf, with their bounds
    leaf: SmallVec<[(u32, Primitive, AABB); 16]>,
}

impl ShapecastCallbacks for PairSearch<'_, '_> {
    fn intersects_bounds(&mut self, _: &AABB, _: bool, score: Option<f32>, _: u32, _: u32) -> BoundsIntersection {
        match score {
            Some(distance_sq) if distance_sq >= self.best_sq => BoundsIntersection::NotIntersected,
            _ => BoundsIntersection::Intersected,
        }
    }

    fn bounds_traverse_order(&mut self, bounds: &AABB) -> Option<f32> {
        let bounds = bounds.transformed(self.other_to_self);
        self.leaf
            .iter()
            .map(|(_, _, leaf_bounds)| leaf_bounds.distance_squared_to_aabb(&bounds))
            .min_by(f32::total_cmp)
    }

    fn intersects_primitive(&mut self, primitive: &Primitive, primitive_id: u32, _: bool, _: u32) -> bool {
        let other = primitive.transformed(self.other_to_self);
        let other_bounds = other.bounds();
        for (id, mine, bounds) in &self.leaf {
            if bounds.distance_squared_to_aabb(&other_bounds) >= self.best_sq {
                continue;
            }
            let (a, b) = mine.closest_points(&other);
            let distance_sq = a.distance_squared(b);
            if distance_sq < self.best_sq {
                self.best_sq = distance_sq;
                self.best = Some((a, b, *id, primitive_id));
                if distance_sq <= self.min_sq {
                    return true;
                }
            }
        }
        false
    }
}

struct OuterPairSearch<'s, 'o, 'r, 'a> {
    reader: &'r PrimitiveReader<'a>,
    search: &'s mut PairSearch<'o, 'r>,
}

impl ShapecastCallbacks for OuterPairSearch<'_, '_, '_, '_> {
    fn intersects_bounds(&mut self, _: &AABB, _: bool, score: Option<f32>, _: u32, _: u32) -> BoundsIntersection {
        match score {
            Some(distance_sq) if distance_sq >= self.search.best_sq => BoundsIntersection::NotIntersected,
            _ => BoundsIntersection::Intersected,
        }
    }

    fn bounds_traverse_order(&mut self, bounds: &AABB) -> Option<f32> {
        Some(bounds.distance_squared_to_aabb(&self.search.other_bounds))
    }

    fn intersects_range(&mut self, offset: u32, count: u32, _: bool, _: u32, _: u32, _: &AABB) -> Option<bool> {
        self.search.leaf.clear();
        for slot in offset..offset + count {
            let (id, primitive) = self.reader.slot_primitive(slot);
            self.search.leaf.push((id, primitive, primitive.bounds()));
        }
        let other = self.search.other;
        let other_reader = self.search.other_reader;
        Some(other.shapecast_with(other_reader, &mut *self.search))
    }

    fn intersects_primitive(&mut self, _: &Primitive, _: u32, _: bool, _: u32) -> bool {
        false
    }
}
