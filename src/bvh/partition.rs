//! In-place partition of a node's slots around a split plane.
//!
//! Primitives whose box reaches the plane from both sides are shared. Every primitive is
//! stored exactly once, so the slots end up as
//! `[left only | shared, stored left | shared, stored right | right only]`.
//! "Left" is the side at or above the plane. Shared primitives are stored on the side of
//! their centroid, a centroid on the plane goes right.

use std::ops::Range;

use super::bounds_cache::row_centroid;
use super::index_manager::SlotsMut;
use crate::SplitPlane;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub left_only: usize,
    pub shared_left: usize,
    pub shared_right: usize,
    pub right_only: usize,
}

impl Partition {
    #[inline]
    pub fn count(&self) -> usize {
        self.left_only + self.shared_left + self.shared_right + self.right_only
    }

    #[inline]
    pub fn shared(&self) -> usize {
        self.shared_left + self.shared_right
    }

    /// Number of slots stored in the left child
    #[inline]
    pub fn split(&self) -> usize {
        self.left_only + self.shared_left
    }

    /// Every primitive touching the left side
    pub fn left_span(&self) -> Range<usize> {
        0..self.left_only + self.shared()
    }

    /// Every primitive touching the right side
    pub fn right_span(&self) -> Range<usize> {
        self.left_only..self.count()
    }

    /// More than half of the primitives straddle the plane, or a child would be empty
    pub fn is_degenerate(&self) -> bool {
        let count = self.count();
        self.shared() * 2 > count || self.split() == 0 || self.split() == count
    }
}

/// Hoare pass over `range`: slots matching `predicate` move to the front, bounds rows follow
/// their slot. Returns the number of matching slots.
fn hoare_pass<F>(slots: &mut SlotsMut, rows: &mut [[f32; 6]], range: Range<usize>, predicate: F) -> usize
where
    F: Fn(&[f32; 6]) -> bool,
{
    if range.is_empty() {
        return 0;
    }
    let start = range.start;
    let mut i = range.start;
    let mut j = range.end;
    while i < j {
        if predicate(&rows[i]) {
            i += 1;
        } else {
            j -= 1;
            slots.swap(i, j);
            rows.swap(i, j);
        }
    }
    i - start
}

pub fn partition(slots: &mut SlotsMut, rows: &mut [[f32; 6]], plane: &SplitPlane) -> Partition {
    debug_assert_eq!(slots.len(), rows.len());
    let axis = plane.axis.index();
    let position = plane.split_position;
    let count = rows.len();

    // box min above the plane: only touches the left side
    let left_only = hoare_pass(slots, rows, 0..count, |row| row[axis] > position);
    // box max below the plane: only touches the right side
    let rest = count - left_only;
    let not_right_only = hoare_pass(slots, rows, left_only..count, |row| row[axis + 3] >= position);
    let right_only = rest - not_right_only;

    let shared_range = left_only..left_only + not_right_only;
    let shared_left = hoare_pass(slots, rows, shared_range, |row| row_centroid(row, plane.axis) > position);

    Partition {
        left_only,
        shared_left,
        shared_right: not_right_only - shared_left,
        right_only,
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use strum::IntoEnumIterator;

    use super::*;
    use crate::Axis;

    fn row(min: f32, max: f32) -> [f32; 6] {
        [min, 0.0, 0.0, max, 0.0, 0.0]
    }

    #[test]
    fn blocks_follow_the_layout() {
        let mut rows = vec![
            row(-3.0, -2.0), // right only
            row(-1.0, 3.0),  // shared, centroid above
            row(2.0, 3.0),   // left only
            row(-3.0, 1.0),  // shared, centroid below
            row(-1.0, 1.0),  // shared, centroid on the plane
            row(0.0, 0.0),   // a point on the plane is shared
        ];
        let mut ids: Vec<u32> = (0..rows.len() as u32).collect();
        let plane = SplitPlane {
            axis: Axis::X,
            split_position: 0.0,
        };
        let result = partition(&mut SlotsMut::Indirect(&mut ids), &mut rows, &plane);

        assert_eq!(
            result,
            Partition {
                left_only: 1,
                shared_left: 1,
                shared_right: 3,
                right_only: 1,
            }
        );
        assert_eq!(ids[0], 2);
        assert_eq!(ids[1], 1);
        assert_eq!(ids[5], 0);
        let mut shared_right = ids[2..5].to_vec();
        shared_right.sort();
        assert_eq!(shared_right, vec![3, 4, 5]);
        assert_eq!(result.left_span(), 0..5);
        assert_eq!(result.right_span(), 1..6);
        // 4 of 6 are shared
        assert!(result.is_degenerate());
    }

    #[test]
    fn random_partitions_are_consistent() {
        let mut rng = StdRng::seed_from_u64(11);
        for axis in Axis::iter() {
            let mut rows: Vec<[f32; 6]> = (0..200)
                .map(|_| {
                    let mut r = [0.0_f32; 6];
                    for k in 0..3 {
                        let a: f32 = rng.gen_range(-10.0..10.0);
                        let b: f32 = a + rng.gen_range(0.0..2.0);
                        r[k] = a;
                        r[k + 3] = b;
                    }
                    r
                })
                .collect();
            let original = rows.clone();
            let mut index: Vec<u32> = (0..rows.len() as u32 * 3).collect();
            let plane = SplitPlane {
                axis,
                split_position: rng.gen_range(-5.0..5.0),
            };
            let result = partition(
                &mut SlotsMut::Direct32 {
                    index: &mut index,
                    stride: 3,
                },
                &mut rows,
                &plane,
            );
            assert_eq!(result.count(), rows.len());

            let a = axis.index();
            let p = plane.split_position;
            for (slot, r) in rows.iter().enumerate() {
                // the index moved with the rows
                let id = index[slot * 3] as usize / 3;
                assert_eq!(original[id], *r);
                assert_eq!(index[slot * 3 + 2] as usize, id * 3 + 2);

                let in_left = result.left_span().contains(&slot);
                let in_right = result.right_span().contains(&slot);
                assert_eq!(in_left, r[a + 3] >= p);
                assert_eq!(in_right, r[a] <= p);
                if in_left && !in_right {
                    assert!(row_centroid(r, axis) >= p);
                }
                if in_right && !in_left {
                    assert!(row_centroid(r, axis) <= p);
                }
                if slot < result.split() {
                    assert!(row_centroid(r, axis) > p);
                } else {
                    assert!(row_centroid(r, axis) <= p);
                }
            }
        }
    }
}
