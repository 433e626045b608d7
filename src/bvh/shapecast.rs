//! Generic stack-based traversal driven by user callbacks.

use smallvec::SmallVec;

use super::{BvhNode, MeshBvh, PrimitiveReader};
use crate::{Primitive, AABB};

/// Result of testing a node's bounds against the query shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsIntersection {
    NotIntersected,
    Intersected,
    /// The whole subtree is inside the shape; descendants skip their bounds test
    Contained,
}

/// Traversal decisions for [`MeshBvh::shapecast`].
///
/// Returning `true` from [`ShapecastCallbacks::intersects_primitive`] or from a handled
/// [`ShapecastCallbacks::intersects_range`] stops the whole traversal.
pub trait ShapecastCallbacks {
    /// `score` is the value [`ShapecastCallbacks::bounds_traverse_order`] gave this node
    fn intersects_bounds(
        &mut self,
        bounds: &AABB,
        is_leaf: bool,
        score: Option<f32>,
        depth: u32,
        node_index: u32,
    ) -> BoundsIntersection;

    /// Ordering key, lower keys are visited first. `None` keeps build order.
    fn bounds_traverse_order(&mut self, _bounds: &AABB) -> Option<f32> {
        None
    }

    /// Called once per reached leaf with its slot range. `None` goes on to test each
    /// primitive, `Some(stop)` handles the range as a whole.
    fn intersects_range(
        &mut self,
        _offset: u32,
        _count: u32,
        _contained: bool,
        _depth: u32,
        _node_index: u32,
        _bounds: &AABB,
    ) -> Option<bool> {
        None
    }

    fn intersects_primitive(&mut self, primitive: &Primitive, primitive_id: u32, contained: bool, depth: u32) -> bool;
}

fn no_order(_: &AABB) -> Option<f32> {
    None
}

/// Closure adapter for [`ShapecastCallbacks`]
pub struct Shapecast<B, P, O = fn(&AABB) -> Option<f32>> {
    bounds: B,
    primitive: P,
    order: O,
}

impl<B, P> Shapecast<B, P>
where
    B: FnMut(&AABB, Option<f32>) -> BoundsIntersection,
    P: FnMut(&Primitive, u32, bool) -> bool,
{
    pub fn new(bounds: B, primitive: P) -> Self {
        Self {
            bounds,
            primitive,
            order: no_order,
        }
    }
}

impl<B, P, O> Shapecast<B, P, O> {
    pub fn with_order<O2>(self, order: O2) -> Shapecast<B, P, O2>
    where
        O2: FnMut(&AABB) -> Option<f32>,
    {
        Shapecast {
            bounds: self.bounds,
            primitive: self.primitive,
            order,
        }
    }
}

impl<B, P, O> ShapecastCallbacks for Shapecast<B, P, O>
where
    B: FnMut(&AABB, Option<f32>) -> BoundsIntersection,
    P: FnMut(&Primitive, u32, bool) -> bool,
    O: FnMut(&AABB) -> Option<f32>,
{
    #[inline]
    fn intersects_bounds(&mut self, bounds: &AABB, _: bool, score: Option<f32>, _: u32, _: u32) -> BoundsIntersection {
        (self.bounds)(bounds, score)
    }

    #[inline]
    fn bounds_traverse_order(&mut self, bounds: &AABB) -> Option<f32> {
        (self.order)(bounds)
    }

    #[inline]
    fn intersects_primitive(&mut self, primitive: &Primitive, primitive_id: u32, contained: bool, _: u32) -> bool {
        (self.primitive)(primitive, primitive_id, contained)
    }
}

#[derive(Clone, Copy)]
struct StackEntry {
    node: u32,
    depth: u32,
    contained: bool,
    score: Option<f32>,
}

impl MeshBvh {
    /// Walk every root with `callbacks`. Returns `true` if a callback stopped the traversal.
    pub fn shapecast<C: ShapecastCallbacks + ?Sized>(&self, callbacks: &mut C) -> bool {
        let reader = self.reader();
        self.shapecast_with(&reader, callbacks)
    }

    pub(crate) fn shapecast_with<C: ShapecastCallbacks + ?Sized>(
        &self,
        reader: &PrimitiveReader,
        callbacks: &mut C,
    ) -> bool {
        let mut stack: SmallVec<[StackEntry; 64]> = SmallVec::new();
        stack.reserve(2 * self.depth as usize + 2);

        for root in &self.roots {
            let nodes = root.read();
            if nodes.is_empty() {
                continue;
            }
            stack.clear();
            stack.push(StackEntry {
                node: 0,
                depth: 0,
                contained: false,
                score: callbacks.bounds_traverse_order(&nodes[0].aabb()),
            });
            if traverse_root(&nodes, reader, callbacks, &mut stack) {
                return true;
            }
        }
        false
    }
}

fn traverse_root<C: ShapecastCallbacks + ?Sized>(
    nodes: &[BvhNode],
    reader: &PrimitiveReader,
    callbacks: &mut C,
    stack: &mut SmallVec<[StackEntry; 64]>,
) -> bool {
    while let Some(entry) = stack.pop() {
        let node = &nodes[entry.node as usize];
        let bounds = node.aabb();
        let is_leaf = node.is_leaf();

        let contained = if entry.contained {
            true
        } else {
            match callbacks.intersects_bounds(&bounds, is_leaf, entry.score, entry.depth, entry.node) {
                BoundsIntersection::NotIntersected => continue,
                BoundsIntersection::Intersected => false,
                BoundsIntersection::Contained => true,
            }
        };

        if is_leaf {
            let offset = node.primitive_offset();
            let count = node.primitive_count();
            match callbacks.intersects_range(offset, count, contained, entry.depth, entry.node, &bounds) {
                Some(true) => return true,
                Some(false) => continue,
                None => {}
            }
            for slot in offset..offset + count {
                let (id, primitive) = reader.slot_primitive(slot);
                if callbacks.intersects_primitive(&primitive, id, contained, entry.depth) {
                    return true;
                }
            }
            continue;
        }

        let left = entry.node + 1;
        let right = node.right_child();
        let left_score = callbacks.bounds_traverse_order(&nodes[left as usize].aabb());
        let right_score = callbacks.bounds_traverse_order(&nodes[right as usize].aabb());
        let child = |node, score| StackEntry {
            node,
            depth: entry.depth + 1,
            contained,
            score,
        };

        // the nearer child is pushed last so it pops first
        let right_first = matches!((left_score, right_score), (Some(l), Some(r)) if r < l);
        if right_first {
            stack.push(child(left, left_score));
            stack.push(child(right, right_score));
        } else {
            stack.push(child(right, right_score));
            stack.push(child(left, left_score));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::super::test_util::*;
    use super::*;
    use crate::{BuildOptions, Geometry, Group, PrimitiveKind};

    #[test]
    fn visits_every_primitive_once() {
        let mut geometry = random_geometry(300, 7);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        let mut seen = vec![0_u32; 300];
        let stopped = bvh.shapecast(&mut Shapecast::new(
            |_: &AABB, _| BoundsIntersection::Intersected,
            |_: &Primitive, id, _| {
                seen[id as usize] += 1;
                false
            },
        ));
        assert!(!stopped);
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn stops_on_request() {
        let mut geometry = random_geometry(100, 8);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        let mut calls = 0;
        let stopped = bvh.shapecast(&mut Shapecast::new(
            |_: &AABB, _| BoundsIntersection::Intersected,
            |_: &Primitive, _, _| {
                calls += 1;
                calls == 5
            },
        ));
        assert!(stopped);
        assert_eq!(calls, 5);
    }

    struct ContainedCounter {
        bounds_calls: usize,
        contained_primitives: usize,
    }

    impl ShapecastCallbacks for ContainedCounter {
        fn intersects_bounds(&mut self, _: &AABB, _: bool, _: Option<f32>, _: u32, _: u32) -> BoundsIntersection {
            self.bounds_calls += 1;
            BoundsIntersection::Contained
        }

        fn intersects_primitive(&mut self, _: &Primitive, _: u32, contained: bool, _: u32) -> bool {
            if contained {
                self.contained_primitives += 1;
            }
            false
        }
    }

    #[test]
    fn contained_skips_descendant_bounds() {
        let mut geometry = random_geometry(200, 9);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        let mut counter = ContainedCounter {
            bounds_calls: 0,
            contained_primitives: 0,
        };
        bvh.shapecast(&mut counter);
        assert_eq!(counter.bounds_calls, 1);
        assert_eq!(counter.contained_primitives, 200);
    }

    #[test]
    fn ordering_key_reverses_build_order() {
        // the high side is built first, so unordered traversal runs in descending x
        let mut geometry = Geometry::new((0..64).map(|i| Vec3A::new(i as f32, 0.0, 0.0)).collect())
            .with_kind(PrimitiveKind::Points);
        let bvh = MeshBvh::new(
            &mut geometry,
            BuildOptions {
                max_leaf_size: 1,
                ..Default::default()
            },
        )
        .unwrap();

        let mut unordered = Vec::new();
        bvh.shapecast(&mut Shapecast::new(
            |_: &AABB, _| BoundsIntersection::Intersected,
            |primitive: &Primitive, _, _| {
                unordered.push(primitive.centroid().x);
                false
            },
        ));
        assert!(unordered.windows(2).all(|w| w[0] > w[1]));

        let mut ordered = Vec::new();
        bvh.shapecast(
            &mut Shapecast::new(
                |_: &AABB, _| BoundsIntersection::Intersected,
                |primitive: &Primitive, _, _| {
                    ordered.push(primitive.centroid().x);
                    false
                },
            )
            .with_order(|bounds: &AABB| Some(bounds.min.x)),
        );
        assert_eq!(ordered, (0..64).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn every_root_is_walked() {
        let mut geometry = grid_geometry(4).with_groups(vec![Group::new(0, 30), Group::new(30, 66)]);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        let mut count = 0;
        bvh.shapecast(&mut Shapecast::new(
            |_: &AABB, _| BoundsIntersection::Intersected,
            |_: &Primitive, _, _| {
                count += 1;
                false
            },
        ));
        assert_eq!(count, 32);
    }
}
