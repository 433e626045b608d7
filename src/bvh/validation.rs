//! Consistency checks and tree statistics.

use std::fmt::{self, Display};

use super::{BvhNode, MeshBvh, PrimitiveReader};
use crate::bvh_strategy::{PRIMITIVE_COST, TRAVERSAL_COST};

/// Running min / max / mean of integer samples
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub avg: f32,
}

impl Stats {
    pub fn add_sample(&mut self, value: usize) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.avg += (value as f32 - self.avg) / (self.count as f32);
    }
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            min: usize::MAX,
            max: 0,
            avg: 0.0,
        }
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}; avg {:.1}; {} samples", self.min, self.max, self.avg, self.count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BvhStats {
    pub root_count: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    /// Depth of each leaf
    pub leaf_depth: Stats,
    /// Primitive count of each leaf
    pub leaf_size: Stats,
    /// Expected traversal cost under the surface area heuristic, summed over roots
    pub sah_cost: f32,
}

impl Display for BvhStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "roots: {}", self.root_count)?;
        writeln!(f, "nodes: {} ({} leaves)", self.node_count, self.leaf_count)?;
        writeln!(f, "leaf depth: {}", self.leaf_depth)?;
        writeln!(f, "leaf size: {}", self.leaf_size)?;
        write!(f, "sah cost: {:.3}", self.sah_cost)
    }
}

/// Longest root to leaf path, in edges
pub(crate) fn tree_depth(nodes: &[BvhNode]) -> u32 {
    if nodes.is_empty() {
        return 0;
    }
    let mut depths = vec![0_u32; nodes.len()];
    let mut max_depth = 0;
    for (index, node) in nodes.iter().enumerate() {
        max_depth = max_depth.max(depths[index]);
        if !node.is_leaf() {
            let child_depth = depths[index] + 1;
            depths[index + 1] = child_depth;
            depths[node.right_child() as usize] = child_depth;
        }
    }
    max_depth
}

fn subtree_is_valid(nodes: &[BvhNode], index: usize, reader: &PrimitiveReader, slot_count: usize) -> bool {
    let node = &nodes[index];
    let bounds = node.aabb();
    if node.is_leaf() {
        let start = node.primitive_offset() as usize;
        let end = start + node.primitive_count() as usize;
        if end > slot_count {
            return false;
        }
        let primitive_count = reader.view().primitive_count();
        return (start..end).all(|slot| {
            let id = reader.resolve(slot as u32);
            (id as usize) < primitive_count && bounds.contains_aabb(&reader.primitive(id).bounds())
        });
    }

    let left = index + 1;
    let right = node.right_child() as usize;
    if right <= left || right >= nodes.len() {
        return false;
    }
    bounds.contains_aabb(&nodes[left].aabb())
        && bounds.contains_aabb(&nodes[right].aabb())
        && subtree_is_valid(nodes, left, reader, slot_count)
        && subtree_is_valid(nodes, right, reader, slot_count)
}

impl MeshBvh {
    /// Longest root to leaf path over all roots
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Every node contains its children, and every leaf the current bounds of its primitives
    pub fn validate_bounds(&self) -> bool {
        let reader = self.reader();
        let slot_count = match &self.indirect {
            Some(indirect) => indirect.len(),
            None => reader.view().primitive_count(),
        };
        self.roots.iter().all(|root| {
            let nodes = root.read();
            nodes.is_empty() || subtree_is_valid(&nodes, 0, &reader, slot_count)
        })
    }

    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats {
            root_count: self.roots.len(),
            node_count: 0,
            leaf_count: 0,
            leaf_depth: Stats::default(),
            leaf_size: Stats::default(),
            sah_cost: 0.0,
        };

        for root in &self.roots {
            let nodes = root.read();
            let Some(root_node) = nodes.first() else {
                continue;
            };
            let root_area = root_node.aabb().area();
            let mut depths = vec![0_usize; nodes.len()];
            let mut cost = 0.0;

            for (index, node) in nodes.iter().enumerate() {
                let relative_area = if root_area > 0.0 {
                    node.aabb().area() / root_area
                } else {
                    1.0
                };
                if node.is_leaf() {
                    stats.leaf_count += 1;
                    stats.leaf_depth.add_sample(depths[index]);
                    stats.leaf_size.add_sample(node.primitive_count() as usize);
                    cost += PRIMITIVE_COST * relative_area * node.primitive_count() as f32;
                } else {
                    depths[index + 1] = depths[index] + 1;
                    depths[node.right_child() as usize] = depths[index] + 1;
                    cost += TRAVERSAL_COST * relative_area;
                }
            }
            stats.node_count += nodes.len();
            stats.sah_cost += cost;
        }
        stats
    }

    /// Move every primitive reference by `delta`, after primitives were inserted in front
    /// of (or removed from the front of) the geometry's primitive range. Indirect hierarchies
    /// shift their ids, direct ones their leaf offsets.
    pub fn shift_primitive_offsets(&mut self, delta: i32) {
        match &self.indirect {
            Some(indirect) => {
                for id in indirect.write().iter_mut() {
                    *id = id.wrapping_add_signed(delta);
                }
            }
            None => {
                for root in &self.roots {
                    for node in root.write().iter_mut().filter(|node| node.is_leaf()) {
                        node.set_primitive_offset(node.primitive_offset().wrapping_add_signed(delta));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::super::test_util::*;
    use super::*;
    use crate::{BuildOptions, IndexBuffer, SplitStrategy};

    #[test]
    fn stats_samples() {
        let mut s = Stats::default();
        for value in [10, 30, 50] {
            s.add_sample(value);
        }
        assert_eq!((s.count, s.min, s.max, s.avg), (3, 10, 50, 30.0));
        assert!(format!("{}", s).contains("10 - 50"));
    }

    #[test]
    fn tree_statistics() {
        let mut geometry = random_geometry(1000, 91);
        let center = MeshBvh::new(&mut geometry.deep_clone(), BuildOptions::default()).unwrap();
        let sah = MeshBvh::new(
            &mut geometry,
            BuildOptions {
                strategy: SplitStrategy::Sah,
                ..Default::default()
            },
        )
        .unwrap();

        for bvh in [&center, &sah] {
            let stats = bvh.stats();
            assert_eq!(stats.node_count, 2 * stats.leaf_count - 1);
            assert_eq!(stats.leaf_size.count, stats.leaf_count);
            assert!((stats.leaf_size.avg * stats.leaf_count as f32 - 1000.0).abs() < 1.0);
            assert!(stats.leaf_size.min >= 1);
            assert_eq!(stats.leaf_depth.max, bvh.depth() as usize);
            assert!(stats.sah_cost > 0.0);
            assert!(format!("{}", stats).contains("leaves"));
        }
    }

    #[test]
    fn validation_detects_stale_bounds() {
        let mut geometry = random_geometry(100, 92);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        assert!(bvh.validate_bounds());
        geometry.positions().write()[0] = Vec3A::splat(100.0);
        assert!(!bvh.validate_bounds());
    }

    /// Prepend `count` far away triangles to the index, as another mesh merged in front would
    fn prepend_triangles(geometry: &mut crate::Geometry, count: usize) {
        let first_vertex = {
            let mut positions = geometry.positions().write();
            let first = positions.len() as u32;
            for i in 0..count * 3 {
                positions.push(Vec3A::new(500.0 + i as f32, 500.0, 500.0));
            }
            first
        };
        match geometry.index() {
            Some(IndexBuffer::U32(index)) => {
                let mut index = index.write();
                let front: Vec<u32> = (first_vertex..first_vertex + count as u32 * 3).collect();
                index.splice(0..0, front);
            }
            _ => panic!("expected a u32 index"),
        }
    }

    #[test]
    fn shifting_offsets_restores_validity() {
        for indirect in [false, true] {
            let mut geometry = random_geometry(200, 93);
            let mut bvh = MeshBvh::new(
                &mut geometry,
                BuildOptions {
                    indirect,
                    ..Default::default()
                },
            )
            .unwrap();
            assert!(bvh.validate_bounds());

            prepend_triangles(&mut geometry, 7);
            assert!(!bvh.validate_bounds());
            bvh.shift_primitive_offsets(7);
            assert!(bvh.validate_bounds());

            bvh.shift_primitive_offsets(-7);
            assert!(!bvh.validate_bounds());
        }
    }

    #[test]
    fn references_past_the_end_are_invalid() {
        for indirect in [false, true] {
            let mut geometry = random_geometry(50, 94);
            let mut bvh = MeshBvh::new(
                &mut geometry,
                BuildOptions {
                    indirect,
                    ..Default::default()
                },
            )
            .unwrap();

            bvh.shift_primitive_offsets(7);
            assert!(!bvh.validate_bounds());
            bvh.shift_primitive_offsets(-7);
            assert!(bvh.validate_bounds());
        }
    }
}
