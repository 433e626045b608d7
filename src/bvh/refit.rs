//! Bounds-only updates after vertices moved.
//!
//! Children always follow their parent in a root buffer, so one reverse pass over the
//! nodes sees every child before its parent.

use std::ops::Range;

use bitvec::prelude::*;
use log::debug;

use super::{BvhNode, MeshBvh, PrimitiveReader};
use crate::{Grow, AABB};

fn leaf_bounds(reader: &PrimitiveReader, node: &BvhNode) -> AABB {
    let mut aabb = AABB::default();
    let offset = node.primitive_offset();
    for slot in offset..offset + node.primitive_count() {
        let (_, primitive) = reader.slot_primitive(slot);
        aabb.grow(&primitive.bounds());
    }
    aabb
}

fn children_bounds(nodes: &[BvhNode], index: usize) -> AABB {
    let right = nodes[index].right_child() as usize;
    nodes[index + 1].aabb().union(&nodes[right].aabb())
}

impl MeshBvh {
    /// Recompute every node's bounds from the current vertex positions without changing the
    /// tree shape. Unchanged positions give bit-identical bounds.
    pub fn refit(&mut self) {
        let reader = self.reader();
        for root in &self.roots {
            let mut nodes = root.write();
            for index in (0..nodes.len()).rev() {
                let bounds = if nodes[index].is_leaf() {
                    leaf_bounds(&reader, &nodes[index])
                } else {
                    children_bounds(&nodes, index)
                };
                nodes[index].set_aabb(&bounds);
            }
        }
    }

    /// Refit only the leaves holding a primitive id in `primitive_ids` and their ancestors.
    /// Returns the number of nodes updated.
    pub fn refit_range(&mut self, primitive_ids: Range<u32>) -> usize {
        let reader = self.reader();
        let mut updated = 0;
        for root in &self.roots {
            let mut nodes = root.write();
            let mut dirty = bitvec![0; nodes.len()];
            for index in (0..nodes.len()).rev() {
                let node = nodes[index];
                let bounds = if node.is_leaf() {
                    let offset = node.primitive_offset();
                    let touched = (offset..offset + node.primitive_count())
                        .any(|slot| primitive_ids.contains(&reader.resolve(slot)));
                    if !touched {
                        continue;
                    }
                    leaf_bounds(&reader, &node)
                } else {
                    if !dirty[index + 1] && !dirty[node.right_child() as usize] {
                        continue;
                    }
                    children_bounds(&nodes, index)
                };
                nodes[index].set_aabb(&bounds);
                dirty.set(index, true);
                updated += 1;
            }
        }
        debug!("refit {} nodes for primitives {:?}", updated, primitive_ids);
        updated
    }
}
