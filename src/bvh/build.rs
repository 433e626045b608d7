use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::warn;

use super::bounds_cache::union_of_rows;
use super::index_manager::SlotsMut;
use super::node::{BvhNode, MAX_LEAF_COUNT};
use super::partition::partition;
use super::ProgressCallback;
use crate::{SplitPlaneStrategy, SplitStrategy, AABB};

/// Subtrees with at least this many primitives build their children on separate rayon tasks
const PARALLEL_THRESHOLD: usize = 4096;

pub(crate) struct Progress<'a> {
    callback: &'a ProgressCallback,
    total: usize,
    done: AtomicUsize,
}

impl<'a> Progress<'a> {
    pub fn new(callback: &'a ProgressCallback, total: usize) -> Self {
        Self {
            callback,
            total,
            done: AtomicUsize::new(0),
        }
    }

    fn advance(&self, count: usize) {
        let done = self.done.fetch_add(count, Ordering::Relaxed) + count;
        if self.total > 0 {
            (self.callback)((done as f32 / self.total as f32).min(1.0));
        }
    }

    pub fn finish(&self) {
        (self.callback)(1.0);
    }
}

pub(crate) struct BuildContext<'a> {
    pub strategy: SplitStrategy,
    pub max_leaf_size: u32,
    pub max_depth: u32,
    pub parallel: bool,
    pub progress: Option<Progress<'a>>,
    depth_warned: AtomicBool,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        strategy: SplitStrategy,
        max_leaf_size: u32,
        max_depth: u32,
        parallel: bool,
        progress: Option<Progress<'a>>,
    ) -> Self {
        Self {
            strategy,
            max_leaf_size,
            max_depth,
            parallel,
            progress,
            depth_warned: AtomicBool::new(false),
        }
    }

    fn warn_depth(&self, count: usize) {
        if !self.depth_warned.swap(true, Ordering::Relaxed) {
            warn!(
                "max depth {} reached with {} primitives left, emitting an oversized leaf",
                self.max_depth, count
            );
        }
    }
}

/// Build one root over `slots`, whose first slot is global slot `offset`
pub(crate) fn build_root(ctx: &BuildContext, slots: SlotsMut, rows: &mut [[f32; 6]], offset: u32) -> Vec<BvhNode> {
    let mut nodes = Vec::with_capacity(rows.len().max(1) * 2 / ctx.max_leaf_size.max(1) as usize + 1);
    build_node(ctx, &mut nodes, slots, rows, offset, 0);
    nodes
}

fn build_node(
    ctx: &BuildContext,
    nodes: &mut Vec<BvhNode>,
    mut slots: SlotsMut,
    rows: &mut [[f32; 6]],
    offset: u32,
    depth: u32,
) {
    let node_bounds = union_of_rows(rows);
    let count = rows.len();

    if count <= ctx.max_leaf_size as usize {
        push_leaf(ctx, nodes, rows, &node_bounds, offset);
        return;
    }
    if depth >= ctx.max_depth {
        ctx.warn_depth(count);
        push_leaf(ctx, nodes, rows, &node_bounds, offset);
        return;
    }

    let Some(plane) = ctx.strategy.get_split_plane(&node_bounds, rows) else {
        push_leaf(ctx, nodes, rows, &node_bounds, offset);
        return;
    };

    let split = partition(&mut slots, rows, &plane);
    if split.is_degenerate() {
        push_leaf(ctx, nodes, rows, &node_bounds, offset);
        return;
    }

    let split = split.split();
    let node_index = nodes.len();
    nodes.push(BvhNode::internal(&node_bounds, plane.axis, 0));

    let (left_slots, right_slots) = slots.split_at_mut(split);
    let (left_rows, right_rows) = rows.split_at_mut(split);
    let right_offset = offset + split as u32;

    if ctx.parallel && count >= PARALLEL_THRESHOLD {
        let (left, right) = rayon::join(
            || {
                let mut subtree = Vec::new();
                build_node(ctx, &mut subtree, left_slots, left_rows, offset, depth + 1);
                subtree
            },
            || {
                let mut subtree = Vec::new();
                build_node(ctx, &mut subtree, right_slots, right_rows, right_offset, depth + 1);
                subtree
            },
        );
        let left_base = nodes.len() as u32;
        append_subtree(nodes, left, left_base);
        let right_base = nodes.len() as u32;
        nodes[node_index].set_right_child(right_base);
        append_subtree(nodes, right, right_base);
    } else {
        build_node(ctx, nodes, left_slots, left_rows, offset, depth + 1);
        let right_index = nodes.len() as u32;
        nodes[node_index].set_right_child(right_index);
        build_node(ctx, nodes, right_slots, right_rows, right_offset, depth + 1);
    }
}

/// Move a subtree built in its own buffer to position `base`, fixing right child indices
fn append_subtree(nodes: &mut Vec<BvhNode>, subtree: Vec<BvhNode>, base: u32) {
    nodes.reserve(subtree.len());
    for mut node in subtree {
        if !node.is_leaf() {
            node.set_right_child(node.right_child() + base);
        }
        nodes.push(node);
    }
}

fn push_leaf(ctx: &BuildContext, nodes: &mut Vec<BvhNode>, rows: &[[f32; 6]], bounds: &AABB, offset: u32) {
    let count = rows.len();
    if count > MAX_LEAF_COUNT as usize {
        // the count field is 16 bits wide
        let mid = count / 2;
        let node_index = nodes.len();
        nodes.push(BvhNode::internal(bounds, bounds.longest_axis(), 0));
        let (left, right) = rows.split_at(mid);
        push_leaf(ctx, nodes, left, &union_of_rows(left), offset);
        let right_index = nodes.len() as u32;
        nodes[node_index].set_right_child(right_index);
        push_leaf(ctx, nodes, right, &union_of_rows(right), offset + mid as u32);
        return;
    }

    nodes.push(BvhNode::leaf(bounds, offset, count as u32));
    if let Some(progress) = &ctx.progress {
        progress.advance(count);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use glam::Vec3A;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn random_rows(count: usize, seed: u64) -> Vec<[f32; 6]> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let center = rng.gen::<Vec3A>() * 10.0;
                AABB::new(center - Vec3A::splat(0.05), center + Vec3A::splat(0.05)).to_array()
            })
            .collect()
    }

    /// Walks a node buffer checking the layout, returns the covered slot count
    fn check_subtree(nodes: &[BvhNode], index: usize, rows_by_slot: &[[f32; 6]]) -> u32 {
        let node = nodes[index];
        let bounds = node.aabb();
        if node.is_leaf() {
            let start = node.primitive_offset() as usize;
            for row in &rows_by_slot[start..start + node.primitive_count() as usize] {
                assert!(bounds.contains_aabb(&AABB::from_array(row)));
            }
            return node.primitive_count();
        }
        let left = index + 1;
        let right = node.right_child() as usize;
        assert!(right > left && right < nodes.len());
        assert!(bounds.contains_aabb(&nodes[left].aabb()));
        assert!(bounds.contains_aabb(&nodes[right].aabb()));
        check_subtree(nodes, left, rows_by_slot) + check_subtree(nodes, right, rows_by_slot)
    }

    fn build_rows(ctx: &BuildContext, rows: &mut Vec<[f32; 6]>) -> (Vec<BvhNode>, Vec<u32>) {
        let mut ids: Vec<u32> = (0..rows.len() as u32).collect();
        let nodes = build_root(ctx, SlotsMut::Indirect(&mut ids), rows, 0);
        (nodes, ids)
    }

    #[test]
    fn every_strategy_builds_a_valid_tree() {
        for strategy in [SplitStrategy::Center, SplitStrategy::Average, SplitStrategy::Sah] {
            let ctx = BuildContext::new(strategy, 4, 40, false, None);
            let original = random_rows(500, 3);
            let mut rows = original.clone();
            let (nodes, ids) = build_rows(&ctx, &mut rows);

            assert_eq!(check_subtree(&nodes, 0, &rows), 500);
            for (slot, id) in ids.iter().enumerate() {
                assert_eq!(rows[slot], original[*id as usize]);
            }
            assert!(nodes.len() > 1);
        }
    }

    #[test]
    fn build_is_deterministic() {
        let ctx = BuildContext::new(SplitStrategy::Sah, 8, 40, false, None);
        let mut a = random_rows(300, 5);
        let mut b = a.clone();
        assert_eq!(build_rows(&ctx, &mut a), build_rows(&ctx, &mut b));
    }

    #[test]
    fn parallel_matches_sequential() {
        let sequential = BuildContext::new(SplitStrategy::Center, 10, 40, false, None);
        let parallel = BuildContext::new(SplitStrategy::Center, 10, 40, true, None);
        let mut a = random_rows(PARALLEL_THRESHOLD * 3, 9);
        let mut b = a.clone();
        assert_eq!(build_rows(&sequential, &mut a), build_rows(&parallel, &mut b));
    }

    #[test]
    fn coincident_primitives_form_one_leaf() {
        let ctx = BuildContext::new(SplitStrategy::Center, 2, 40, false, None);
        let mut rows = vec![[1.0_f32; 6]; 20];
        let (nodes, _) = build_rows(&ctx, &mut rows);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].primitive_count(), 20);
    }

    #[test]
    fn depth_limit_forces_leaves() {
        let ctx = BuildContext::new(SplitStrategy::Center, 1, 2, false, None);
        let mut rows = random_rows(64, 1);
        let (nodes, _) = build_rows(&ctx, &mut rows);
        // depth 0 and 1 split, everything at depth 2 is a leaf
        assert!(nodes.len() <= 7);
        assert_eq!(check_subtree(&nodes, 0, &rows), 64);
    }

    #[test]
    fn oversized_leaf_is_split() {
        let ctx = BuildContext::new(SplitStrategy::Center, 1, 40, false, None);
        let mut rows = vec![[0.0_f32; 6]; MAX_LEAF_COUNT as usize + 10];
        let (nodes, _) = build_rows(&ctx, &mut rows);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1].primitive_count() + nodes[2].primitive_count(), MAX_LEAF_COUNT + 10);
        assert_eq!(nodes[2].primitive_offset(), nodes[1].primitive_count());
    }

    #[test]
    fn progress_reaches_one() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p: f32| sink.lock().unwrap().push(p));
        let ctx = BuildContext::new(SplitStrategy::Center, 4, 40, false, Some(Progress::new(&callback, 100)));
        let mut rows = random_rows(100, 2);
        build_rows(&ctx, &mut rows);

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 1.0);
    }
}
