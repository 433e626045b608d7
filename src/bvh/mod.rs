//! Flat, multi-root bounding volume hierarchy over the triangles or points of a [`Geometry`].

mod background;
mod bounds_cache;
mod build;
mod bvhcast;
mod closest_point;
mod index_manager;
mod node;
mod partition;
mod raycast;
mod refit;
mod roots;
mod serialization;
mod shapecast;
mod spatial;
mod validation;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLockReadGuard;
use rayon::prelude::*;

pub use background::*;
pub use bounds_cache::{write_primitive_bounds, PrimitiveBounds};
pub use closest_point::*;
pub use index_manager::SlotsMut;
pub use node::*;
pub use partition::{partition, Partition};
pub use raycast::*;
pub use serialization::*;
pub use shapecast::*;
pub use validation::*;

pub(crate) use bounds_cache::row_centroid;

use crate::{BuildError, Geometry, GeometryView, Grow, Primitive, SharedBuffer, SplitStrategy, AABB};

use build::{build_root, BuildContext, Progress};
use index_manager::{ensure_index, IndexManager};
use roots::root_ranges;

/// Receives the built fraction of primitives, in `[0, 1]`
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

#[derive(Clone)]
pub struct BuildOptions {
    pub strategy: SplitStrategy,
    /// Nodes with at most this many primitives become leaves
    pub max_leaf_size: u32,
    /// Nodes at this depth become leaves regardless of size
    pub max_depth: u32,
    /// Keep the geometry index untouched and reorder an owned permutation instead
    pub indirect: bool,
    /// Only build over this primitive range
    pub range: Option<Range<u32>>,
    /// Build roots and large subtrees on the rayon pool
    pub parallel: bool,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            strategy: SplitStrategy::Center,
            max_leaf_size: 10,
            max_depth: 40,
            indirect: false,
            range: None,
            parallel: false,
            on_progress: None,
        }
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("strategy", &self.strategy)
            .field("max_leaf_size", &self.max_leaf_size)
            .field("max_depth", &self.max_depth)
            .field("indirect", &self.indirect)
            .field("range", &self.range)
            .field("parallel", &self.parallel)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct MeshBvh {
    geometry: Geometry,
    roots: Vec<SharedBuffer<BvhNode>>,
    indirect: Option<SharedBuffer<u32>>,
    depth: u32,
}

type RootJob<'a> = (SlotsMut<'a>, &'a mut [[f32; 6]], u32);

/// Split the slot storage and bounds rows into one disjoint piece per root
fn carve_roots<'a>(
    mut slots: SlotsMut<'a>,
    mut rows: &'a mut [[f32; 6]],
    ranges: &[Range<u32>],
) -> Vec<RootJob<'a>> {
    let mut jobs = Vec::with_capacity(ranges.len());
    let mut cursor = 0;
    for range in ranges {
        let skip = (range.start - cursor) as usize;
        let len = (range.end - range.start) as usize;

        let (_, tail) = slots.split_at_mut(skip);
        let (root_slots, tail) = tail.split_at_mut(len);
        let (_, tail_rows) = std::mem::take(&mut rows).split_at_mut(skip);
        let (root_rows, tail_rows) = tail_rows.split_at_mut(len);

        jobs.push((root_slots, root_rows, range.start));
        slots = tail;
        rows = tail_rows;
        cursor = range.end;
    }
    jobs
}

impl MeshBvh {
    /// Build a hierarchy over `geometry`. In direct mode the geometry's index is reordered,
    /// and created first if the geometry has none.
    pub fn new(geometry: &mut Geometry, options: BuildOptions) -> Result<Self, BuildError> {
        if options.max_leaf_size == 0 {
            return Err(BuildError::ZeroOption("max_leaf_size"));
        }
        if options.max_depth == 0 {
            return Err(BuildError::ZeroOption("max_depth"));
        }
        geometry.validate()?;

        let ranges = root_ranges(geometry, options.range.clone())?;
        let index = if options.indirect {
            None
        } else {
            Some(ensure_index(geometry))
        };

        let mut bounds = PrimitiveBounds::compute(&geometry.view(), options.parallel);

        let total: usize = ranges.iter().map(|r| (r.end - r.start) as usize).sum();
        let progress = options
            .on_progress
            .as_ref()
            .map(|callback| Progress::new(callback, total));
        let ctx = BuildContext::new(
            options.strategy,
            options.max_leaf_size,
            options.max_depth,
            options.parallel,
            progress,
        );

        let mut indirect_ids: Vec<u32> = Vec::new();
        let mut manager = match &index {
            Some(index) => IndexManager::direct(index, geometry.kind().stride()),
            None => {
                indirect_ids = (0..bounds.len() as u32).collect();
                IndexManager::indirect(&mut indirect_ids)
            }
        };

        let jobs = carve_roots(manager.slots(), &mut bounds.rows, &ranges);
        let built: Vec<Vec<BvhNode>> = if options.parallel {
            jobs.into_par_iter()
                .map(|(slots, rows, offset)| build_root(&ctx, slots, rows, offset))
                .collect()
        } else {
            jobs.into_iter()
                .map(|(slots, rows, offset)| build_root(&ctx, slots, rows, offset))
                .collect()
        };
        drop(manager);

        if let Some(progress) = &ctx.progress {
            progress.finish();
        }

        let node_count: usize = built.iter().map(Vec::len).sum();
        let roots = built.into_iter().map(SharedBuffer::new).collect();
        let indirect = options.indirect.then(|| SharedBuffer::new(indirect_ids));
        let bvh = Self::from_parts(geometry.clone(), roots, indirect);

        debug!(
            "built {} roots with {} nodes over {} primitives, depth {} (strategy {}, {})",
            bvh.roots.len(),
            node_count,
            total,
            bvh.depth,
            options.strategy,
            if options.indirect { "indirect" } else { "direct" }
        );

        Ok(bvh)
    }

    pub(crate) fn from_parts(
        geometry: Geometry,
        roots: Vec<SharedBuffer<BvhNode>>,
        indirect: Option<SharedBuffer<u32>>,
    ) -> Self {
        let depth = roots
            .iter()
            .map(|root| tree_depth(&root.read()))
            .max()
            .unwrap_or(0);
        Self {
            geometry,
            roots,
            indirect,
            depth,
        }
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn roots(&self) -> &[SharedBuffer<BvhNode>] {
        &self.roots
    }

    #[inline]
    pub fn indirect_buffer(&self) -> Option<&SharedBuffer<u32>> {
        self.indirect.as_ref()
    }

    #[inline]
    pub fn is_indirect(&self) -> bool {
        self.indirect.is_some()
    }

    /// Bounds of every root together
    pub fn bounds(&self) -> AABB {
        let mut aabb = AABB::default();
        for root in &self.roots {
            if let Some(node) = root.read().first() {
                aabb.grow(&node.aabb());
            }
        }
        aabb
    }

    /// Read-locks geometry and permutation for a query
    pub(crate) fn reader(&self) -> PrimitiveReader<'_> {
        PrimitiveReader {
            view: self.geometry.view(),
            indirect: self.indirect.as_ref().map(SharedBuffer::read),
        }
    }
}

/// Resolves leaf slots to primitive ids and primitives
pub(crate) struct PrimitiveReader<'a> {
    view: GeometryView<'a>,
    indirect: Option<RwLockReadGuard<'a, Vec<u32>>>,
}

impl PrimitiveReader<'_> {
    #[inline]
    pub fn view(&self) -> &GeometryView<'_> {
        &self.view
    }

    /// Primitive id stored at `slot`
    #[inline]
    pub fn resolve(&self, slot: u32) -> u32 {
        match &self.indirect {
            Some(ids) => ids[slot as usize],
            None => slot,
        }
    }

    #[inline]
    pub fn primitive(&self, primitive_id: u32) -> Primitive {
        self.view.primitive(primitive_id)
    }

    #[inline]
    pub fn slot_primitive(&self, slot: u32) -> (u32, Primitive) {
        let id = self.resolve(slot);
        (id, self.primitive(id))
    }
}
