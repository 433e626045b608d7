use bytemuck::{Pod, Zeroable};

use crate::{Axis, AABB};

/// Tag value marking a leaf; the low 16 bits hold the primitive count
pub const LEAF_FLAG: u32 = 0xFFFF_0000;
/// Largest primitive count a single leaf can hold
pub const MAX_LEAF_COUNT: u32 = 0xFFFF;
/// Size of one node in a root buffer
pub const NODE_BYTES: usize = 32;

/// Packed node: 6 bounds floats, then either `(LEAF_FLAG | count, offset)` for a leaf or
/// `(split axis, right child index)` for an internal node. The left child of an internal
/// node is always the next node.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub bounds: [f32; 6],
    tag: u32,
    data: u32,
}

const _: () = assert!(std::mem::size_of::<BvhNode>() == NODE_BYTES);

impl BvhNode {
    #[inline]
    pub fn leaf(bounds: &AABB, offset: u32, count: u32) -> Self {
        debug_assert!(count <= MAX_LEAF_COUNT);
        Self {
            bounds: bounds.to_array(),
            tag: LEAF_FLAG | (count & MAX_LEAF_COUNT),
            data: offset,
        }
    }

    #[inline]
    pub fn internal(bounds: &AABB, axis: Axis, right_child: u32) -> Self {
        Self {
            bounds: bounds.to_array(),
            tag: axis.index() as u32,
            data: right_child,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.tag & LEAF_FLAG == LEAF_FLAG
    }

    #[inline]
    pub fn aabb(&self) -> AABB {
        AABB::from_array(&self.bounds)
    }

    #[inline]
    pub fn set_aabb(&mut self, aabb: &AABB) {
        self.bounds = aabb.to_array();
    }

    #[inline]
    pub fn primitive_count(&self) -> u32 {
        debug_assert!(self.is_leaf());
        self.tag & MAX_LEAF_COUNT
    }

    #[inline]
    pub fn primitive_offset(&self) -> u32 {
        debug_assert!(self.is_leaf());
        self.data
    }

    #[inline]
    pub fn set_primitive_offset(&mut self, offset: u32) {
        debug_assert!(self.is_leaf());
        self.data = offset;
    }

    #[inline]
    pub fn split_axis(&self) -> Axis {
        debug_assert!(!self.is_leaf());
        Axis::from_index(self.tag & MAX_LEAF_COUNT).unwrap_or(Axis::X)
    }

    #[inline]
    pub fn right_child(&self) -> u32 {
        debug_assert!(!self.is_leaf());
        self.data
    }

    #[inline]
    pub fn set_right_child(&mut self, right_child: u32) {
        debug_assert!(!self.is_leaf());
        self.data = right_child;
    }

    /// Raw tag and payload words, as stored at bytes 24..32
    #[inline]
    pub fn words(&self) -> (u32, u32) {
        (self.tag, self.data)
    }

    pub fn to_le_bytes(&self) -> [u8; NODE_BYTES] {
        let mut bytes = [0_u8; NODE_BYTES];
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(
            self.bounds
                .iter()
                .map(|f| f.to_bits())
                .chain([self.tag, self.data]),
        ) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_le_bytes(bytes: &[u8; NODE_BYTES]) -> Self {
        let mut words = [0_u32; 8];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self {
            bounds: std::array::from_fn(|i| f32::from_bits(words[i])),
            tag: words[6],
            data: words[7],
        }
    }
}

/// Native-endian byte view of a node buffer
#[inline]
pub fn nodes_as_bytes(nodes: &[BvhNode]) -> &[u8] {
    bytemuck::cast_slice(nodes)
}
