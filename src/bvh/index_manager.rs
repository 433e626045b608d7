//! Slot storage the builder reorders: the geometry's own index (direct) or an owned
//! permutation of primitive ids (indirect).

use parking_lot::RwLockWriteGuard;

use crate::{Geometry, IndexBuffer};

/// Mutable view over a run of primitive slots. In direct mode a slot is `stride` index entries.
pub enum SlotsMut<'a> {
    Direct16 { index: &'a mut [u16], stride: usize },
    Direct32 { index: &'a mut [u32], stride: usize },
    Indirect(&'a mut [u32]),
}

impl<'a> SlotsMut<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            SlotsMut::Direct16 { index, stride } => index.len() / stride,
            SlotsMut::Direct32 { index, stride } => index.len() / stride,
            SlotsMut::Indirect(ids) => ids.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn swap(&mut self, a: usize, b: usize) {
        match self {
            SlotsMut::Direct16 { index, stride } => swap_rows(index, *stride, a, b),
            SlotsMut::Direct32 { index, stride } => swap_rows(index, *stride, a, b),
            SlotsMut::Indirect(ids) => ids.swap(a, b),
        }
    }

    /// Split into slots `[0, mid)` and `[mid, len)`
    pub fn split_at_mut(self, mid: usize) -> (SlotsMut<'a>, SlotsMut<'a>) {
        match self {
            SlotsMut::Direct16 { index, stride } => {
                let (left, right) = index.split_at_mut(mid * stride);
                (
                    SlotsMut::Direct16 { index: left, stride },
                    SlotsMut::Direct16 { index: right, stride },
                )
            }
            SlotsMut::Direct32 { index, stride } => {
                let (left, right) = index.split_at_mut(mid * stride);
                (
                    SlotsMut::Direct32 { index: left, stride },
                    SlotsMut::Direct32 { index: right, stride },
                )
            }
            SlotsMut::Indirect(ids) => {
                let (left, right) = ids.split_at_mut(mid);
                (SlotsMut::Indirect(left), SlotsMut::Indirect(right))
            }
        }
    }
}

#[inline]
fn swap_rows<T>(index: &mut [T], stride: usize, a: usize, b: usize) {
    if a == b {
        return;
    }
    for k in 0..stride {
        index.swap(a * stride + k, b * stride + k);
    }
}

/// Write access to the slot storage for the duration of a build
pub enum IndexManager<'a> {
    Direct16 {
        index: RwLockWriteGuard<'a, Vec<u16>>,
        stride: usize,
    },
    Direct32 {
        index: RwLockWriteGuard<'a, Vec<u32>>,
        stride: usize,
    },
    Indirect(&'a mut Vec<u32>),
}

impl<'a> IndexManager<'a> {
    /// Direct mode over the geometry's index buffer, which must exist
    pub fn direct(index: &'a IndexBuffer, stride: usize) -> Self {
        match index {
            IndexBuffer::U16(index) => IndexManager::Direct16 {
                index: index.write(),
                stride,
            },
            IndexBuffer::U32(index) => IndexManager::Direct32 {
                index: index.write(),
                stride,
            },
        }
    }

    pub fn indirect(ids: &'a mut Vec<u32>) -> Self {
        IndexManager::Indirect(ids)
    }

    pub fn slots(&mut self) -> SlotsMut<'_> {
        match self {
            IndexManager::Direct16 { index, stride } => SlotsMut::Direct16 {
                index: &mut index[..],
                stride: *stride,
            },
            IndexManager::Direct32 { index, stride } => SlotsMut::Direct32 {
                index: &mut index[..],
                stride: *stride,
            },
            IndexManager::Indirect(ids) => SlotsMut::Indirect(&mut ids[..]),
        }
    }
}

/// Give the geometry an identity index if it has none, so direct mode can reorder it.
/// Returns a handle aliasing the geometry's index.
pub fn ensure_index(geometry: &mut Geometry) -> IndexBuffer {
    if let Some(index) = geometry.index() {
        return index.clone();
    }
    let identity = IndexBuffer::identity(geometry.vertex_count());
    geometry.set_index(Some(identity.clone()));
    identity
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::*;

    #[test]
    fn direct_swap_moves_whole_triangles() {
        let mut index = vec![0_u16, 1, 2, 3, 4, 5, 6, 7, 8];
        let mut slots = SlotsMut::Direct16 {
            index: &mut index,
            stride: 3,
        };
        assert_eq!(slots.len(), 3);
        slots.swap(0, 2);
        assert_eq!(index, vec![6, 7, 8, 3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn split_keeps_stride() {
        let mut index = vec![0_u32; 12];
        let slots = SlotsMut::Direct32 {
            index: &mut index,
            stride: 3,
        };
        let (left, right) = slots.split_at_mut(1);
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 3);

        let mut ids = vec![0, 1, 2, 3];
        let (left, mut right) = SlotsMut::Indirect(&mut ids).split_at_mut(2);
        assert_eq!(left.len(), 2);
        right.swap(0, 1);
        assert_eq!(ids, vec![0, 1, 3, 2]);
    }

    #[test]
    fn identity_index_is_created_once() {
        let mut geometry = Geometry::new(vec![Vec3A::ZERO, Vec3A::X, Vec3A::Y]);
        let index = ensure_index(&mut geometry);
        assert_eq!(index.to_u32_vec(), vec![0, 1, 2]);
        assert!(geometry.index().unwrap().ptr_eq(&index));
        assert!(ensure_index(&mut geometry).ptr_eq(&index));
    }
}
