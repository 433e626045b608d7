use std::sync::Arc;

use num::{NumCast, PrimInt, ToPrimitive};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Buffer shared by reference. Cloning aliases the storage, [`SharedBuffer::deep_clone`] copies it.
#[derive(Debug)]
pub struct SharedBuffer<T> {
    data: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

impl<T> Default for SharedBuffer<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> From<Vec<T>> for SharedBuffer<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

impl<T> SharedBuffer<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Read access. Recursive so nested traversals of the same buffer never deadlock
    /// behind a queued writer.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read_recursive()
    }

    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if both handles point to the same storage
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn replace(&self, data: Vec<T>) -> Vec<T> {
        std::mem::replace(&mut *self.write(), data)
    }
}

impl<T: Clone> SharedBuffer<T> {
    pub fn deep_clone(&self) -> Self {
        Self::new(self.read().clone())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.read().clone()
    }
}

/// Primitive index buffer with 16 or 32 bit entries
#[derive(Debug, Clone)]
pub enum IndexBuffer {
    U16(SharedBuffer<u16>),
    U32(SharedBuffer<u32>),
}

/// Read guard over either index width
pub enum IndexRead<'a> {
    U16(RwLockReadGuard<'a, Vec<u16>>),
    U32(RwLockReadGuard<'a, Vec<u32>>),
}

impl IndexRead<'_> {
    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        match self {
            IndexRead::U16(index) => index[i] as u32,
            IndexRead::U32(index) => index[i],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            IndexRead::U16(index) => index.len(),
            IndexRead::U32(index) => index.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u16>> for IndexBuffer {
    fn from(index: Vec<u16>) -> Self {
        IndexBuffer::U16(index.into())
    }
}

impl From<Vec<u32>> for IndexBuffer {
    fn from(index: Vec<u32>) -> Self {
        IndexBuffer::U32(index.into())
    }
}

/// `0..count` in the requested integer type, `None` if `count` does not fit
pub fn identity_index<T: PrimInt>(count: usize) -> Option<Vec<T>> {
    (0..count).map(<T as NumCast>::from).collect()
}

impl IndexBuffer {
    /// Identity index over `vertex_count` vertices, 16 bit when every id fits
    pub fn identity(vertex_count: usize) -> Self {
        match identity_index::<u16>(vertex_count) {
            Some(index) => IndexBuffer::U16(index.into()),
            None => IndexBuffer::U32(
                (0..vertex_count)
                    .map(|i| i.to_u32().unwrap_or(u32::MAX))
                    .collect::<Vec<_>>()
                    .into(),
            ),
        }
    }

    #[inline]
    pub fn read(&self) -> IndexRead<'_> {
        match self {
            IndexBuffer::U16(index) => IndexRead::U16(index.read()),
            IndexBuffer::U32(index) => IndexRead::U32(index.read()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U16(index) => index.len(),
            IndexBuffer::U32(index) => index.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_u32(&self) -> bool {
        matches!(self, IndexBuffer::U32(_))
    }

    pub fn ptr_eq(&self, other: &IndexBuffer) -> bool {
        match (self, other) {
            (IndexBuffer::U16(a), IndexBuffer::U16(b)) => a.ptr_eq(b),
            (IndexBuffer::U32(a), IndexBuffer::U32(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn deep_clone(&self) -> Self {
        match self {
            IndexBuffer::U16(index) => IndexBuffer::U16(index.deep_clone()),
            IndexBuffer::U32(index) => IndexBuffer::U32(index.deep_clone()),
        }
    }

    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            IndexBuffer::U16(index) => index.read().iter().map(|&i| i as u32).collect(),
            IndexBuffer::U32(index) => index.to_vec(),
        }
    }

    /// Largest entry, `None` for an empty buffer
    pub fn max_value(&self) -> Option<u32> {
        match self {
            IndexBuffer::U16(index) => index.read().iter().max().map(|&i| i as u32),
            IndexBuffer::U32(index) => index.read().iter().max().copied(),
        }
    }
}
