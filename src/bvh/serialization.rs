//! Transferable form of a hierarchy, and a little-endian binary encoding of it.
//!
//! Stream layout: magic `MBVH`, then `u32` version, flags and root count; each root is a
//! `u32` node count followed by its 32 byte nodes; then the optional index (`u32` length,
//! entries as `u16` or `u32`) and the optional indirect buffer (`u32` length, `u32` ids).

use std::io::{Read, Write};

use log::debug;

use super::{nodes_as_bytes, BvhNode, MeshBvh, NODE_BYTES};
use crate::{DeserializeError, Geometry, IndexBuffer, SharedBuffer};

const MAGIC: [u8; 4] = *b"MBVH";
const VERSION: u32 = 1;

const FLAG_INDEX: u32 = 1;
const FLAG_INDEX_U32: u32 = 1 << 1;
const FLAG_INDIRECT: u32 = 1 << 2;

#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions {
    /// Copy the buffers; otherwise the serialized form aliases the hierarchy's storage
    pub clone_buffers: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { clone_buffers: true }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeserializeOptions {
    /// Install the serialized index on the target geometry
    pub set_index: bool,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self { set_index: true }
    }
}

#[derive(Debug, Clone)]
pub struct SerializedBvh {
    pub roots: Vec<SharedBuffer<BvhNode>>,
    pub index: Option<IndexBuffer>,
    pub indirect_buffer: Option<SharedBuffer<u32>>,
}

impl MeshBvh {
    pub fn serialize(&self, options: SerializeOptions) -> SerializedBvh {
        let share = |buffer: &SharedBuffer<BvhNode>| {
            if options.clone_buffers {
                buffer.deep_clone()
            } else {
                buffer.clone()
            }
        };
        SerializedBvh {
            roots: self.roots.iter().map(share).collect(),
            index: self.geometry.index().map(|index| {
                if options.clone_buffers {
                    index.deep_clone()
                } else {
                    index.clone()
                }
            }),
            indirect_buffer: self.indirect.as_ref().map(|indirect| {
                if options.clone_buffers {
                    indirect.deep_clone()
                } else {
                    indirect.clone()
                }
            }),
        }
    }

    /// Rebuild a hierarchy over `geometry` from `data`, sharing `data`'s buffers. Fails if
    /// the buffers do not fit the geometry.
    pub fn deserialize(
        data: &SerializedBvh,
        geometry: &mut Geometry,
        options: DeserializeOptions,
    ) -> Result<MeshBvh, DeserializeError> {
        let index_count = geometry.index_count();
        if let Some(index) = &data.index {
            if index.len() != index_count {
                return Err(DeserializeError::IndexMismatch {
                    expected: index_count,
                    actual: index.len(),
                });
            }
        }

        let primitive_count = index_count / geometry.kind().stride();
        if let Some(indirect) = &data.indirect_buffer {
            // every id must name a primitive of this geometry
            if indirect.len() != primitive_count || indirect.read().iter().any(|&id| id as usize >= primitive_count) {
                return Err(DeserializeError::IndirectMismatch {
                    expected: primitive_count,
                    actual: indirect.len(),
                });
            }
        }

        for (root, buffer) in data.roots.iter().enumerate() {
            check_root(root, &buffer.read(), primitive_count)?;
        }

        if options.set_index {
            if let Some(index) = &data.index {
                geometry.set_index(Some(index.clone()));
            }
        }

        debug!(
            "deserialized {} roots over {} primitives{}",
            data.roots.len(),
            primitive_count,
            if data.indirect_buffer.is_some() { " (indirect)" } else { "" }
        );

        Ok(MeshBvh::from_parts(
            geometry.clone(),
            data.roots.clone(),
            data.indirect_buffer.clone(),
        ))
    }
}

fn check_root(root: usize, nodes: &[BvhNode], slots: usize) -> Result<(), DeserializeError> {
    let malformed = |reason: String| DeserializeError::MalformedRoot { root, reason };
    if nodes.is_empty() {
        return Err(malformed("empty node buffer".to_string()));
    }
    for (index, node) in nodes.iter().enumerate() {
        if node.is_leaf() {
            let end = node.primitive_offset() as u64 + node.primitive_count() as u64;
            if end > slots as u64 {
                return Err(DeserializeError::SlotOutOfRange { root, end, slots });
            }
            continue;
        }
        let (axis, right) = node.words();
        if axis > 2 {
            return Err(malformed(format!("node {} has split axis {}", index, axis)));
        }
        let right = right as usize;
        if right <= index + 1 || right >= nodes.len() {
            return Err(malformed(format!("node {} has right child {} of {}", index, right, nodes.len())));
        }
    }
    Ok(())
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn read_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    let mut bytes = [0_u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u16<R: Read>(reader: &mut R) -> std::io::Result<u16> {
    let mut bytes = [0_u8; 2];
    reader.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

/// Preallocation cap for lengths read from a stream
const MAX_PREALLOCATION: usize = 1 << 16;

impl SerializedBvh {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut flags = 0;
        if let Some(index) = &self.index {
            flags |= FLAG_INDEX;
            if index.is_u32() {
                flags |= FLAG_INDEX_U32;
            }
        }
        if self.indirect_buffer.is_some() {
            flags |= FLAG_INDIRECT;
        }

        writer.write_all(&MAGIC)?;
        write_u32(writer, VERSION)?;
        write_u32(writer, flags)?;
        write_u32(writer, self.roots.len() as u32)?;

        for root in &self.roots {
            let nodes = root.read();
            write_u32(writer, nodes.len() as u32)?;
            if cfg!(target_endian = "little") {
                writer.write_all(nodes_as_bytes(&nodes))?;
            } else {
                for node in nodes.iter() {
                    writer.write_all(&node.to_le_bytes())?;
                }
            }
        }

        match &self.index {
            Some(IndexBuffer::U16(index)) => {
                let index = index.read();
                write_u32(writer, index.len() as u32)?;
                for value in index.iter() {
                    writer.write_all(&value.to_le_bytes())?;
                }
            }
            Some(IndexBuffer::U32(index)) => {
                let index = index.read();
                write_u32(writer, index.len() as u32)?;
                for &value in index.iter() {
                    write_u32(writer, value)?;
                }
            }
            None => {}
        }

        if let Some(indirect) = &self.indirect_buffer {
            let indirect = indirect.read();
            write_u32(writer, indirect.len() as u32)?;
            for &value in indirect.iter() {
                write_u32(writer, value)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<SerializedBvh, DeserializeError> {
        let mut magic = [0_u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(DeserializeError::BadMagic);
        }
        let version = read_u32(reader)?;
        if version != VERSION {
            return Err(DeserializeError::UnsupportedVersion(version));
        }
        let flags = read_u32(reader)?;
        let root_count = read_u32(reader)? as usize;

        let mut roots = Vec::with_capacity(root_count.min(MAX_PREALLOCATION));
        for _ in 0..root_count {
            let count = read_u32(reader)? as usize;
            let mut nodes = Vec::with_capacity(count.min(MAX_PREALLOCATION));
            let mut bytes = [0_u8; NODE_BYTES];
            for _ in 0..count {
                reader.read_exact(&mut bytes)?;
                nodes.push(BvhNode::from_le_bytes(&bytes));
            }
            roots.push(SharedBuffer::new(nodes));
        }

        let index = if flags & FLAG_INDEX != 0 {
            let len = read_u32(reader)? as usize;
            let buffer = if flags & FLAG_INDEX_U32 != 0 {
                let mut values = Vec::with_capacity(len.min(MAX_PREALLOCATION));
                for _ in 0..len {
                    values.push(read_u32(reader)?);
                }
                IndexBuffer::from(values)
            } else {
                let mut values = Vec::with_capacity(len.min(MAX_PREALLOCATION));
                for _ in 0..len {
                    values.push(read_u16(reader)?);
                }
                IndexBuffer::from(values)
            };
            Some(buffer)
        } else {
            None
        };

        let indirect_buffer = if flags & FLAG_INDIRECT != 0 {
            let len = read_u32(reader)? as usize;
            let mut values = Vec::with_capacity(len.min(MAX_PREALLOCATION));
            for _ in 0..len {
                values.push(read_u32(reader)?);
            }
            Some(SharedBuffer::new(values))
        } else {
            None
        };

        Ok(SerializedBvh {
            roots,
            index,
            indirect_buffer,
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::super::test_util::*;
    use super::*;
    use crate::{BuildOptions, Group, Ray, RaycastOptions};

    fn node_buffers(roots: &[SharedBuffer<BvhNode>]) -> Vec<Vec<BvhNode>> {
        roots.iter().map(SharedBuffer::to_vec).collect()
    }

    #[test]
    fn round_trip_is_exact() {
        for indirect in [false, true] {
            let mut geometry = random_geometry(300, 71).with_groups(vec![Group::new(0, 450), Group::new(450, 450)]);
            let bvh = MeshBvh::new(
                &mut geometry,
                BuildOptions {
                    indirect,
                    ..Default::default()
                },
            )
            .unwrap();
            let data = bvh.serialize(SerializeOptions::default());

            let mut target = geometry.deep_clone();
            let restored = MeshBvh::deserialize(&data, &mut target, DeserializeOptions::default()).unwrap();
            assert_eq!(node_buffers(restored.roots()), node_buffers(bvh.roots()));
            assert_eq!(restored.is_indirect(), indirect);
            assert_eq!(
                restored.indirect_buffer().map(SharedBuffer::to_vec),
                bvh.indirect_buffer().map(SharedBuffer::to_vec)
            );
            assert_eq!(target.index().unwrap().to_u32_vec(), geometry.index().unwrap().to_u32_vec());
            assert_eq!(restored.depth(), bvh.depth());
            assert!(restored.validate_bounds());

            let ray = Ray::infinite_ray(Vec3A::splat(-9.0), Vec3A::ONE.normalize());
            assert_eq!(
                restored.raycast(&ray, &RaycastOptions::default()),
                bvh.raycast(&ray, &RaycastOptions::default())
            );
        }
    }

    #[test]
    fn set_index_option_controls_the_target_index() {
        let mut geometry = random_geometry(100, 75);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        let data = bvh.serialize(SerializeOptions::default());

        let mut untouched = random_geometry(100, 75);
        let before = untouched.index().unwrap().clone();
        let before_ids = before.to_u32_vec();
        let restored = MeshBvh::deserialize(&data, &mut untouched, DeserializeOptions { set_index: false }).unwrap();
        assert!(untouched.index().unwrap().ptr_eq(&before));
        assert_eq!(untouched.index().unwrap().to_u32_vec(), before_ids);
        assert_ne!(before_ids, geometry.index().unwrap().to_u32_vec());
        assert_eq!(node_buffers(restored.roots()), node_buffers(bvh.roots()));

        let mut installed = random_geometry(100, 75);
        MeshBvh::deserialize(&data, &mut installed, DeserializeOptions { set_index: true }).unwrap();
        assert!(installed.index().unwrap().ptr_eq(data.index.as_ref().unwrap()));
        assert!(!installed.index().unwrap().ptr_eq(&before));
    }

    #[test]
    fn clone_buffers_controls_aliasing() {
        let mut geometry = random_geometry(50, 72);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();

        let shared = bvh.serialize(SerializeOptions { clone_buffers: false });
        let copied = bvh.serialize(SerializeOptions { clone_buffers: true });
        assert!(shared.roots[0].ptr_eq(&bvh.roots()[0]));
        assert!(!copied.roots[0].ptr_eq(&bvh.roots()[0]));
        assert!(shared.index.as_ref().unwrap().ptr_eq(geometry.index().unwrap()));

        shared.roots[0].write()[0].bounds[0] = -1000.0;
        assert_eq!(bvh.roots()[0].read()[0].bounds[0], -1000.0);
        assert_ne!(copied.roots[0].read()[0].bounds[0], -1000.0);

        // a deserialized hierarchy shares the serialized storage
        let mut target = geometry.clone();
        let restored = MeshBvh::deserialize(&copied, &mut target, DeserializeOptions::default()).unwrap();
        copied.roots[0].write()[0].bounds[1] = -2000.0;
        assert_eq!(restored.roots()[0].read()[0].bounds[1], -2000.0);
    }

    #[test]
    fn mismatched_geometry_is_rejected() {
        let mut geometry = random_geometry(40, 73);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        let data = bvh.serialize(SerializeOptions::default());

        let mut smaller = random_geometry(20, 74);
        assert!(matches!(
            MeshBvh::deserialize(&data, &mut smaller, DeserializeOptions::default()),
            Err(DeserializeError::IndexMismatch { expected: 60, actual: 120 })
        ));

        let mut broken = data.clone();
        broken.index = None;
        broken.roots = vec![SharedBuffer::new(vec![BvhNode::leaf(&bvh.bounds(), 30, 20)])];
        assert!(matches!(
            MeshBvh::deserialize(&broken, &mut geometry, DeserializeOptions::default()),
            Err(DeserializeError::SlotOutOfRange { end: 50, slots: 40, .. })
        ));

        broken.roots = vec![SharedBuffer::default()];
        assert!(matches!(
            MeshBvh::deserialize(&broken, &mut geometry, DeserializeOptions::default()),
            Err(DeserializeError::MalformedRoot { root: 0, .. })
        ));
    }

    #[test]
    fn binary_stream_round_trip() {
        for indirect in [false, true] {
            let mut geometry = random_geometry(120, 75);
            let bvh = MeshBvh::new(
                &mut geometry,
                BuildOptions {
                    indirect,
                    ..Default::default()
                },
            )
            .unwrap();
            let data = bvh.serialize(SerializeOptions::default());

            let mut bytes = Vec::new();
            data.write_to(&mut bytes).unwrap();
            assert_eq!(&bytes[..4], b"MBVH");
            let read = SerializedBvh::read_from(&mut bytes.as_slice()).unwrap();

            assert_eq!(node_buffers(&read.roots), node_buffers(&data.roots));
            assert_eq!(
                read.index.as_ref().map(IndexBuffer::to_u32_vec),
                data.index.as_ref().map(IndexBuffer::to_u32_vec)
            );
            assert_eq!(read.index.as_ref().unwrap().is_u32(), data.index.as_ref().unwrap().is_u32());
            assert_eq!(
                read.indirect_buffer.as_ref().map(SharedBuffer::to_vec),
                data.indirect_buffer.as_ref().map(SharedBuffer::to_vec)
            );
        }
    }

    #[test]
    fn truncated_or_foreign_streams_fail() {
        let mut geometry = random_geometry(10, 76);
        let bvh = MeshBvh::new(&mut geometry, BuildOptions::default()).unwrap();
        let mut bytes = Vec::new();
        bvh.serialize(SerializeOptions::default()).write_to(&mut bytes).unwrap();

        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            SerializedBvh::read_from(&mut &truncated[..]),
            Err(DeserializeError::Io(_))
        ));

        let mut foreign = bytes.clone();
        foreign[0] = b'X';
        assert!(matches!(
            SerializedBvh::read_from(&mut foreign.as_slice()),
            Err(DeserializeError::BadMagic)
        ));

        let mut future = bytes;
        future[4] = 9;
        assert!(matches!(
            SerializedBvh::read_from(&mut future.as_slice()),
            Err(DeserializeError::UnsupportedVersion(9))
        ));
    }
}
