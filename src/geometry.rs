use glam::{Vec2, Vec3A};
use parking_lot::RwLockReadGuard;

use crate::{GeometryError, IndexBuffer, IndexRead, Primitive, PrimitiveKind, SharedBuffer, Triangle};

/// Read access to vertex positions by vertex id
pub trait VertexSource {
    fn vertex_count(&self) -> usize;
    fn vertex(&self, id: u32) -> Vec3A;
}

impl VertexSource for [Vec3A] {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.len()
    }

    #[inline]
    fn vertex(&self, id: u32) -> Vec3A {
        self[id as usize]
    }
}

/// Contiguous run of index entries (vertex ids for non-indexed geometry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    pub start: u32,
    pub count: u32,
}

impl Group {
    #[inline]
    pub fn new(start: u32, count: u32) -> Self {
        Self { start, count }
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.count)
    }
}

/// Mesh data the hierarchy is built over. Cloning aliases every buffer.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    positions: SharedBuffer<Vec3A>,
    index: Option<IndexBuffer>,
    groups: Vec<Group>,
    draw_range: Option<Group>,
    kind: PrimitiveKind,
    uvs: Option<SharedBuffer<Vec2>>,
    normals: Option<SharedBuffer<Vec3A>>,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3A>) -> Self {
        Self {
            positions: positions.into(),
            ..Default::default()
        }
    }

    /// Geometry from a flat `[x, y, z, x, y, z, ...]` array
    pub fn from_flat_positions(positions: &[f32]) -> Result<Self, GeometryError> {
        if positions.len() % 3 != 0 {
            return Err(GeometryError::PositionLength(positions.len()));
        }
        let positions = positions
            .chunks_exact(3)
            .map(|p| Vec3A::new(p[0], p[1], p[2]))
            .collect();
        Ok(Self::new(positions))
    }

    /// Non-indexed triangle soup
    pub fn from_triangles(triangles: &[Triangle]) -> Self {
        Self::new(triangles.iter().flat_map(|tri| tri.vertices()).collect())
    }

    pub fn with_index(mut self, index: impl Into<IndexBuffer>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_kind(mut self, kind: PrimitiveKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_groups(mut self, groups: Vec<Group>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_draw_range(mut self, draw_range: Group) -> Self {
        self.draw_range = Some(draw_range);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs.into());
        self
    }

    pub fn with_normals(mut self, normals: Vec<Vec3A>) -> Self {
        self.normals = Some(normals.into());
        self
    }

    #[inline]
    pub fn positions(&self) -> &SharedBuffer<Vec3A> {
        &self.positions
    }

    #[inline]
    pub fn index(&self) -> Option<&IndexBuffer> {
        self.index.as_ref()
    }

    pub fn set_index(&mut self, index: Option<IndexBuffer>) {
        self.index = index;
    }

    #[inline]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[inline]
    pub fn draw_range(&self) -> Option<Group> {
        self.draw_range
    }

    #[inline]
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn uvs(&self) -> Option<&SharedBuffer<Vec2>> {
        self.uvs.as_ref()
    }

    pub fn normals(&self) -> Option<&SharedBuffer<Vec3A>> {
        self.normals.as_ref()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Length of the index, or the vertex count for non-indexed geometry
    pub fn index_count(&self) -> usize {
        self.index
            .as_ref()
            .map_or_else(|| self.vertex_count(), IndexBuffer::len)
    }

    pub fn primitive_count(&self) -> usize {
        self.index_count() / self.kind.stride()
    }

    /// Copy of the geometry that shares no storage with `self`
    pub fn deep_clone(&self) -> Self {
        Self {
            positions: self.positions.deep_clone(),
            index: self.index.as_ref().map(IndexBuffer::deep_clone),
            groups: self.groups.clone(),
            draw_range: self.draw_range,
            kind: self.kind,
            uvs: self.uvs.as_ref().map(SharedBuffer::deep_clone),
            normals: self.normals.as_ref().map(SharedBuffer::deep_clone),
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let positions = self.positions.read();
        let vertex_count = positions.len();

        if let Some(bad) = positions.iter().position(|p| !p.is_finite()) {
            return Err(GeometryError::NonFinitePosition(bad));
        }

        let stride = self.kind.stride();
        match &self.index {
            Some(index) => {
                let index = index.read();
                if index.len() % stride != 0 {
                    return Err(GeometryError::IndexLength {
                        length: index.len(),
                        stride,
                    });
                }
                for position in 0..index.len() {
                    let vertex = index.get(position);
                    if vertex as usize >= vertex_count {
                        return Err(GeometryError::IndexOutOfRange {
                            position,
                            vertex,
                            vertex_count,
                        });
                    }
                }
            }
            None => {
                if vertex_count % stride != 0 {
                    return Err(GeometryError::IndexLength {
                        length: vertex_count,
                        stride,
                    });
                }
            }
        }

        if let Some(uvs) = &self.uvs {
            if uvs.len() != vertex_count {
                return Err(GeometryError::AttributeLength {
                    name: "uv",
                    length: uvs.len(),
                    vertex_count,
                });
            }
        }
        if let Some(normals) = &self.normals {
            if normals.len() != vertex_count {
                return Err(GeometryError::AttributeLength {
                    name: "normal",
                    length: normals.len(),
                    vertex_count,
                });
            }
        }

        Ok(())
    }

    /// Locks positions and index for reading
    pub fn view(&self) -> GeometryView<'_> {
        GeometryView {
            positions: self.positions.read(),
            index: self.index.as_ref().map(IndexBuffer::read),
            kind: self.kind,
        }
    }
}

/// Read-locked view resolving primitive ids to vertices
pub struct GeometryView<'a> {
    positions: RwLockReadGuard<'a, Vec<Vec3A>>,
    index: Option<IndexRead<'a>>,
    kind: PrimitiveKind,
}

impl GeometryView<'_> {
    #[inline]
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3A] {
        &self.positions
    }

    #[inline]
    pub fn vertex_id(&self, entry: usize) -> u32 {
        match &self.index {
            Some(index) => index.get(entry),
            None => entry as u32,
        }
    }

    /// Vertex ids of a primitive; a point repeats its single vertex
    pub fn primitive_vertex_ids(&self, primitive_id: u32) -> [u32; 3] {
        let stride = self.kind.stride();
        let first = primitive_id as usize * stride;
        match self.kind {
            PrimitiveKind::Triangles => [
                self.vertex_id(first),
                self.vertex_id(first + 1),
                self.vertex_id(first + 2),
            ],
            PrimitiveKind::Points => {
                let id = self.vertex_id(first);
                [id, id, id]
            }
        }
    }

    pub fn primitive(&self, primitive_id: u32) -> Primitive {
        let vertices: &[Vec3A] = &self.positions;
        let [a, b, c] = self.primitive_vertex_ids(primitive_id);
        match self.kind {
            PrimitiveKind::Triangles => Primitive::Triangle(Triangle::new(
                vertices.vertex(a),
                vertices.vertex(b),
                vertices.vertex(c),
            )),
            PrimitiveKind::Points => Primitive::Point(vertices.vertex(a)),
        }
    }

    pub fn primitive_count(&self) -> usize {
        let entries = self.index.as_ref().map_or(self.positions.len(), IndexRead::len);
        entries / self.kind.stride()
    }
}
