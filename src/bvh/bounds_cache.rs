use glam::Vec3A;
use rayon::prelude::*;

use crate::{Axis, GeometryView, Grow, PrimitiveKind, VertexSource, AABB};

/// Write the `[minx, miny, minz, maxx, maxy, maxz]` box of a primitive's vertices at `out[offset..offset + 6]`
#[inline]
pub fn write_primitive_bounds(vertices: &[Vec3A], out: &mut [f32], offset: usize) {
    let mut min = Vec3A::splat(f32::INFINITY);
    let mut max = Vec3A::splat(-f32::INFINITY);
    for &v in vertices {
        min = min.min(v);
        max = max.max(v);
    }
    out[offset..offset + 3].copy_from_slice(&min.to_array());
    out[offset + 3..offset + 6].copy_from_slice(&max.to_array());
}

/// Per-slot primitive boxes, alive for one build
pub struct PrimitiveBounds {
    pub rows: Vec<[f32; 6]>,
}

impl PrimitiveBounds {
    /// Boxes of every primitive of `view`, row `i` for primitive id `i`
    pub fn compute(view: &GeometryView, parallel: bool) -> Self {
        let count = view.primitive_count();
        let mut rows = vec![[0.0_f32; 6]; count];

        let fill = |(id, row): (usize, &mut [f32; 6])| {
            let ids = view.primitive_vertex_ids(id as u32);
            let vertices: &[Vec3A] = view.vertices();
            let corners = [vertices.vertex(ids[0]), vertices.vertex(ids[1]), vertices.vertex(ids[2])];
            let used = match view.kind() {
                PrimitiveKind::Triangles => &corners[..],
                PrimitiveKind::Points => &corners[..1],
            };
            write_primitive_bounds(used, row, 0);
        };

        if parallel {
            rows.par_iter_mut().enumerate().for_each(fill);
        } else {
            rows.iter_mut().enumerate().for_each(fill);
        }

        Self { rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[inline]
pub fn row_centroid(row: &[f32; 6], axis: Axis) -> f32 {
    let i = axis.index();
    (row[i] + row[i + 3]) * 0.5
}

pub fn union_of_rows(rows: &[[f32; 6]]) -> AABB {
    let mut aabb = AABB::default();
    for row in rows {
        aabb.grow(&AABB::from_array(row));
    }
    aabb
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use super::*;
    use crate::{Geometry, PrimitiveKind};

    #[test]
    fn triangle_rows() {
        let geometry = Geometry::new(vec![
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(2.0, 1.0, 0.0),
            Vec3A::new(1.0, 3.0, -1.0),
        ]);
        let cache = PrimitiveBounds::compute(&geometry.view(), false);
        assert_eq!(cache.rows, vec![[0.0, 0.0, -1.0, 2.0, 3.0, 0.0]]);
        assert_eq!(row_centroid(&cache.rows[0], Axis::Y), 1.5);
    }

    #[test]
    fn degenerate_and_point_rows_have_zero_extent() {
        let flat = Geometry::new(vec![Vec3A::ONE, Vec3A::ONE, Vec3A::ONE]);
        let cache = PrimitiveBounds::compute(&flat.view(), true);
        assert_eq!(cache.rows, vec![[1.0; 6]]);

        let points = Geometry::new(vec![Vec3A::ZERO, Vec3A::X]).with_kind(PrimitiveKind::Points);
        let cache = PrimitiveBounds::compute(&points.view(), false);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.rows[1], [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn write_at_offset() {
        let mut out = [9.0_f32; 12];
        write_primitive_bounds(&[Vec3A::ZERO, Vec3A::ONE], &mut out, 6);
        assert_eq!(&out[..6], &[9.0; 6]);
        assert_eq!(&out[6..], &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }
}
