//! Oriented boxes and their separating axis tests.

use glam::{Affine3A, Vec3A};

use crate::{Triangle, AABB};

/// Axes shorter than this are skipped by the separating axis tests
const AXIS_EPSILON: f32 = 1e-10;

/// Box with arbitrary orientation, built from a local box and a local-to-world transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Vec3A,
    /// Unit axes of the box
    pub axes: [Vec3A; 3],
    pub half_extents: Vec3A,
}

impl OrientedBox {
    /// `transform` may scale; the scale is folded into the half extents
    pub fn new(local: &AABB, transform: &Affine3A) -> Self {
        let center = transform.transform_point3a(local.center());
        let local_half = local.extent() * 0.5;
        let mut axes = [Vec3A::ZERO; 3];
        let mut half_extents = Vec3A::ZERO;
        for i in 0..3 {
            let column = transform.matrix3.col(i);
            let length = column.length();
            if length > 0.0 {
                axes[i] = column / length;
                half_extents[i] = local_half[i] * length;
            }
        }
        Self {
            center,
            axes,
            half_extents,
        }
    }

    pub fn from_aabb(aabb: &AABB) -> Self {
        Self::new(aabb, &Affine3A::IDENTITY)
    }

    #[inline]
    fn projected_radius(&self, axis: Vec3A) -> f32 {
        self.half_extents.x * self.axes[0].dot(axis).abs()
            + self.half_extents.y * self.axes[1].dot(axis).abs()
            + self.half_extents.z * self.axes[2].dot(axis).abs()
    }

    /// World aligned box enclosing this box
    pub fn bounds(&self) -> AABB {
        let reach = self.axes[0].abs() * self.half_extents.x
            + self.axes[1].abs() * self.half_extents.y
            + self.axes[2].abs() * self.half_extents.z;
        AABB::new(self.center - reach, self.center + reach)
    }

    pub fn contains_point(&self, point: Vec3A) -> bool {
        let offset = point - self.center;
        (0..3).all(|i| offset.dot(self.axes[i]).abs() <= self.half_extents[i] * (1.0 + 1e-6) + 1e-6)
    }

    pub fn contains_aabb(&self, aabb: &AABB) -> bool {
        aabb.corners().into_iter().all(|corner| self.contains_point(corner))
    }

    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        let aabb_center = aabb.center();
        let aabb_half = aabb.extent() * 0.5;
        let offset = self.center - aabb_center;

        let separated = |axis: Vec3A| {
            let aabb_radius = aabb_half.dot(axis.abs());
            offset.dot(axis).abs() > aabb_radius + self.projected_radius(axis)
        };

        for world in [Vec3A::X, Vec3A::Y, Vec3A::Z] {
            if separated(world) {
                return false;
            }
        }
        for axis in self.axes {
            if separated(axis) {
                return false;
            }
        }
        for world in [Vec3A::X, Vec3A::Y, Vec3A::Z] {
            for axis in self.axes {
                let cross = world.cross(axis);
                if cross.length_squared() > AXIS_EPSILON && separated(cross) {
                    return false;
                }
            }
        }
        true
    }

    pub fn intersects_triangle(&self, tri: &Triangle) -> bool {
        let vertices = tri.vertices().map(|v| v - self.center);

        let separated = |axis: Vec3A| {
            let p0 = vertices[0].dot(axis);
            let p1 = vertices[1].dot(axis);
            let p2 = vertices[2].dot(axis);
            let radius = self.projected_radius(axis);
            p0.min(p1).min(p2) > radius || p0.max(p1).max(p2) < -radius
        };

        for axis in self.axes {
            if separated(axis) {
                return false;
            }
        }

        let normal = tri.scaled_normal();
        if normal.length_squared() > AXIS_EPSILON && separated(normal) {
            return false;
        }

        let edges = [
            tri.vertex1 - tri.vertex0,
            tri.vertex2 - tri.vertex1,
            tri.vertex0 - tri.vertex2,
        ];
        for axis in self.axes {
            for edge in edges {
                let cross = axis.cross(edge);
                if cross.length_squared() > AXIS_EPSILON && separated(cross) {
                    return false;
                }
            }
        }
        true
    }
}
