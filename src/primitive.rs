use glam::{Affine3A, Vec3A};
use strum::{Display, EnumIter, EnumString};

use crate::{
    ray_point_intersect, ray_triangle_intersect, triangle_closest_points,
    triangle_intersects_triangle, OrientedBox, Ray, Side, Sphere, Triangle, TriangleHit, AABB,
};

/// What a run of `stride` index entries describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveKind {
    #[default]
    Triangles,
    Points,
}

impl PrimitiveKind {
    /// Number of index entries (or vertices, for non-indexed geometry) per primitive
    #[inline]
    pub fn stride(self) -> usize {
        match self {
            PrimitiveKind::Triangles => 3,
            PrimitiveKind::Points => 1,
        }
    }
}

/// A resolved primitive with its vertex positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Triangle(Triangle),
    Point(Vec3A),
}

impl Primitive {
    pub fn bounds(&self) -> AABB {
        match self {
            Primitive::Triangle(tri) => tri.bounds(),
            Primitive::Point(point) => AABB::new(*point, *point),
        }
    }

    #[inline]
    pub fn centroid(&self) -> Vec3A {
        match self {
            Primitive::Triangle(tri) => tri.centroid,
            Primitive::Point(point) => *point,
        }
    }

    #[inline]
    pub fn as_triangle(&self) -> Option<&Triangle> {
        match self {
            Primitive::Triangle(tri) => Some(tri),
            Primitive::Point(_) => None,
        }
    }

    pub fn transformed(&self, transform: &Affine3A) -> Primitive {
        match self {
            Primitive::Triangle(tri) => Primitive::Triangle(tri.transformed(transform)),
            Primitive::Point(point) => Primitive::Point(transform.transform_point3a(*point)),
        }
    }

    pub fn closest_point_to_point(&self, point: Vec3A) -> Vec3A {
        match self {
            Primitive::Triangle(tri) => tri.closest_point_to_point(point),
            Primitive::Point(p) => *p,
        }
    }

    /// Triangles honour `side`; points report a hit within `point_threshold` of the ray
    pub fn intersect_ray(&self, ray: &Ray, side: Side, point_threshold: f32) -> Option<TriangleHit> {
        match self {
            Primitive::Triangle(tri) => ray_triangle_intersect(tri, ray, side),
            Primitive::Point(point) => ray_point_intersect(*point, ray, point_threshold),
        }
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        match self {
            Primitive::Triangle(tri) => sphere.intersects_triangle(tri),
            Primitive::Point(point) => sphere.contains_point(*point),
        }
    }

    pub fn intersects_oriented_box(&self, obb: &OrientedBox) -> bool {
        match self {
            Primitive::Triangle(tri) => obb.intersects_triangle(tri),
            Primitive::Point(point) => obb.contains_point(*point),
        }
    }

    /// Closest pair of points between two primitives, as (on self, on other)
    pub fn closest_points(&self, other: &Primitive) -> (Vec3A, Vec3A) {
        match (self, other) {
            (Primitive::Triangle(a), Primitive::Triangle(b)) => triangle_closest_points(a, b),
            (Primitive::Triangle(a), Primitive::Point(p)) => (a.closest_point_to_point(*p), *p),
            (Primitive::Point(p), Primitive::Triangle(b)) => (*p, b.closest_point_to_point(*p)),
            (Primitive::Point(p), Primitive::Point(q)) => (*p, *q),
        }
    }

    /// Overlap test; anything involving a point only counts an exact touch
    pub fn intersects_primitive(&self, other: &Primitive) -> bool {
        match (self, other) {
            (Primitive::Triangle(a), Primitive::Triangle(b)) => triangle_intersects_triangle(a, b),
            _ => {
                let (a, b) = self.closest_points(other);
                a.distance_squared(b) <= f32::EPSILON * f32::EPSILON
            }
        }
    }
}
