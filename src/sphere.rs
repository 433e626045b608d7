use glam::Vec3A;

use crate::{Triangle, AABB};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3A,
    pub radius: f32,
}

impl Sphere {
    #[inline]
    pub fn new(center: Vec3A, radius: f32) -> Self {
        Self { center, radius }
    }

    #[inline]
    pub fn contains_point(&self, point: Vec3A) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }

    #[inline]
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        aabb.distance_squared_to_point(self.center) <= self.radius * self.radius
    }

    /// True if every corner of `aabb` is inside the sphere
    pub fn contains_aabb(&self, aabb: &AABB) -> bool {
        let farthest = (aabb.min - self.center)
            .abs()
            .max((aabb.max - self.center).abs());
        farthest.length_squared() <= self.radius * self.radius
    }

    #[inline]
    pub fn intersects_triangle(&self, tri: &Triangle) -> bool {
        self.contains_point(tri.closest_point_to_point(self.center))
    }

    #[inline]
    pub fn bounds(&self) -> AABB {
        AABB::new(
            self.center - Vec3A::splat(self.radius),
            self.center + Vec3A::splat(self.radius),
        )
    }
}
