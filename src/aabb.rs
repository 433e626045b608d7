use glam::{Affine3A, Vec3A};

use crate::{Axis, Triangle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: glam::Vec3A,
    pub max: glam::Vec3A,
}

impl Default for AABB {
    fn default() -> Self {
        Self {
            min: glam::Vec3A::splat(f32::INFINITY),
            max: glam::Vec3A::splat(-f32::INFINITY),
        }
    }
}

/// Objects that can enlarge a bounding box so it contains them
pub trait Grow<T> {
    fn grow(&mut self, other: T);
}

impl Grow<Vec3A> for AABB {
    /// Grow the box to contain a new point
    #[inline]
    fn grow(&mut self, point: Vec3A) {
        self.max = self.max.max(point);
        self.min = self.min.min(point);
    }
}

impl Grow<&AABB> for AABB {
    #[inline]
    fn grow(&mut self, other: &AABB) {
        self.max = self.max.max(other.max);
        self.min = self.min.min(other.min);
    }
}

impl Grow<&Triangle> for AABB {
    #[inline]
    fn grow(&mut self, tri: &Triangle) {
        self.grow(tri.vertex0);
        self.grow(tri.vertex1);
        self.grow(tri.vertex2);
    }
}

impl AABB {
    #[inline]
    pub fn new(min: Vec3A, max: Vec3A) -> Self {
        Self { min, max }
    }

    /// Box from the flat `[minx, miny, minz, maxx, maxy, maxz]` layout used by node buffers
    #[inline]
    pub fn from_array(bounds: &[f32; 6]) -> Self {
        Self {
            min: Vec3A::new(bounds[0], bounds[1], bounds[2]),
            max: Vec3A::new(bounds[3], bounds[4], bounds[5]),
        }
    }

    #[inline]
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }

    pub fn from_points<I: IntoIterator<Item = Vec3A>>(points: I) -> Self {
        let mut aabb = Self::default();
        for point in points {
            aabb.grow(point);
        }
        aabb
    }

    /// If the AABB is valid (min <= max)
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn extent(&self) -> glam::Vec3A {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3A {
        (self.min + self.max) * 0.5
    }

    /// Surface area of the box, 0 for invalid boxes
    pub fn area(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        let e = self.extent();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    #[inline]
    pub fn longest_axis(&self) -> Axis {
        Axis::longest(self.extent())
    }

    #[inline]
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn contains_point(&self, point: Vec3A) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// True if `other` lies fully inside this box (touching faces count)
    #[inline]
    pub fn contains_aabb(&self, other: &AABB) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }

    #[inline]
    pub fn intersects_aabb(&self, other: &AABB) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    #[inline]
    pub fn clamp_point(&self, point: Vec3A) -> Vec3A {
        point.max(self.min).min(self.max)
    }

    #[inline]
    pub fn distance_squared_to_point(&self, point: Vec3A) -> f32 {
        self.clamp_point(point).distance_squared(point)
    }

    #[inline]
    pub fn distance_to_point(&self, point: Vec3A) -> f32 {
        self.distance_squared_to_point(point).sqrt()
    }

    /// Squared gap between two boxes, 0 when they overlap
    #[inline]
    pub fn distance_squared_to_aabb(&self, other: &AABB) -> f32 {
        let gap = (self.min - other.max)
            .max(other.min - self.max)
            .max(Vec3A::ZERO);
        gap.length_squared()
    }

    /// The 8 corners, bit 0/1/2 of the corner index selects max on x/y/z
    pub fn corners(&self) -> [Vec3A; 8] {
        std::array::from_fn(|i| {
            Vec3A::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            )
        })
    }

    /// Axis aligned box enclosing this box after `transform`
    pub fn transformed(&self, transform: &Affine3A) -> AABB {
        AABB::from_points(
            self.corners()
                .into_iter()
                .map(|corner| transform.transform_point3a(corner)),
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::*;
    use glam::{Affine3A, Vec3A};

    use crate::*;

    #[test]
    fn default_is_invalid_until_grown() {
        let mut aabb = AABB::default();
        assert!(!aabb.is_valid());
        aabb.grow(Vec3A::ONE);
        assert!(aabb.is_valid());
        assert_eq!(aabb.extent(), Vec3A::ZERO);
    }

    #[test]
    fn surface_area() {
        let aabb = AABB::new(Vec3A::ZERO, Vec3A::new(1.0, 2.0, 3.0));
        assert_relative_eq!(aabb.area(), 22.0);
        assert_eq!(AABB::default().area(), 0.0);
    }

    #[test]
    fn array_round_trip() {
        let aabb = AABB::new(Vec3A::new(-1.0, -2.0, -3.0), Vec3A::new(1.0, 2.0, 3.0));
        assert_eq!(AABB::from_array(&aabb.to_array()), aabb);
    }

    #[test]
    fn distances() {
        let aabb = AABB::new(Vec3A::ZERO, Vec3A::ONE);
        assert_eq!(aabb.distance_squared_to_point(Vec3A::splat(0.5)), 0.0);
        assert_relative_eq!(aabb.distance_to_point(Vec3A::new(3.0, 0.5, 0.5)), 2.0);

        let other = AABB::new(Vec3A::new(2.0, 0.0, 0.0), Vec3A::new(3.0, 1.0, 1.0));
        assert_relative_eq!(aabb.distance_squared_to_aabb(&other), 1.0);
        assert_eq!(aabb.distance_squared_to_aabb(&aabb), 0.0);
    }

    #[test]
    fn containment_and_overlap() {
        let outer = AABB::new(Vec3A::ZERO, Vec3A::splat(4.0));
        let inner = AABB::new(Vec3A::ONE, Vec3A::splat(2.0));
        let apart = AABB::new(Vec3A::splat(5.0), Vec3A::splat(6.0));
        assert!(outer.contains_aabb(&inner));
        assert!(!inner.contains_aabb(&outer));
        assert!(outer.intersects_aabb(&inner));
        assert!(!outer.intersects_aabb(&apart));
    }

    #[test]
    fn transformed_box_encloses_rotated_corners() {
        let aabb = AABB::new(Vec3A::splat(-1.0), Vec3A::splat(1.0));
        let transform = Affine3A::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let rotated = aabb.transformed(&transform);
        assert_relative_eq!(rotated.max.x, std::f32::consts::SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(rotated.max.z, 1.0, epsilon = 1e-5);
    }
}
