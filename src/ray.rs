use glam::Vec3A;

/// Ray object. Might be a proper ray (far = infinity) or a line segment (far is finite).
/// Only hits with a distance in `[near, far]` are reported.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: glam::Vec3A,
    pub direction: glam::Vec3A,
    pub near: f32,
    pub far: f32,
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Default::default(),
            direction: glam::Vec3A::new(1.0, 0.0, 0.0),
            near: 0.0,
            far: 1.0,
        }
    }
}

impl Ray {
    #[inline]
    pub fn new(origin: glam::Vec3A, direction: glam::Vec3A, near: f32, far: f32) -> Self {
        Self {
            origin,
            direction,
            near,
            far,
        }
    }

    /// Create a ray with infinite length (a proper ray)
    #[inline]
    pub fn infinite_ray(origin: glam::Vec3A, direction: glam::Vec3A) -> Self {
        Self::new(origin, direction, 0.0, f32::INFINITY)
    }

    #[inline]
    pub fn at(&self, distance: f32) -> Vec3A {
        self.origin + self.direction * distance
    }

    /// Componentwise inverse of the direction; zero components become infinities
    #[inline]
    pub fn inv_direction(&self) -> Vec3A {
        self.direction.recip()
    }
}

#[cfg(test)]
mod tests {
    use approx::*;
    use glam::Vec3A;

    use crate::Ray;

    #[test]
    fn point_along_ray() {
        let ray = Ray::new(Vec3A::ONE, Vec3A::new(0.0, 2.0, 0.0), 0.0, 2.0);
        assert_relative_eq!(ray.at(1.5), Vec3A::new(1.0, 4.0, 1.0));
    }

    #[test]
    fn inverse_direction_of_axis_ray() {
        let ray = Ray::infinite_ray(Vec3A::ZERO, Vec3A::new(0.0, -2.0, 0.0));
        let inv = ray.inv_direction();
        assert!(inv.x.is_infinite());
        assert_eq!(inv.y, -0.5);
    }
}
