extern crate glam;

use glam::{Affine3A, Vec3A};
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};

use crate::{Grow, AABB};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertex0: glam::Vec3A,
    pub vertex1: glam::Vec3A,
    pub vertex2: glam::Vec3A,
    pub centroid: glam::Vec3A,
}

impl Triangle {
    /// Zeroed Triangle
    pub const ZERO: Self = Triangle {
        vertex0: glam::Vec3A::ZERO,
        vertex1: glam::Vec3A::ZERO,
        vertex2: glam::Vec3A::ZERO,
        centroid: glam::Vec3A::ZERO,
    };

    #[inline]
    pub fn new(vertex0: glam::Vec3A, vertex1: glam::Vec3A, vertex2: glam::Vec3A) -> Triangle {
        let mut tri = Triangle {
            vertex0,
            vertex1,
            vertex2,
            centroid: glam::Vec3A::ZERO,
        };
        tri.compute_centroid();
        tri
    }

    #[inline]
    pub fn compute_centroid(&mut self) {
        self.centroid = (self.vertex0 + self.vertex1 + self.vertex2) / 3.0;
    }

    #[inline]
    pub fn vertices(&self) -> [Vec3A; 3] {
        [self.vertex0, self.vertex1, self.vertex2]
    }

    #[inline]
    pub fn bounds(&self) -> AABB {
        let mut aabb = AABB::default();
        aabb.grow(self);
        aabb
    }

    /// Unnormalized normal, its length is twice the area
    #[inline]
    pub fn scaled_normal(&self) -> Vec3A {
        (self.vertex1 - self.vertex0).cross(self.vertex2 - self.vertex0)
    }

    #[inline]
    pub fn normal(&self) -> Vec3A {
        self.scaled_normal().normalize_or_zero()
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.scaled_normal().length() * 0.5
    }

    pub fn is_degenerate(&self) -> bool {
        self.scaled_normal().length_squared() == 0.0
    }

    pub fn transformed(&self, transform: &Affine3A) -> Triangle {
        Triangle::new(
            transform.transform_point3a(self.vertex0),
            transform.transform_point3a(self.vertex1),
            transform.transform_point3a(self.vertex2),
        )
    }

    /// Barycentric weights of `point` projected on the triangle plane.
    ///
    /// Degenerate triangles (vanishing Gram determinant) give the zero vector,
    /// so anything interpolated with the weights comes out zero-length.
    pub fn barycentric(&self, point: Vec3A) -> Vec3A {
        let v0 = self.vertex1 - self.vertex0;
        let v1 = self.vertex2 - self.vertex0;
        let v2 = point - self.vertex0;
        let d00 = v0.dot(v0);
        let d01 = v0.dot(v1);
        let d11 = v1.dot(v1);
        let d20 = v2.dot(v0);
        let d21 = v2.dot(v1);
        let denom = d00 * d11 - d01 * d01;

        if denom < f32::MIN_POSITIVE || denom <= f32::EPSILON * d00 * d11 {
            return Vec3A::ZERO;
        }

        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        Vec3A::new(1.0 - v - w, v, w)
    }

    /// Point of the triangle closest to `point` (Ericson, Real-Time Collision Detection 5.1.5)
    pub fn closest_point_to_point(&self, point: Vec3A) -> Vec3A {
        let a = self.vertex0;
        let b = self.vertex1;
        let c = self.vertex2;
        let ab = b - a;
        let ac = c - a;
        let ap = point - a;

        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = point - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = point - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = va + vb + vc;
        if denom == 0.0 {
            // collinear vertices that slipped through the region tests
            return closest_point_on_degenerate(self, point);
        }
        let denom = 1.0 / denom;
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }
}

fn closest_point_on_degenerate(tri: &Triangle, point: Vec3A) -> Vec3A {
    let edges = [
        (tri.vertex0, tri.vertex1),
        (tri.vertex1, tri.vertex2),
        (tri.vertex2, tri.vertex0),
    ];
    edges
        .into_iter()
        .map(|(start, end)| crate::closest_point_on_segment(start, end, point))
        .min_by(|a, b| a.distance_squared(point).total_cmp(&b.distance_squared(point)))
        .unwrap_or(tri.vertex0)
}

impl Default for Triangle {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Distribution<Triangle> for Standard {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Triangle {
        Triangle::new(rng.gen(), rng.gen(), rng.gen())
    }
}

#[cfg(test)]
mod tests {
    use crate::Triangle;

    use glam::Vec3A;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use approx::*;

    #[test]
    fn compute_centroid() {
        let mut rng = StdRng::seed_from_u64(7);
        let tri: Triangle = rng.gen();
        assert_relative_eq!(
            tri.centroid,
            (tri.vertex0 + tri.vertex1 + tri.vertex2) / 3.0
        );
    }

    #[test]
    fn barycentric_of_vertices() {
        let tri = Triangle::new(Vec3A::ZERO, Vec3A::X, Vec3A::Y);
        assert_relative_eq!(tri.barycentric(Vec3A::ZERO), Vec3A::X);
        assert_relative_eq!(tri.barycentric(Vec3A::X), Vec3A::Y);
        assert_relative_eq!(tri.barycentric(Vec3A::new(0.25, 0.25, 0.0)), Vec3A::new(0.5, 0.25, 0.25));
    }

    #[test]
    fn barycentric_of_sliver_is_zero() {
        let tri = Triangle::new(Vec3A::ZERO, Vec3A::X, Vec3A::new(0.0, 1e-20, 0.0));
        assert_eq!(tri.barycentric(Vec3A::ZERO), Vec3A::ZERO);
    }

    #[test]
    fn closest_point_regions() {
        let tri = Triangle::new(Vec3A::ZERO, Vec3A::X, Vec3A::Y);
        // face
        assert_relative_eq!(
            tri.closest_point_to_point(Vec3A::new(0.2, 0.2, 3.0)),
            Vec3A::new(0.2, 0.2, 0.0)
        );
        // vertex
        assert_relative_eq!(tri.closest_point_to_point(Vec3A::new(-1.0, -1.0, 0.0)), Vec3A::ZERO);
        // edge
        assert_relative_eq!(
            tri.closest_point_to_point(Vec3A::new(1.0, 1.0, 0.0)),
            Vec3A::new(0.5, 0.5, 0.0)
        );
    }

    #[test]
    fn closest_point_on_collapsed_triangle() {
        let tri = Triangle::new(Vec3A::ZERO, Vec3A::X, Vec3A::X * 2.0);
        let closest = tri.closest_point_to_point(Vec3A::new(1.5, 1.0, 0.0));
        assert_relative_eq!(closest, Vec3A::new(1.5, 0.0, 0.0), epsilon = 1e-6);
    }
}
