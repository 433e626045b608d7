use glam::Vec3A;
use strum::{Display, EnumIter, EnumString};

use crate::{Ray, Triangle, AABB};

/// Epsilon used for ray intersections
pub const RAY_INTERSECT_EPSILON: f32 = 0.0001;

/// Which triangle faces a ray may hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub distance: f32,
    pub point: Vec3A,
    /// Ray came from the side the counter-clockwise winding faces
    pub front_face: bool,
}

/// Intersect a triangle with a ray.
///
/// The barycentric tests accept points up to `RAY_INTERSECT_EPSILON` (relative to the
/// determinant) outside the edges, so rays through shared edges never slip between
/// neighbouring triangles. Only an exactly parallel ray is rejected; near-degenerate
/// triangles still report their hit.
pub fn ray_triangle_intersect(tri: &Triangle, ray: &Ray, side: Side) -> Option<TriangleHit> {
    let edge1 = tri.vertex1 - tri.vertex0;
    let edge2 = tri.vertex2 - tri.vertex0;
    let normal = edge1.cross(edge2);

    let mut d_dot_n = ray.direction.dot(normal);
    let sign;
    if d_dot_n > 0.0 {
        if side == Side::Front {
            return None;
        }
        sign = 1.0;
    } else if d_dot_n < 0.0 {
        if side == Side::Back {
            return None;
        }
        sign = -1.0;
        d_dot_n = -d_dot_n;
    } else {
        // ray parallel to triangle
        return None;
    }

    let tolerance = -RAY_INTERSECT_EPSILON * d_dot_n;
    let diff = ray.origin - tri.vertex0;
    let d_dot_q_x_e2 = sign * ray.direction.dot(diff.cross(edge2));
    if d_dot_q_x_e2 < tolerance {
        return None;
    }
    let d_dot_e1_x_q = sign * ray.direction.dot(edge1.cross(diff));
    if d_dot_e1_x_q < tolerance {
        return None;
    }
    if d_dot_q_x_e2 + d_dot_e1_x_q > d_dot_n - tolerance {
        return None;
    }

    let q_dot_n = -sign * diff.dot(normal);
    if q_dot_n < 0.0 {
        return None;
    }

    let distance = q_dot_n / d_dot_n;
    if distance < ray.near || distance > ray.far {
        return None;
    }

    Some(TriangleHit {
        distance,
        point: ray.at(distance),
        front_face: sign < 0.0,
    })
}

/// Parametric interval where the ray is inside the box, clipped to `[near, far]`
pub fn ray_aabb_interval(aabb: &AABB, ray: &Ray) -> Option<(f32, f32)> {
    let mut t_min = ray.near;
    let mut t_max = ray.far;
    let inv_direction = ray.inv_direction();

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let direction = ray.direction[axis];
        if direction == 0.0 {
            if origin < aabb.min[axis] || origin > aabb.max[axis] {
                return None;
            }
            continue;
        }

        let inv = inv_direction[axis];
        let mut t0 = (aabb.min[axis] - origin) * inv;
        let mut t1 = (aabb.max[axis] - origin) * inv;
        if inv < 0.0 {
            std::mem::swap(&mut t0, &mut t1);
        }

        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    Some((t_min, t_max))
}

/// Hit of a ray passing within `threshold` of a point. The reported distance is the
/// distance along the ray to the closest approach.
pub fn ray_point_intersect(point: Vec3A, ray: &Ray, threshold: f32) -> Option<TriangleHit> {
    let length_sq = ray.direction.length_squared();
    if length_sq == 0.0 {
        return None;
    }
    let distance = (point - ray.origin).dot(ray.direction) / length_sq;
    if distance < ray.near || distance > ray.far {
        return None;
    }
    let closest = ray.at(distance);
    if closest.distance_squared(point) > threshold * threshold {
        return None;
    }
    Some(TriangleHit {
        distance,
        point: closest,
        front_face: true,
    })
}
