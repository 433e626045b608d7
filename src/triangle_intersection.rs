//! Triangle/triangle and segment predicates used by hierarchy-vs-hierarchy queries.

use glam::Vec3A;

use crate::{ray_triangle_intersect, Ray, Side, Triangle};

/// Plane distances below this (relative to the coordinate scale) count as touching
const COPLANAR_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Vec3A,
    pub end: Vec3A,
}

impl Segment {
    #[inline]
    pub fn new(start: Vec3A, end: Vec3A) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    #[inline]
    pub fn closest_point_to_point(&self, point: Vec3A) -> Vec3A {
        closest_point_on_segment(self.start, self.end, point)
    }

    /// Closest pair of points between two segments (Ericson 5.1.9), as (on self, on other)
    pub fn closest_points(&self, other: &Segment) -> (Vec3A, Vec3A) {
        let d1 = self.end - self.start;
        let d2 = other.end - other.start;
        let r = self.start - other.start;
        let a = d1.length_squared();
        let e = d2.length_squared();
        let f = d2.dot(r);

        if a <= f32::EPSILON && e <= f32::EPSILON {
            return (self.start, other.start);
        }

        let (s, t) = if a <= f32::EPSILON {
            (0.0, (f / e).clamp(0.0, 1.0))
        } else {
            let c = d1.dot(r);
            if e <= f32::EPSILON {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else {
                let b = d1.dot(d2);
                let denom = a * e - b * b;
                let mut s = if denom != 0.0 {
                    ((b * f - c * e) / denom).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let mut t = (b * s + f) / e;
                if t < 0.0 {
                    t = 0.0;
                    s = (-c / a).clamp(0.0, 1.0);
                } else if t > 1.0 {
                    t = 1.0;
                    s = ((b - c) / a).clamp(0.0, 1.0);
                }
                (s, t)
            }
        };

        (self.start + d1 * s, other.start + d2 * t)
    }
}

pub fn closest_point_on_segment(start: Vec3A, end: Vec3A, point: Vec3A) -> Vec3A {
    let direction = end - start;
    let length_sq = direction.length_squared();
    if length_sq == 0.0 {
        return start;
    }
    let t = ((point - start).dot(direction) / length_sq).clamp(0.0, 1.0);
    start + direction * t
}

fn edges(tri: &Triangle) -> [Segment; 3] {
    [
        Segment::new(tri.vertex0, tri.vertex1),
        Segment::new(tri.vertex1, tri.vertex2),
        Segment::new(tri.vertex2, tri.vertex0),
    ]
}

fn coordinate_scale(a: &Triangle, b: &Triangle) -> f32 {
    a.vertices()
        .iter()
        .chain(b.vertices().iter())
        .fold(1.0_f32, |acc, v| acc.max(v.abs().max_element()))
}

/// Signed distances of the vertices of `tri` to the plane of `plane_tri`, snapped to zero
/// when within tolerance. `None` if `plane_tri` has no plane.
fn plane_distances(tri: &Triangle, plane_tri: &Triangle, tolerance: f32) -> Option<[f32; 3]> {
    let normal = plane_tri.normal();
    if normal == Vec3A::ZERO {
        return None;
    }
    let snap = |v: Vec3A| {
        let d = normal.dot(v - plane_tri.vertex0);
        if d.abs() <= tolerance {
            0.0
        } else {
            d
        }
    };
    Some([snap(tri.vertex0), snap(tri.vertex1), snap(tri.vertex2)])
}

fn same_side(distances: &[f32; 3]) -> bool {
    (distances[0] > 0.0 && distances[1] > 0.0 && distances[2] > 0.0)
        || (distances[0] < 0.0 && distances[1] < 0.0 && distances[2] < 0.0)
}

/// Points where the triangle boundary crosses a plane, given signed vertex distances
fn plane_crossing(tri: &Triangle, distances: &[f32; 3]) -> smallvec::SmallVec<[Vec3A; 4]> {
    let vertices = tri.vertices();
    let mut points = smallvec::SmallVec::new();
    for i in 0..3 {
        let j = (i + 1) % 3;
        let (di, dj) = (distances[i], distances[j]);
        if di == 0.0 {
            points.push(vertices[i]);
        }
        if (di < 0.0 && dj > 0.0) || (di > 0.0 && dj < 0.0) {
            let t = di / (di - dj);
            points.push(vertices[i] + (vertices[j] - vertices[i]) * t);
        }
    }
    points
}

fn extent_along(points: &[Vec3A], direction: Vec3A) -> Option<(f32, Vec3A, f32, Vec3A)> {
    let mut iter = points.iter();
    let first = *iter.next()?;
    let first_t = first.dot(direction);
    let mut lo = (first_t, first);
    let mut hi = (first_t, first);
    for &p in iter {
        let t = p.dot(direction);
        if t < lo.0 {
            lo = (t, p);
        }
        if t > hi.0 {
            hi = (t, p);
        }
    }
    Some((lo.0, lo.1, hi.0, hi.1))
}

fn segment_intersects_triangle(segment: &Segment, tri: &Triangle) -> bool {
    let ray = Ray::new(segment.start, segment.end - segment.start, 0.0, 1.0);
    ray_triangle_intersect(tri, &ray, Side::Double).is_some()
}

fn project_2d(v: Vec3A, drop_axis: usize) -> (f32, f32) {
    match drop_axis {
        0 => (v.y, v.z),
        1 => (v.z, v.x),
        _ => (v.x, v.y),
    }
}

fn orient_2d(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn segments_intersect_2d(p1: (f32, f32), p2: (f32, f32), q1: (f32, f32), q2: (f32, f32)) -> bool {
    let o1 = orient_2d(p1, p2, q1);
    let o2 = orient_2d(p1, p2, q2);
    let o3 = orient_2d(q1, q2, p1);
    let o4 = orient_2d(q1, q2, p2);

    let on_segment = |a: (f32, f32), b: (f32, f32), c: (f32, f32)| {
        c.0 >= a.0.min(b.0) && c.0 <= a.0.max(b.0) && c.1 >= a.1.min(b.1) && c.1 <= a.1.max(b.1)
    };

    if ((o1 > 0.0 && o2 < 0.0) || (o1 < 0.0 && o2 > 0.0))
        && ((o3 > 0.0 && o4 < 0.0) || (o3 < 0.0 && o4 > 0.0))
    {
        return true;
    }

    (o1 == 0.0 && on_segment(p1, p2, q1))
        || (o2 == 0.0 && on_segment(p1, p2, q2))
        || (o3 == 0.0 && on_segment(q1, q2, p1))
        || (o4 == 0.0 && on_segment(q1, q2, p2))
}

fn point_in_triangle_2d(p: (f32, f32), tri: [(f32, f32); 3]) -> bool {
    let d0 = orient_2d(tri[0], tri[1], p);
    let d1 = orient_2d(tri[1], tri[2], p);
    let d2 = orient_2d(tri[2], tri[0], p);
    let has_neg = d0 < 0.0 || d1 < 0.0 || d2 < 0.0;
    let has_pos = d0 > 0.0 || d1 > 0.0 || d2 > 0.0;
    !(has_neg && has_pos)
}

fn coplanar_triangles_intersect(a: &Triangle, b: &Triangle) -> bool {
    let normal = a.scaled_normal().abs();
    let drop_axis = if normal.x >= normal.y && normal.x >= normal.z {
        0
    } else if normal.y >= normal.z {
        1
    } else {
        2
    };

    let pa = a.vertices().map(|v| project_2d(v, drop_axis));
    let pb = b.vertices().map(|v| project_2d(v, drop_axis));

    for i in 0..3 {
        for j in 0..3 {
            if segments_intersect_2d(pa[i], pa[(i + 1) % 3], pb[j], pb[(j + 1) % 3]) {
                return true;
            }
        }
    }

    point_in_triangle_2d(pa[0], pb) || point_in_triangle_2d(pb[0], pa)
}

fn degenerate_triangles_intersect(a: &Triangle, b: &Triangle) -> bool {
    let a_flat = a.is_degenerate();
    let b_flat = b.is_degenerate();
    match (a_flat, b_flat) {
        (true, false) => edges(a).iter().any(|e| segment_intersects_triangle(e, b)),
        (false, true) => edges(b).iter().any(|e| segment_intersects_triangle(e, a)),
        _ => {
            let tolerance = COPLANAR_EPSILON * coordinate_scale(a, b);
            edges(a).iter().any(|ea| {
                edges(b).iter().any(|eb| {
                    let (pa, pb) = ea.closest_points(eb);
                    pa.distance(pb) <= tolerance
                })
            })
        }
    }
}

/// Segment where two non-coplanar triangles cross, `None` if they are disjoint or coplanar
pub fn triangle_intersection_segment(a: &Triangle, b: &Triangle) -> Option<Segment> {
    let tolerance = COPLANAR_EPSILON * coordinate_scale(a, b);
    let da = plane_distances(a, b, tolerance)?;
    if same_side(&da) || da == [0.0; 3] {
        return None;
    }
    let db = plane_distances(b, a, tolerance)?;
    if same_side(&db) || db == [0.0; 3] {
        return None;
    }

    let line = a.normal().cross(b.normal());
    let line = if line.length_squared() > 0.0 {
        line
    } else {
        return None;
    };

    let (a_lo, a_lo_p, a_hi, a_hi_p) = extent_along(&plane_crossing(a, &da), line)?;
    let (b_lo, b_lo_p, b_hi, b_hi_p) = extent_along(&plane_crossing(b, &db), line)?;

    let (lo, lo_p) = if a_lo > b_lo { (a_lo, a_lo_p) } else { (b_lo, b_lo_p) };
    let (hi, hi_p) = if a_hi < b_hi { (a_hi, a_hi_p) } else { (b_hi, b_hi_p) };

    let slack = tolerance * line.length();
    if lo > hi + slack {
        return None;
    }
    Some(Segment::new(lo_p, hi_p))
}

/// Robust boolean triangle/triangle overlap test, coplanar and degenerate inputs included
pub fn triangle_intersects_triangle(a: &Triangle, b: &Triangle) -> bool {
    if a.is_degenerate() || b.is_degenerate() {
        return degenerate_triangles_intersect(a, b);
    }

    let tolerance = COPLANAR_EPSILON * coordinate_scale(a, b);
    let Some(da) = plane_distances(a, b, tolerance) else {
        return false;
    };
    if same_side(&da) {
        return false;
    }
    if da == [0.0; 3] {
        return coplanar_triangles_intersect(a, b);
    }
    let Some(db) = plane_distances(b, a, tolerance) else {
        return false;
    };
    if same_side(&db) {
        return false;
    }
    if db == [0.0; 3] {
        return coplanar_triangles_intersect(a, b);
    }

    triangle_intersection_segment(a, b).is_some()
}

/// Closest pair of points between two triangles, as (on a, on b)
pub fn triangle_closest_points(a: &Triangle, b: &Triangle) -> (Vec3A, Vec3A) {
    if triangle_intersects_triangle(a, b) {
        let point = match triangle_intersection_segment(a, b) {
            Some(segment) => segment.start,
            None => closest_touching_point(a, b),
        };
        return (point, point);
    }

    let mut best = (a.vertex0, b.vertex0);
    let mut best_dist = f32::INFINITY;
    let mut consider = |pa: Vec3A, pb: Vec3A| {
        let d = pa.distance_squared(pb);
        if d < best_dist {
            best_dist = d;
            best = (pa, pb);
        }
    };

    for ea in edges(a) {
        for eb in edges(b) {
            let (pa, pb) = ea.closest_points(&eb);
            consider(pa, pb);
        }
    }
    for v in a.vertices() {
        consider(v, b.closest_point_to_point(v));
    }
    for v in b.vertices() {
        consider(a.closest_point_to_point(v), v);
    }

    best
}

fn closest_touching_point(a: &Triangle, b: &Triangle) -> Vec3A {
    a.vertices()
        .into_iter()
        .map(|v| (v, b.closest_point_to_point(v)))
        .chain(b.vertices().into_iter().map(|v| (a.closest_point_to_point(v), v)))
        .min_by(|x, y| {
            x.0.distance_squared(x.1)
                .total_cmp(&y.0.distance_squared(y.1))
        })
        .map(|(pa, _)| pa)
        .unwrap_or(a.vertex0)
}
