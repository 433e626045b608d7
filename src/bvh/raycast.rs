use glam::{Vec2, Vec3A};
use parking_lot::RwLockReadGuard;
use smallvec::SmallVec;

use super::{BoundsIntersection, MeshBvh, PrimitiveReader, Shapecast};
use crate::{ray_aabb_interval, Geometry, Primitive, PrimitiveKind, Ray, Side, TriangleHit, AABB};

/// A ray hit resolved against the geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub distance: f32,
    pub point: Vec3A,
    pub primitive_id: u32,
    /// Vertex ids of the hit primitive; a point repeats its vertex
    pub face: [u32; 3],
    pub face_normal: Vec3A,
    pub barycentric: Vec3A,
    pub front_face: bool,
    /// Interpolated texture coordinate, if the geometry has them
    pub uv: Option<Vec2>,
    /// Interpolated, normalized vertex normal, if the geometry has them
    pub normal: Option<Vec3A>,
}

#[derive(Debug, Clone, Copy)]
pub struct RaycastOptions {
    pub side: Side,
    /// How close a ray must pass to a point primitive to hit it
    pub point_threshold: f32,
}

impl Default for RaycastOptions {
    fn default() -> Self {
        Self {
            side: Side::Front,
            point_threshold: 1e-3,
        }
    }
}

/// Turns raw intersections into [`Hit`]s
struct HitResolver<'a, 'r> {
    reader: &'r PrimitiveReader<'a>,
    uvs: Option<RwLockReadGuard<'a, Vec<Vec2>>>,
    normals: Option<RwLockReadGuard<'a, Vec<Vec3A>>>,
}

impl<'a, 'r> HitResolver<'a, 'r> {
    fn new(geometry: &'a Geometry, reader: &'r PrimitiveReader<'a>) -> Self {
        Self {
            reader,
            uvs: geometry.uvs().map(|uvs| uvs.read()),
            normals: geometry.normals().map(|normals| normals.read()),
        }
    }

    fn hit(&self, primitive_id: u32, primitive: &Primitive, hit: TriangleHit) -> Hit {
        let face = self.reader.view().primitive_vertex_ids(primitive_id);
        let [a, b, c] = face.map(|v| v as usize);
        let (face_normal, barycentric) = match primitive {
            Primitive::Triangle(tri) => (
                tri.scaled_normal().normalize_or_zero(),
                tri.barycentric(hit.point),
            ),
            Primitive::Point(_) => (Vec3A::ZERO, Vec3A::X),
        };

        let uv = self
            .uvs
            .as_ref()
            .map(|uvs| uvs[a] * barycentric.x + uvs[b] * barycentric.y + uvs[c] * barycentric.z);
        let normal = self.normals.as_ref().map(|normals| {
            (normals[a] * barycentric.x + normals[b] * barycentric.y + normals[c] * barycentric.z)
                .normalize_or_zero()
        });

        Hit {
            distance: hit.distance,
            point: hit.point,
            primitive_id,
            face,
            face_normal,
            barycentric,
            front_face: hit.front_face,
            uv,
            normal,
        }
    }
}

/// Slab test against `bounds` grown by `margin`, so rays passing near a point still enter its box
fn slab_interval(bounds: &AABB, ray: &Ray, margin: f32) -> Option<(f32, f32)> {
    if margin > 0.0 {
        let grown = AABB::new(bounds.min - Vec3A::splat(margin), bounds.max + Vec3A::splat(margin));
        ray_aabb_interval(&grown, ray)
    } else {
        ray_aabb_interval(bounds, ray)
    }
}

impl RaycastOptions {
    fn bounds_margin(&self, kind: PrimitiveKind) -> f32 {
        match kind {
            PrimitiveKind::Triangles => 0.0,
            PrimitiveKind::Points => self.point_threshold,
        }
    }
}

fn sort_hits(hits: &mut [Hit]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

impl MeshBvh {
    /// Every hit within `[ray.near, ray.far]`, nearest first
    pub fn raycast(&self, ray: &Ray, options: &RaycastOptions) -> Vec<Hit> {
        let reader = self.reader();
        let resolver = HitResolver::new(&self.geometry, &reader);
        let margin = options.bounds_margin(self.geometry.kind());
        let mut hits = Vec::new();

        self.shapecast_with(
            &reader,
            &mut Shapecast::new(
                |bounds: &AABB, _| match slab_interval(bounds, ray, margin) {
                    Some(_) => BoundsIntersection::Intersected,
                    None => BoundsIntersection::NotIntersected,
                },
                |primitive: &Primitive, id, _| {
                    if let Some(hit) = primitive.intersect_ray(ray, options.side, options.point_threshold) {
                        hits.push(resolver.hit(id, primitive, hit));
                    }
                    false
                },
            ),
        );

        sort_hits(&mut hits);
        hits
    }

    /// Nearest hit. Children are entered nearest first by slab entry distance, and boxes
    /// entered beyond the best hit so far are skipped.
    pub fn raycast_first(&self, ray: &Ray, options: &RaycastOptions) -> Option<Hit> {
        let reader = self.reader();
        let resolver = HitResolver::new(&self.geometry, &reader);
        let margin = options.bounds_margin(self.geometry.kind());
        let mut best: Option<(u32, Primitive, TriangleHit)> = None;
        let mut clipped = *ray;
        let mut stack: SmallVec<[(u32, f32); 64]> = SmallVec::new();

        for root in &self.roots {
            let nodes = root.read();
            let Some(root_node) = nodes.first() else {
                continue;
            };
            if let Some((entry, _)) = slab_interval(&root_node.aabb(), &clipped, margin) {
                stack.push((0, entry));
            }

            while let Some((index, entry)) = stack.pop() {
                if entry > clipped.far {
                    continue;
                }
                let node = &nodes[index as usize];
                if node.is_leaf() {
                    let offset = node.primitive_offset();
                    for slot in offset..offset + node.primitive_count() {
                        let (id, primitive) = reader.slot_primitive(slot);
                        let Some(hit) = primitive.intersect_ray(&clipped, options.side, options.point_threshold)
                        else {
                            continue;
                        };
                        if best.map_or(true, |(_, _, b)| hit.distance < b.distance) {
                            clipped.far = hit.distance;
                            best = Some((id, primitive, hit));
                        }
                    }
                    continue;
                }

                let left = index + 1;
                let right = node.right_child();
                let left_entry = slab_interval(&nodes[left as usize].aabb(), &clipped, margin).map(|(t, _)| t);
                let right_entry = slab_interval(&nodes[right as usize].aabb(), &clipped, margin).map(|(t, _)| t);
                match (left_entry, right_entry) {
                    (Some(l), Some(r)) if r < l => {
                        stack.push((left, l));
                        stack.push((right, r));
                    }
                    (Some(l), Some(r)) => {
                        stack.push((right, r));
                        stack.push((left, l));
                    }
                    (Some(l), None) => stack.push((left, l)),
                    (None, Some(r)) => stack.push((right, r)),
                    (None, None) => {}
                }
            }
        }

        best.map(|(id, primitive, hit)| resolver.hit(id, &primitive, hit))
    }
}

/// Reference raycast testing every primitive of `geometry`, nearest first
pub fn raycast_geometry(geometry: &Geometry, ray: &Ray, options: &RaycastOptions) -> Vec<Hit> {
    let reader = PrimitiveReader {
        view: geometry.view(),
        indirect: None,
    };
    let resolver = HitResolver::new(geometry, &reader);
    let mut hits: Vec<Hit> = (0..reader.view().primitive_count() as u32)
        .filter_map(|id| {
            let primitive = reader.primitive(id);
            primitive
                .intersect_ray(ray, options.side, options.point_threshold)
                .map(|hit| resolver.hit(id, &primitive, hit))
        })
        .collect();
    sort_hits(&mut hits);
    hits
}
