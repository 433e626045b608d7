use glam::Affine3A;

use super::{BoundsIntersection, MeshBvh, Shapecast};
use crate::{OrientedBox, Primitive, Sphere, AABB};

impl MeshBvh {
    /// True if any primitive overlaps the box `local` placed by `box_to_mesh`
    pub fn intersects_box(&self, local: &AABB, box_to_mesh: &Affine3A) -> bool {
        let obb = OrientedBox::new(local, box_to_mesh);
        self.shapecast(&mut Shapecast::new(
            |bounds: &AABB, _| {
                if obb.contains_aabb(bounds) {
                    BoundsIntersection::Contained
                } else if obb.intersects_aabb(bounds) {
                    BoundsIntersection::Intersected
                } else {
                    BoundsIntersection::NotIntersected
                }
            },
            |primitive: &Primitive, _, contained| contained || primitive.intersects_oriented_box(&obb),
        ))
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.shapecast(&mut Shapecast::new(
            |bounds: &AABB, _| {
                if sphere.contains_aabb(bounds) {
                    BoundsIntersection::Contained
                } else if sphere.intersects_aabb(bounds) {
                    BoundsIntersection::Intersected
                } else {
                    BoundsIntersection::NotIntersected
                }
            },
            |primitive: &Primitive, _, contained| contained || primitive.intersects_sphere(sphere),
        ))
    }
}
