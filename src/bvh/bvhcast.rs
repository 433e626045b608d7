//! Hierarchy against hierarchy traversal.

use glam::Affine3A;
use smallvec::SmallVec;

use super::{BoundsIntersection, MeshBvh, PrimitiveReader, ShapecastCallbacks};
use crate::{OrientedBox, Primitive, AABB};

struct OtherLeafSearch<'l, F> {
    /// Leaf of the outer mesh, as a box in the other mesh's space
    leaf_box: OrientedBox,
    leaf: &'l [(u32, Primitive)],
    other_to_self: Affine3A,
    callback: &'l mut F,
}

impl<F> ShapecastCallbacks for OtherLeafSearch<'_, F>
where
    F: FnMut(&Primitive, &Primitive, u32, u32) -> bool,
{
    fn intersects_bounds(&mut self, bounds: &AABB, _: bool, _: Option<f32>, _: u32, _: u32) -> BoundsIntersection {
        if self.leaf_box.intersects_aabb(bounds) {
            BoundsIntersection::Intersected
        } else {
            BoundsIntersection::NotIntersected
        }
    }

    fn intersects_primitive(&mut self, primitive: &Primitive, primitive_id: u32, _: bool, _: u32) -> bool {
        let other = primitive.transformed(&self.other_to_self);
        self.leaf
            .iter()
            .any(|(id, mine)| (self.callback)(mine, &other, *id, primitive_id))
    }
}

struct BvhcastSearch<'a, 'r, F> {
    reader: &'r PrimitiveReader<'a>,
    other: &'r MeshBvh,
    other_reader: &'r PrimitiveReader<'r>,
    other_bounds: AABB,
    other_to_self: Affine3A,
    self_to_other: Affine3A,
    leaf: SmallVec<[(u32, Primitive); 16]>,
    callback: F,
}

impl<F> ShapecastCallbacks for BvhcastSearch<'_, '_, F>
where
    F: FnMut(&Primitive, &Primitive, u32, u32) -> bool,
{
    fn intersects_bounds(&mut self, bounds: &AABB, _: bool, _: Option<f32>, _: u32, _: u32) -> BoundsIntersection {
        if bounds.intersects_aabb(&self.other_bounds) {
            BoundsIntersection::Intersected
        } else {
            BoundsIntersection::NotIntersected
        }
    }

    fn intersects_range(&mut self, offset: u32, count: u32, _: bool, _: u32, _: u32, bounds: &AABB) -> Option<bool> {
        self.leaf.clear();
        self.leaf
            .extend((offset..offset + count).map(|slot| self.reader.slot_primitive(slot)));
        let mut inner = OtherLeafSearch {
            leaf_box: OrientedBox::new(bounds, &self.self_to_other),
            leaf: &self.leaf,
            other_to_self: self.other_to_self,
            callback: &mut self.callback,
        };
        Some(self.other.shapecast_with(self.other_reader, &mut inner))
    }

    fn intersects_primitive(&mut self, _: &Primitive, _: u32, _: bool, _: u32) -> bool {
        false
    }
}

impl MeshBvh {
    /// Walk both hierarchies together. `other_to_self` carries `other` into this mesh's space.
    /// For each pair of primitives whose leaves overlap, `callback` receives this mesh's
    /// primitive, the other primitive in this mesh's space, and both ids. Returning `true`
    /// stops the traversal, which is then reported as `true`.
    pub fn bvhcast<F>(&self, other: &MeshBvh, other_to_self: &Affine3A, callback: F) -> bool
    where
        F: FnMut(&Primitive, &Primitive, u32, u32) -> bool,
    {
        let reader = self.reader();
        let other_reader = other.reader();
        let mut search = BvhcastSearch {
            reader: &reader,
            other,
            other_reader: &other_reader,
            other_bounds: other.bounds().transformed(other_to_self),
            other_to_self: *other_to_self,
            self_to_other: other_to_self.inverse(),
            leaf: SmallVec::new(),
            callback,
        };
        self.shapecast_with(&reader, &mut search)
    }

    /// True if any primitive of `other`, placed by `other_to_self`, touches this mesh
    pub fn intersects_geometry(&self, other: &MeshBvh, other_to_self: &Affine3A) -> bool {
        self.bvhcast(other, other_to_self, |mine, theirs, _, _| mine.intersects_primitive(theirs))
    }
}
