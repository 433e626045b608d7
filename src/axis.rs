extern crate glam;

use std::ops::{Index, IndexMut};

use strum::EnumIter;

/// 3D Axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// Axis from its wire value (0, 1 or 2)
    #[inline]
    pub fn from_index(index: u32) -> Option<Axis> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Axis with the largest component of `extent`. Ties keep the earlier axis.
    #[inline]
    pub fn longest(extent: glam::Vec3A) -> Axis {
        let mut axis = Axis::X;
        if extent.y > extent.x {
            axis = Axis::Y;
        }
        if extent.z > extent[axis] {
            axis = Axis::Z;
        }
        axis
    }
}

impl Index<Axis> for glam::Vec3A {
    type Output = f32;

    fn index(&self, axis: Axis) -> &Self::Output {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

impl IndexMut<Axis> for glam::Vec3A {
    fn index_mut(&mut self, axis: Axis) -> &mut Self::Output {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::Axis;

    #[test]
    fn longest_axis() {
        assert_eq!(Axis::longest(Vec3A::new(1.0, 2.0, 0.5)), Axis::Y);
        assert_eq!(Axis::longest(Vec3A::new(1.0, 1.0, 1.0)), Axis::X);
        assert_eq!(Axis::longest(Vec3A::new(0.0, 0.0, 3.0)), Axis::Z);
    }

    #[test]
    fn wire_round_trip() {
        assert_eq!(Axis::from_index(2), Some(Axis::Z));
        assert_eq!(Axis::from_index(3), None);
        assert_eq!(Axis::Y.index(), 1);
    }
}
