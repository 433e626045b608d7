pub mod axis;
pub use axis::*;

pub mod aabb;
pub use aabb::*;

pub mod ray;
pub use ray::*;

pub mod triangle;
pub use triangle::*;

pub mod intersections;
pub use intersections::*;

pub mod triangle_intersection;
pub use triangle_intersection::*;

pub mod sphere;
pub use sphere::*;

pub mod obb;
pub use obb::*;

pub mod primitive;
pub use primitive::*;

pub mod buffer;
pub use buffer::*;

pub mod geometry;
pub use geometry::*;

pub mod error;
pub use error::*;

pub mod bvh_strategy;
pub use bvh_strategy::*;

pub mod bvh;
pub use bvh::*;
