//! Geometry primitives for seam placement.
//!
//! - [`Point`] / [`PointF`]: 2D points, scaled integer and millimetre
//! - [`Polygon`] / [`Polyline`]: closed and open point sequences
//! - [`Vec3`]: 3D millimetre vector used for candidates and meshes
//! - [`Transform3D`]: volume and instance matrices
//! - [`AABBTree`], [`IndexedTriangleSet`], [`IndexedPointSet`]: spatial queries
//!
//! ## Coordinate System
//!
//! Perimeter polygons use scaled integer coordinates (1 unit = 1 nanometer).
//! Everything 3D is in unscaled millimetres.

pub mod aabb_tree;
mod point;
mod polygon;
mod polyline;
mod transform;

pub use aabb_tree::{
    closest_point_on_triangle, ray_box_intersect, ray_triangle_intersect, AABBClosestPointResult,
    AABBNode, AABBTree, IndexedPointSet, IndexedTriangleSet, RayHit, Vec3, AABB3,
};
pub use point::{Point, PointF};
pub use polygon::{Polygon, Polygons};
pub use polyline::Polyline;
pub use transform::Transform3D;
