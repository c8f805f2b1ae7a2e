//! # Slicer Seams
//!
//! Seam placement for the slicing pipeline.
//!
//! For every closed perimeter loop of every layer, this library picks the point
//! where extrusion starts and stops:
//! - global occlusion raycasting over a decimated copy of the object mesh
//! - candidate extraction with local turning angles and painted enforcers/blockers
//! - visibility and overhang scoring
//! - per-loop selection (aligned, nearest, rear, random)
//! - cross-layer alignment with weighted smoothing
//!
//! ## Example
//!
//! ```rust,ignore
//! use slicer_seams::{Print, SeamPlacer, SeamPlacerConfig};
//!
//! let mut placer = SeamPlacer::new(SeamPlacerConfig::default());
//! placer.init(&print, &|| false)?;
//! placer.place_seam(0, layer_idx, &mut extrusion_loop, true, last_pos);
//! ```

pub mod config;
pub mod gcode;
pub mod geometry;
pub mod mesh;
pub mod print;

pub use config::{SeamPlacerConfig, SeamPosition};
pub use gcode::{
    EnforcedBlockedSeamPoint, ExtrusionLoop, ExtrusionPath, ExtrusionRole, LayerSeams, Perimeter,
    PrintObjectSeamData, SeamCandidate, SeamComparator, SeamPlacer, SeamPlacerStats,
};
pub use geometry::{
    closest_point_on_triangle, ray_box_intersect, ray_triangle_intersect, AABBClosestPointResult,
    AABBTree, IndexedPointSet, IndexedTriangleSet, Point, PointF, Polygon, Polygons, Polyline,
    RayHit, Transform3D, Vec3, AABB3,
};
pub use mesh::{decimate_mesh, subdivide_to_max_edge, DecimateResult, Triangle, TriangleMesh};
pub use print::{Layer, ModelVolume, Print, PrintObject, SeamFacets, VolumeType};

/// Coordinate type used throughout the slicer.
/// Using i64 for integer coordinates (scaled by SCALING_FACTOR) to avoid floating-point issues.
pub type Coord = i64;

/// Floating-point coordinate type for unscaled values.
pub type CoordF = f64;

/// Scaling factor: coordinates are stored as integers scaled by this factor.
/// 1 unit = 1 nanometer, so 1mm = 1_000_000 units.
pub const SCALING_FACTOR: f64 = 1_000_000.0;

/// Scale a floating-point coordinate to integer.
#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

/// Unscale an integer coordinate to floating-point.
#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for seam placement operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mesh error: {0}")]
    Mesh(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling() {
        assert_eq!(scale(1.0), 1_000_000);
        assert!((unscale(1_000_000) - 1.0).abs() < 1e-10);
        assert_eq!(scale(0.001), 1_000);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Config("sqr_rays_per_sample_point must be positive".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: sqr_rays_per_sample_point must be positive"
        );
        assert_eq!(Error::Cancelled.to_string(), "Cancelled");
    }
}
