//! G-code side of seam placement.
//!
//! - [`extrusion`]: extrusion paths and closed loops, with seam splitting
//! - [`seam_placer`]: seam computation and application

pub mod extrusion;
pub mod seam_placer;

pub use extrusion::{ExtrusionLoop, ExtrusionPath, ExtrusionRole};
pub use seam_placer::{
    EnforcedBlockedSeamPoint, LayerSeams, Perimeter, PrintObjectSeamData, SeamCandidate,
    SeamComparator, SeamPlacer, SeamPlacerStats,
};
