//! Configuration for seam placement.

mod seam_config;

pub use seam_config::{SeamPlacerConfig, SeamPosition};
