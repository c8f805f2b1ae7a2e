//! Seam placement configuration.
//!
//! Every tunable constant of the seam placer lives here so a profile can override
//! it from JSON. Missing fields fall back to the defaults below.

use crate::{CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Seam placement strategy of a print object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeamPosition {
    /// Hide seams in corners and line them up across layers.
    #[default]
    Aligned,
    /// Pick the best corner closest to where the nozzle already is.
    Nearest,
    /// Scatter seams along the loop by arc length.
    Random,
    /// Place seams at the back (max Y) of the object.
    Rear,
}

impl SeamPosition {
    /// Strategies that need the raycast visibility model.
    pub fn needs_visibility(&self) -> bool {
        matches!(self, SeamPosition::Aligned | SeamPosition::Nearest)
    }
}

/// Tunable constants for seam placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeamPlacerConfig {
    // === Occlusion model ===
    /// Maximum quadric error when decimating the raycasting mesh (mm²).
    pub raycasting_decimation_target_error: CoordF,

    /// Target maximum edge length after re-subdivision (mm).
    pub raycasting_subdivision_target_length: CoordF,

    /// Rays per face are `N * N` with N = this value.
    pub sqr_rays_per_sample_point: usize,

    /// Distance along the face normal the rays start from (mm).
    pub raycasting_origin_offset: CoordF,

    // === Candidate extraction ===
    /// Arm length covered on each side when measuring the turning angle (mm).
    pub polygon_local_angles_arm_distance: CoordF,

    /// Floor for edge lengths (mm).
    pub minimal_edge_length: CoordF,

    /// Step between extra candidates on enforced/blocked edges (mm).
    pub enforcer_oversampling_distance: CoordF,

    /// Radius of the enforcer/blocker classification query (mm).
    pub enforcer_blocker_distance_tolerance: CoordF,

    // === Scoring ===
    /// Overhang above which a candidate is avoided (mm).
    pub overhang_distance_threshold: CoordF,

    /// Weight of the turning angle against visibility, Aligned/Rear/Random.
    pub angle_importance_aligned: CoordF,

    /// Weight of the turning angle against visibility, Nearest.
    pub angle_importance_nearest: CoordF,

    /// Falloff of the gaussian distance penalty used by Nearest.
    pub nearest_distance_falloff: CoordF,

    // === Alignment ===
    /// Penalty difference below which two candidates count as similar.
    pub seam_align_score_tolerance: CoordF,

    /// Max XY distance between consecutive seams of one string (mm).
    pub seam_align_tolerable_dist: CoordF,

    /// Layers that may be skipped while growing a string, split between
    /// the two directions.
    pub seam_align_tolerable_skips: usize,

    /// Strings shorter than this are left unaligned.
    pub seam_align_minimum_string_seams: usize,

    /// Smoothing passes over an accepted string.
    pub seam_align_iterations: usize,

    /// Smallest smoothing weight after shifting.
    pub seam_align_min_weight: CoordF,

    // === Internal perimeters ===
    /// Max distance from an external concave seam at which internal perimeter
    /// seams are pulled into the same corner (mm).
    pub concave_snap_max_distance: CoordF,

    // === Random ===
    /// Seed of the per-layer generators of the Random strategy.
    pub random_seed: u64,
}

impl Default for SeamPlacerConfig {
    fn default() -> Self {
        Self {
            raycasting_decimation_target_error: 0.1,
            raycasting_subdivision_target_length: 2.0,
            sqr_rays_per_sample_point: 5,
            raycasting_origin_offset: 1.0,
            polygon_local_angles_arm_distance: 0.5,
            minimal_edge_length: 0.01,
            enforcer_oversampling_distance: 0.2,
            enforcer_blocker_distance_tolerance: 0.35,
            overhang_distance_threshold: 0.1,
            angle_importance_aligned: 0.6,
            angle_importance_nearest: 1.0,
            nearest_distance_falloff: 0.01,
            seam_align_score_tolerance: 0.3,
            seam_align_tolerable_dist: 1.0,
            seam_align_tolerable_skips: 4,
            seam_align_minimum_string_seams: 6,
            seam_align_iterations: 4,
            seam_align_min_weight: 0.01,
            concave_snap_max_distance: 2.0,
            random_seed: 0,
        }
    }
}

impl SeamPlacerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Angle weight for the given strategy.
    pub fn angle_importance(&self, position: SeamPosition) -> CoordF {
        match position {
            SeamPosition::Nearest => self.angle_importance_nearest,
            _ => self.angle_importance_aligned,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sqr_rays_per_sample_point == 0 {
            return Err(Error::Config(
                "sqr_rays_per_sample_point must be positive".to_string(),
            ));
        }

        let positive = [
            (
                "raycasting_subdivision_target_length",
                self.raycasting_subdivision_target_length,
            ),
            (
                "polygon_local_angles_arm_distance",
                self.polygon_local_angles_arm_distance,
            ),
            ("minimal_edge_length", self.minimal_edge_length),
            (
                "enforcer_oversampling_distance",
                self.enforcer_oversampling_distance,
            ),
            ("nearest_distance_falloff", self.nearest_distance_falloff),
            ("seam_align_min_weight", self.seam_align_min_weight),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(Error::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let non_negative = [
            (
                "raycasting_decimation_target_error",
                self.raycasting_decimation_target_error,
            ),
            ("raycasting_origin_offset", self.raycasting_origin_offset),
            (
                "enforcer_blocker_distance_tolerance",
                self.enforcer_blocker_distance_tolerance,
            ),
            ("overhang_distance_threshold", self.overhang_distance_threshold),
            ("seam_align_score_tolerance", self.seam_align_score_tolerance),
            ("seam_align_tolerable_dist", self.seam_align_tolerable_dist),
            ("concave_snap_max_distance", self.concave_snap_max_distance),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(Error::Config(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SeamPlacerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.seam_align_minimum_string_seams, 6);
        assert!((config.angle_importance(SeamPosition::Nearest) - 1.0).abs() < 1e-12);
        assert!((config.angle_importance(SeamPosition::Rear) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            SeamPlacerConfig::from_json(r#"{ "seam_align_minimum_string_seams": 3, "random_seed": 42 }"#)
                .unwrap();
        assert_eq!(config.seam_align_minimum_string_seams, 3);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.sqr_rays_per_sample_point, 5);
    }

    #[test]
    fn test_json_round_trip() {
        let config = SeamPlacerConfig {
            seam_align_tolerable_dist: 2.5,
            ..Default::default()
        };
        let parsed = SeamPlacerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SeamPlacerConfig::from_json(r#"{ "sqr_rays_per_sample_point": 0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SeamPlacerConfig::from_json(r#"{ "enforcer_oversampling_distance": -1.0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SeamPlacerConfig::from_json("{ not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_strategy_serde_names() {
        let position: SeamPosition = serde_json::from_str(r#""Rear""#).unwrap();
        assert_eq!(position, SeamPosition::Rear);
        assert!(SeamPosition::Aligned.needs_visibility());
        assert!(!SeamPosition::Random.needs_visibility());
    }
}
