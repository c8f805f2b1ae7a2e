//! Seam placement for perimeter loops.
//!
//! `SeamPlacer::init` precomputes a seam for every external perimeter loop of
//! every layer of a print. G-code generation later calls
//! `SeamPlacer::place_seam` to rotate each extrusion loop so that it starts at
//! that seam.
//!
//! # Pipeline
//!
//! 1. **Occlusion model**: the object mesh is simplified and every face is
//!    scored by how many rays escape from it ([`occlusion`]).
//! 2. **Candidates**: every perimeter vertex becomes a candidate, with extra
//!    points along edges near painted enforcers and blockers ([`candidates`]).
//! 3. **Scoring**: visibility from the occlusion model, overhang against the
//!    layer below ([`scoring`]).
//! 4. **Selection**: one seam per loop, by strategy ([`selection`]).
//! 5. **Alignment**: seams of neighbouring layers are chained and smoothed
//!    into vertical lines ([`alignment`]).

pub mod alignment;
pub mod candidates;
pub mod comparator;
pub mod occlusion;
pub mod scoring;
pub mod selection;

use log::{debug, info, warn};
use rayon::prelude::*;

pub use comparator::SeamComparator;

use self::alignment::{align_seam_points, AlignmentStats};
use self::candidates::extract_layer;
use self::occlusion::GlobalModelInfo;
use self::scoring::{compute_layer_overhangs, compute_layer_visibility};
use self::selection::{layer_rng, pick_layer_seams, pick_nearest_seam_point_index};
use super::extrusion::{ExtrusionLoop, ExtrusionRole};
use crate::config::{SeamPlacerConfig, SeamPosition};
use crate::geometry::{IndexedPointSet, Point, Vec3};
use crate::print::{Print, PrintObject};
use crate::{scale, unscale, CoordF, Error, Result};

const EPSILON: CoordF = 1e-6;

/// Distance under which the seam is matched to an existing loop vertex.
const SEAM_VERTEX_TOLERANCE: CoordF = 0.0015;

// ============================================================================
// Seam Candidate Data Structures
// ============================================================================

/// Painted status of a candidate. Ordered so that a greater value is a more
/// desirable seam.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnforcedBlockedSeamPoint {
    Blocked,
    #[default]
    Neutral,
    Enforced,
}

/// One closed loop of a layer and its seam decision.
#[derive(Clone, Debug)]
pub struct Perimeter {
    /// First candidate of the loop.
    pub start_index: usize,
    /// Last candidate of the loop (inclusive).
    pub end_index: usize,
    /// Chosen seam candidate.
    pub seam_index: usize,
    /// The loop was clockwise and is stored re-wound, so its material lies
    /// right of the stored edges.
    pub flipped: bool,
    /// Set once `final_seam_position` is authoritative.
    pub finalized: bool,
    pub final_seam_position: Vec3,
}

impl Perimeter {
    pub fn new(start_index: usize, end_index: usize, flipped: bool) -> Self {
        Self {
            start_index,
            end_index,
            seam_index: start_index,
            flipped,
            finalized: false,
            final_seam_position: Vec3::zero(),
        }
    }

    pub fn len(&self) -> usize {
        if self.end_index >= self.start_index {
            self.end_index - self.start_index + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prev_index(&self, idx: usize) -> usize {
        if idx == self.start_index {
            self.end_index
        } else {
            idx - 1
        }
    }

    fn next_index(&self, idx: usize) -> usize {
        if idx == self.end_index {
            self.start_index
        } else {
            idx + 1
        }
    }
}

/// A point of a loop that may carry the seam.
#[derive(Clone, Debug)]
pub struct SeamCandidate {
    /// Unscaled position, Z is the layer's slice height.
    pub position: Vec3,
    pub perimeter_index: usize,
    /// Fraction of escaping rays, 0 = hidden.
    pub visibility: CoordF,
    /// Signed overhang in mm, negative when supported.
    pub overhang: CoordF,
    /// Turning angle at the candidate, positive = convex.
    pub local_ccw_angle: CoordF,
    pub point_type: EnforcedBlockedSeamPoint,
}

impl SeamCandidate {
    pub fn new(position: Vec3, perimeter_index: usize, local_ccw_angle: CoordF) -> Self {
        Self {
            position,
            perimeter_index,
            visibility: 0.0,
            overhang: 0.0,
            local_ccw_angle,
            point_type: EnforcedBlockedSeamPoint::Neutral,
        }
    }
}

// ============================================================================
// Layer Seam Data
// ============================================================================

/// Loops and candidates of one layer.
///
/// Candidates of a loop are contiguous, loops are in the order of the layer's
/// polygons. The nearest-point index is a snapshot of the candidate positions
/// taken by [`LayerSeams::build_index`].
#[derive(Clone, Debug, Default)]
pub struct LayerSeams {
    pub perimeters: Vec<Perimeter>,
    pub candidates: Vec<SeamCandidate>,
    pub slice_z: CoordF,
    index: IndexedPointSet,
}

impl LayerSeams {
    pub fn new(slice_z: CoordF) -> Self {
        Self {
            slice_z,
            ..Default::default()
        }
    }

    /// Freeze the candidate positions into the nearest-point index.
    pub fn build_index(&mut self) {
        self.index = IndexedPointSet::new(self.candidates.iter().map(|c| c.position).collect());
    }

    pub fn nearest_candidate(&self, position: &Vec3) -> Option<usize> {
        self.index.nearest(position).map(|(idx, _)| idx)
    }

    pub fn perimeter_of(&self, candidate_idx: usize) -> &Perimeter {
        &self.perimeters[self.candidates[candidate_idx].perimeter_index]
    }

    /// Resolved seam of a loop: the finalized position if there is one,
    /// otherwise the chosen candidate.
    pub fn seam_position(&self, perimeter_idx: usize) -> Option<Vec3> {
        let perimeter = self.perimeters.get(perimeter_idx)?;
        if perimeter.finalized {
            Some(perimeter.final_seam_position)
        } else {
            self.candidates.get(perimeter.seam_index).map(|c| c.position)
        }
    }
}

/// Seam data of one print object, one entry per layer.
#[derive(Clone, Debug, Default)]
pub struct PrintObjectSeamData {
    pub layers: Vec<LayerSeams>,
    pub seam_position: SeamPosition,
    pub alignment: AlignmentStats,
}

/// Summary of the seams computed for one object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeamPlacerStats {
    pub layer_count: usize,
    pub total_perimeters: usize,
    pub total_candidates: usize,
    pub finalized_count: usize,
    pub strings_aligned: usize,
    pub seam_position: SeamPosition,
}

// ============================================================================
// Seam Placer
// ============================================================================

/// Precomputes seams for a print and applies them to extrusion loops.
#[derive(Clone, Debug, Default)]
pub struct SeamPlacer {
    config: SeamPlacerConfig,
    objects: Vec<PrintObjectSeamData>,
    initialized: bool,
}

impl SeamPlacer {
    pub fn new(config: SeamPlacerConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
            initialized: false,
        }
    }

    pub fn config(&self) -> &SeamPlacerConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Compute seams for every object of `print`, replacing earlier results.
    ///
    /// `cancel` is polled between stages. When it returns true the placer is
    /// left empty and `Error::Cancelled` is returned.
    pub fn init(&mut self, print: &Print, cancel: &dyn Fn() -> bool) -> Result<()> {
        self.objects.clear();
        self.initialized = false;
        let mut objects = Vec::with_capacity(print.object_count());
        for (object_idx, object) in print.objects().iter().enumerate() {
            objects.push(self.init_object(object_idx, object, cancel)?);
        }
        self.objects = objects;
        self.initialized = true;
        Ok(())
    }

    fn init_object(
        &self,
        object_idx: usize,
        object: &PrintObject,
        cancel: &dyn Fn() -> bool,
    ) -> Result<PrintObjectSeamData> {
        let config = &self.config;
        let seam_position = object.seam_position();
        let check_cancel = || if cancel() { Err(Error::Cancelled) } else { Ok(()) };

        info!(
            "Seam placement for '{}': {} layers, {:?}",
            object.name(),
            object.layers().len(),
            seam_position
        );

        check_cancel()?;
        let mut global = GlobalModelInfo::with_painted_regions(object);
        if seam_position.needs_visibility() {
            info!("Seam placement for '{}': occlusion model", object.name());
            global.compute_visibility(object, config);
        }

        check_cancel()?;
        info!("Seam placement for '{}': candidates", object.name());
        let mut layers: Vec<LayerSeams> = object
            .layers()
            .par_iter()
            .map(|layer| extract_layer(layer, &global, config))
            .collect();
        debug!(
            "'{}': {} seam candidates",
            object.name(),
            layers.iter().map(|l| l.candidates.len()).sum::<usize>()
        );

        if seam_position.needs_visibility() {
            check_cancel()?;
            info!("Seam placement for '{}': visibility", object.name());
            layers
                .par_iter_mut()
                .for_each(|layer| compute_layer_visibility(layer, &global));
        }

        check_cancel()?;
        info!("Seam placement for '{}': overhangs", object.name());
        let overhangs: Vec<Vec<CoordF>> = (1..layers.len())
            .into_par_iter()
            .map(|idx| compute_layer_overhangs(&layers[idx - 1], &layers[idx]))
            .collect();
        for (layer, values) in layers.iter_mut().skip(1).zip(overhangs) {
            for (candidate, overhang) in layer.candidates.iter_mut().zip(values) {
                candidate.overhang = overhang;
            }
        }

        check_cancel()?;
        info!("Seam placement for '{}': selection", object.name());
        let comparator = SeamComparator::new(seam_position, config);
        let seed = config.random_seed;
        layers.par_iter_mut().enumerate().for_each(|(layer_idx, layer)| {
            let mut rng = layer_rng(seed, object_idx, layer_idx);
            pick_layer_seams(layer, &comparator, &mut rng);
        });

        let mut alignment = AlignmentStats::default();
        if seam_position == SeamPosition::Aligned {
            check_cancel()?;
            info!("Seam placement for '{}': alignment", object.name());
            alignment = align_seam_points(&mut layers, &comparator, config);
        }

        Ok(PrintObjectSeamData {
            layers,
            seam_position,
            alignment,
        })
    }

    /// Rotate `extrusion_loop` so that it starts at the precomputed seam of
    /// the loop it belongs to.
    ///
    /// `last_pos` is the current nozzle position, used by
    /// [`SeamPosition::Nearest`]. `_external_first` is accepted for call-site
    /// compatibility with the perimeter generator.
    pub fn place_seam(
        &self,
        object_idx: usize,
        layer_idx: usize,
        extrusion_loop: &mut ExtrusionLoop,
        _external_first: bool,
        last_pos: &Point,
    ) {
        let object = self.objects.get(object_idx);
        let layer = object.and_then(|o| o.layers.get(layer_idx));
        debug_assert!(
            layer.is_some(),
            "place_seam: no seam data for object {object_idx} layer {layer_idx}"
        );
        let (Some(object), Some(layer)) = (object, layer) else {
            warn!("place_seam: no seam data for object {object_idx} layer {layer_idx}");
            return;
        };

        let Some(first) = extrusion_loop.first_point() else {
            return;
        };
        let Some(closest) = layer.nearest_candidate(&first.to_vec3(layer.slice_z)) else {
            return;
        };
        let perimeter = layer.perimeter_of(closest);

        let mut seam_index = perimeter.seam_index;
        let seam_position = if perimeter.finalized {
            perimeter.final_seam_position
        } else {
            if object.seam_position == SeamPosition::Nearest {
                let preferred = last_pos.to_vec3(layer.slice_z);
                seam_index =
                    pick_nearest_seam_point_index(&layer.candidates, perimeter, &preferred, &self.config);
            }
            layer.candidates[seam_index].position
        };

        let mut seam_point = Point::from(seam_position);
        if matches!(object.seam_position, SeamPosition::Nearest | SeamPosition::Aligned)
            && extrusion_loop.role() == ExtrusionRole::Perimeter
        {
            let snapped =
                self.snap_to_concave_corner(layer, perimeter, seam_index, &seam_position, extrusion_loop);
            if let Some(snapped) = snapped {
                seam_point = snapped;
            }
        }

        if !extrusion_loop.split_at_vertex(&seam_point, scale(SEAM_VERTEX_TOLERANCE)) {
            extrusion_loop.split_at(&seam_point);
        }
    }

    /// Inner loops follow an outer seam sitting in a concave corner into the
    /// same corner, along its bisector.
    fn snap_to_concave_corner(
        &self,
        layer: &LayerSeams,
        perimeter: &Perimeter,
        seam_index: usize,
        seam_position: &Vec3,
        extrusion_loop: &ExtrusionLoop,
    ) -> Option<Point> {
        let corner = &layer.candidates[seam_index];
        if corner.local_ccw_angle >= -EPSILON
            || seam_position.distance(&corner.position) >= self.config.concave_snap_max_distance
        {
            return None;
        }

        let prev = &layer.candidates[perimeter.prev_index(seam_index)].position;
        let next = &layer.candidates[perimeter.next_index(seam_index)].position;
        let to_prev = (corner.position - *prev).with_z(0.0).normalized();
        let to_next = (corner.position - *next).with_z(0.0).normalized();
        let dir_to_middle = (to_prev + to_next) * 0.5;

        let angle_factor = (-corner.local_ccw_angle / 2.0).cos();
        if angle_factor < EPSILON {
            return None;
        }

        let seam_point = Point::from(*seam_position);
        let polygon = extrusion_loop.polygon();
        if polygon.is_empty() {
            return None;
        }
        let depth = unscale(1) * polygon.distance_to_point(&seam_point);

        let offset = dir_to_middle * (std::f64::consts::SQRT_2 * depth / angle_factor);
        Some(Point::from(*seam_position + offset))
    }

    pub fn object_data(&self, object_idx: usize) -> Option<&PrintObjectSeamData> {
        self.objects.get(object_idx)
    }

    /// Resolved seam of one loop of one layer of one object.
    pub fn seam_position_3d(&self, object_idx: usize, layer_idx: usize, perimeter_idx: usize) -> Option<Vec3> {
        self.objects
            .get(object_idx)?
            .layers
            .get(layer_idx)?
            .seam_position(perimeter_idx)
    }

    /// One entry per object of the last `init`.
    pub fn stats(&self) -> Vec<SeamPlacerStats> {
        self.objects
            .iter()
            .map(|object| SeamPlacerStats {
                layer_count: object.layers.len(),
                total_perimeters: object.layers.iter().map(|l| l.perimeters.len()).sum(),
                total_candidates: object.layers.iter().map(|l| l.candidates.len()).sum(),
                finalized_count: object
                    .layers
                    .iter()
                    .flat_map(|l| &l.perimeters)
                    .filter(|p| p.finalized)
                    .count(),
                strings_aligned: object.alignment.strings_aligned,
                seam_position: object.seam_position,
            })
            .collect()
    }
}
