//! Seam choice within a single loop.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::comparator::SeamComparator;
use super::{LayerSeams, Perimeter, SeamCandidate};
use crate::config::{SeamPlacerConfig, SeamPosition};
use crate::geometry::Vec3;
use crate::CoordF;

/// Generator for the Random strategy on one layer of one object. The same
/// seed always gives the same seams, independent of thread scheduling.
pub fn layer_rng(seed: u64, object_idx: usize, layer_idx: usize) -> StdRng {
    let mixed = seed
        ^ (object_idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (layer_idx as u64).wrapping_add(1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    StdRng::seed_from_u64(mixed)
}

/// Choose the seam of every loop of `layer`.
pub fn pick_layer_seams(layer: &mut LayerSeams, comparator: &SeamComparator, rng: &mut StdRng) {
    let LayerSeams {
        candidates,
        perimeters,
        ..
    } = layer;
    for perimeter in perimeters.iter_mut() {
        match comparator.setup() {
            SeamPosition::Random => pick_random_seam_point(candidates, perimeter, comparator, rng),
            _ => pick_seam_point(candidates, perimeter, comparator),
        }
    }
}

/// Best candidate of the loop. Ties keep the earlier candidate.
pub fn pick_seam_point(candidates: &[SeamCandidate], perimeter: &mut Perimeter, comparator: &SeamComparator) {
    perimeter.seam_index = best_index(candidates, perimeter, comparator, None);
}

/// Best candidate of the loop for a nozzle currently at `preferred`.
pub fn pick_nearest_seam_point_index(
    candidates: &[SeamCandidate],
    perimeter: &Perimeter,
    preferred: &Vec3,
    config: &SeamPlacerConfig,
) -> usize {
    let comparator = SeamComparator::new(SeamPosition::Nearest, config);
    best_index(candidates, perimeter, &comparator, Some(preferred))
}

fn best_index(
    candidates: &[SeamCandidate],
    perimeter: &Perimeter,
    comparator: &SeamComparator,
    preferred: Option<&Vec3>,
) -> usize {
    let mut seam_index = perimeter.start_index;
    for idx in perimeter.start_index..=perimeter.end_index {
        if comparator.is_first_better(&candidates[idx], &candidates[seam_index], preferred) {
            seam_index = idx;
        }
    }
    seam_index
}

/// Edge leaving a candidate that may carry the seam.
struct Viable {
    index: usize,
    edge_length: CoordF,
    edge: Vec3,
}

/// Pick a uniformly distributed point along the edges leaving the loop's
/// best-class candidates and finalize the loop there.
pub fn pick_random_seam_point(
    candidates: &[SeamCandidate],
    perimeter: &mut Perimeter,
    comparator: &SeamComparator,
    rng: &mut StdRng,
) {
    let viable_at = |idx: usize| {
        let next = if idx == perimeter.end_index {
            perimeter.start_index
        } else {
            idx + 1
        };
        let edge = candidates[next].position - candidates[idx].position;
        Viable {
            index: idx,
            edge_length: edge.length(),
            edge,
        }
    };

    let mut viables: Vec<Viable> = Vec::new();
    let mut example = perimeter.start_index;
    for idx in perimeter.start_index..=perimeter.end_index {
        if comparator.are_similar(&candidates[idx], &candidates[example]) {
            viables.push(viable_at(idx));
        } else if comparator.is_first_not_much_worse(&candidates[example], &candidates[idx]) {
            // worse than the current example
        } else {
            example = idx;
            viables.clear();
            viables.push(viable_at(idx));
        }
    }

    if viables.is_empty() {
        viables.push(viable_at(perimeter.start_index));
    }

    let total_length: CoordF = viables.iter().map(|v| v.edge_length).sum();
    let mut picked_length = total_length * rng.gen::<CoordF>();
    let mut picked = 0;
    while picked + 1 < viables.len() && picked_length > viables[picked].edge_length {
        picked_length -= viables[picked].edge_length;
        picked += 1;
    }

    let viable = &viables[picked];
    let along = picked_length.min(viable.edge_length).max(0.0);
    perimeter.seam_index = viable.index;
    perimeter.final_seam_position =
        candidates[viable.index].position + viable.edge.normalized() * along;
    perimeter.finalized = true;
}
