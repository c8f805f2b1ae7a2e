//! Cross-layer seam alignment.
//!
//! Seams of neighbouring layers that are close together and about as good as
//! each other are chained into strings. Each long enough string is smoothed
//! into a straight-ish vertical line and its loops are finalized.

use log::debug;

use super::comparator::SeamComparator;
use super::LayerSeams;
use crate::config::SeamPlacerConfig;
use crate::geometry::Vec3;
use crate::CoordF;

/// `(layer index, candidate index)`
pub type SeamRef = (usize, usize);

/// Outcome of one alignment pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlignmentStats {
    pub strings_aligned: usize,
    pub strings_discarded: usize,
}

/// Align the seams of all layers of one object in place.
pub fn align_seam_points(
    layers: &mut [LayerSeams],
    comparator: &SeamComparator,
    config: &SeamPlacerConfig,
) -> AlignmentStats {
    let mut stats = AlignmentStats::default();

    for seed in seed_order(layers, comparator) {
        if layers[seed.0].perimeter_of(seed.1).finalized {
            continue;
        }

        let mut string = find_seam_string(layers, seed, comparator, config);
        if string.len() < config.seam_align_minimum_string_seams {
            stats.strings_discarded += 1;
            continue;
        }

        string.sort_by_key(|&(layer_idx, _)| layer_idx);
        let anchor = string
            .iter()
            .position(|&(layer_idx, _)| layer_idx == seed.0)
            .unwrap_or(0);

        let positions: Vec<Vec3> = string
            .iter()
            .map(|&(l, i)| layers[l].candidates[i].position)
            .collect();
        let penalties: Vec<CoordF> = string
            .iter()
            .map(|&(l, i)| comparator.get_penalty(&layers[l].candidates[i]))
            .collect();
        let weights = smoothing_weights(&penalties, config.seam_align_min_weight);
        let smoothed = smooth_string(&positions, &weights, anchor, config.seam_align_iterations);

        for (&(layer_idx, candidate_idx), position) in string.iter().zip(&smoothed) {
            let layer = &mut layers[layer_idx];
            let z = layer.candidates[candidate_idx].position.z;
            let perimeter_idx = layer.candidates[candidate_idx].perimeter_index;
            let perimeter = &mut layer.perimeters[perimeter_idx];
            perimeter.seam_index = candidate_idx;
            perimeter.final_seam_position = Vec3::new(position.x, position.y, z);
            perimeter.finalized = true;
        }
        stats.strings_aligned += 1;
    }

    debug!(
        "Seam alignment: {} strings aligned, {} too short",
        stats.strings_aligned, stats.strings_discarded
    );
    stats
}

/// Current seams of all loops, best first. Strings grown from earlier seeds
/// claim their loops.
///
/// Point type decides first, then seams over the overhang threshold go last,
/// then the penalty.
pub fn seed_order(layers: &[LayerSeams], comparator: &SeamComparator) -> Vec<SeamRef> {
    let mut seams: Vec<SeamRef> = layers
        .iter()
        .enumerate()
        .flat_map(|(layer_idx, layer)| layer.perimeters.iter().map(move |p| (layer_idx, p.seam_index)))
        .collect();

    seams.sort_by(|&(la, ia), &(lb, ib)| {
        let a = &layers[la].candidates[ia];
        let b = &layers[lb].candidates[ib];
        b.point_type
            .cmp(&a.point_type)
            .then_with(|| comparator.is_overhanging(a).cmp(&comparator.is_overhanging(b)))
            .then_with(|| comparator.get_penalty(a).total_cmp(&comparator.get_penalty(b)))
    });
    seams
}

/// Grow a string from `seed` upwards and downwards through the layers.
///
/// Every direction may miss `seam_align_tolerable_skips / 2` layers in total
/// before it stops; misses are not refunded by later hits.
pub fn find_seam_string(
    layers: &[LayerSeams],
    seed: SeamRef,
    comparator: &SeamComparator,
    config: &SeamPlacerConfig,
) -> Vec<SeamRef> {
    let mut string = vec![seed];

    for step in [1isize, -1] {
        let mut skips = (config.seam_align_tolerable_skips / 2) as isize;
        let mut last = seed;
        let mut next_layer = seed.0 as isize + step;

        while skips >= 0 && next_layer >= 0 && (next_layer as usize) < layers.len() {
            let layer_idx = next_layer as usize;
            let last_position = layers[last.0].candidates[last.1].position;
            let projected = last_position.with_z(layers[layer_idx].slice_z);

            match find_next_seam_in_layer(layers, last, layer_idx, &projected, comparator, config) {
                Some(found) => {
                    string.push(found);
                    last = found;
                }
                None => skips -= 1,
            }
            next_layer += step;
        }
    }

    string
}

/// Nearest candidate of `layer_idx` to `projected`, if it may continue a string
/// whose last member is `last`.
fn find_next_seam_in_layer(
    layers: &[LayerSeams],
    last: SeamRef,
    layer_idx: usize,
    projected: &Vec3,
    comparator: &SeamComparator,
    config: &SeamPlacerConfig,
) -> Option<SeamRef> {
    let layer = &layers[layer_idx];
    let closest_idx = layer.nearest_candidate(projected)?;
    let closest = &layer.candidates[closest_idx];
    let perimeter = layer.perimeter_of(closest_idx);
    if perimeter.finalized {
        return None;
    }

    let max_distance = config.seam_align_tolerable_dist;
    if closest.position.distance(projected) >= max_distance {
        return None;
    }

    let loop_seam = &layer.candidates[perimeter.seam_index];
    let last_point = &layers[last.0].candidates[last.1];
    if comparator.is_first_not_much_worse(closest, loop_seam) && comparator.are_similar(last_point, closest) {
        Some((layer_idx, closest_idx))
    } else {
        None
    }
}

/// Higher weight for lower penalty; the worst member gets `min_weight`.
pub fn smoothing_weights(penalties: &[CoordF], min_weight: CoordF) -> Vec<CoordF> {
    let min = penalties
        .iter()
        .map(|p| -p)
        .fold(CoordF::INFINITY, CoordF::min);
    penalties.iter().map(|p| -p - min + min_weight).collect()
}

/// Weighted three point averaging, sweeping away from `anchor` in both
/// directions on every pass. The anchor itself does not move.
pub fn smooth_string(positions: &[Vec3], weights: &[CoordF], anchor: usize, iterations: usize) -> Vec<Vec3> {
    let mut points = positions.to_vec();
    let n = points.len();
    if n < 2 {
        return points;
    }

    let average = |points: &[Vec3], i: usize| -> Vec3 {
        let lo = i.saturating_sub(1);
        let hi = (i + 1).min(n - 1);
        let mut sum = Vec3::zero();
        let mut total = 0.0;
        for j in lo..=hi {
            sum += points[j] * weights[j];
            total += weights[j];
        }
        if total > 0.0 {
            sum * (1.0 / total)
        } else {
            points[i]
        }
    };

    for _ in 0..iterations {
        for i in anchor + 1..n {
            points[i] = average(&points, i);
        }
        for i in (0..anchor).rev() {
            points[i] = average(&points, i);
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::super::candidates::extract_layer;
    use super::super::occlusion::GlobalModelInfo;
    use super::super::selection::{layer_rng, pick_layer_seams};
    use super::super::EnforcedBlockedSeamPoint;
    use super::*;
    use crate::config::SeamPosition;
    use crate::geometry::{Point, Polygon};
    use crate::print::Layer;

    fn stacked_squares(count: usize, shift_per_layer: f64) -> Vec<LayerSeams> {
        let config = SeamPlacerConfig::default();
        let comparator = SeamComparator::new(SeamPosition::Aligned, &config);
        (0..count)
            .map(|i| {
                let o = i as f64 * shift_per_layer;
                let polygon = Polygon::rectangle(
                    Point::new_scale(o, 0.0),
                    Point::new_scale(o + 10.0, 10.0),
                );
                let z = 0.2 * (i + 1) as f64;
                let mut layer = extract_layer(&Layer::new(z, vec![polygon]), &GlobalModelInfo::default(), &config);
                pick_layer_seams(&mut layer, &comparator, &mut layer_rng(0, 0, i));
                layer
            })
            .collect()
    }

    #[test]
    fn test_smoothing_weights_shifted() {
        let w = smoothing_weights(&[1.0, 3.0, 2.0], 0.01);
        assert!((w[1] - 0.01).abs() < 1e-12);
        assert!((w[0] - 2.01).abs() < 1e-12);
        assert!((w[2] - 1.01).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_string_keeps_anchor_and_pulls_outlier() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 3.0),
        ];
        let smoothed = smooth_string(&positions, &[1.0; 4], 1, 4);
        assert_eq!(smoothed[1], positions[1]);
        assert!(smoothed[2].x < 1.0);
        assert!(smoothed[2].x > 0.0);
        assert_eq!(smooth_string(&positions[..1], &[1.0], 0, 4), positions[..1].to_vec());
    }

    #[test]
    fn test_overhanging_seeds_go_last() {
        let mut layers = stacked_squares(3, 0.0);
        let config = SeamPlacerConfig::default();
        let comparator = SeamComparator::new(SeamPosition::Aligned, &config);

        // layer 0 has the lowest penalty but hangs in the air
        let seam0 = layers[0].perimeters[0].seam_index;
        layers[0].candidates[seam0].overhang = 0.5;
        for layer in &mut layers[1..] {
            let seam = layer.perimeters[0].seam_index;
            layer.candidates[seam].visibility = 1.0;
        }
        assert!(
            comparator.get_penalty(&layers[0].candidates[seam0])
                < comparator.get_penalty(&layers[1].candidates[layers[1].perimeters[0].seam_index])
        );

        let order = seed_order(&layers, &comparator);
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], (0, seam0));

        // an enforced seam still leads even when overhanging
        layers[0].candidates[seam0].point_type = EnforcedBlockedSeamPoint::Enforced;
        assert_eq!(seed_order(&layers, &comparator)[0], (0, seam0));
    }

    #[test]
    fn test_stacked_squares_align() {
        let mut layers = stacked_squares(6, 0.0);
        let config = SeamPlacerConfig {
            seam_align_minimum_string_seams: 3,
            ..Default::default()
        };
        let comparator = SeamComparator::new(SeamPosition::Aligned, &config);
        let stats = align_seam_points(&mut layers, &comparator, &config);

        assert_eq!(stats.strings_aligned, 1);
        let first = layers[0].perimeters[0].final_seam_position;
        for layer in &layers {
            let p = &layer.perimeters[0];
            assert!(p.finalized);
            assert!((p.final_seam_position.x - first.x).abs() < 1e-9);
            assert!((p.final_seam_position.y - first.y).abs() < 1e-9);
            assert!((p.final_seam_position.z - layer.slice_z).abs() < 1e-12);
        }
    }

    #[test]
    fn test_short_string_left_alone() {
        let mut layers = stacked_squares(3, 0.0);
        let config = SeamPlacerConfig::default();
        let comparator = SeamComparator::new(SeamPosition::Aligned, &config);
        let stats = align_seam_points(&mut layers, &comparator, &config);

        assert_eq!(stats.strings_aligned, 0);
        assert!(stats.strings_discarded > 0);
        assert!(layers.iter().all(|l| !l.perimeters[0].finalized));
    }

    #[test]
    fn test_far_seams_do_not_chain() {
        // every layer jumps 3mm sideways, beyond the tolerable distance
        let layers = stacked_squares(8, 3.0);
        let config = SeamPlacerConfig::default();
        let comparator = SeamComparator::new(SeamPosition::Aligned, &config);
        let seed = (4, layers[4].perimeters[0].seam_index);
        let string = find_seam_string(&layers, seed, &comparator, &config);
        assert_eq!(string, vec![seed]);
    }

    #[test]
    fn test_skip_budget_bridges_gaps() {
        let mut layers = stacked_squares(8, 0.0);
        let config = SeamPlacerConfig {
            seam_align_tolerable_skips: 4,
            ..Default::default()
        };
        let comparator = SeamComparator::new(SeamPosition::Aligned, &config);

        // layer 2 is already claimed, growth from layer 0 must skip over it
        layers[2].perimeters[0].finalized = true;
        let seed = (0, layers[0].perimeters[0].seam_index);
        let string = find_seam_string(&layers, seed, &comparator, &config);
        assert_eq!(string.len(), 7);
        assert!(string.iter().all(|&(l, _)| l != 2));

        // three claimed layers in a row exhaust a budget of two
        layers[3].perimeters[0].finalized = true;
        layers[4].perimeters[0].finalized = true;
        let string = find_seam_string(&layers, seed, &comparator, &config);
        assert_eq!(string.len(), 2);
    }
}
