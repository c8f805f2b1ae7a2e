//! Seam candidate extraction from external perimeter polygons.

use super::occlusion::GlobalModelInfo;
use super::{EnforcedBlockedSeamPoint, LayerSeams, Perimeter, SeamCandidate};
use crate::config::SeamPlacerConfig;
use crate::geometry::{Point, PointF, Polygon, Vec3};
use crate::print::Layer;
use crate::CoordF;

const EPSILON: CoordF = 1e-6;

/// Candidates of one layer with the nearest-point index already built.
pub fn extract_layer(layer: &Layer, global: &GlobalModelInfo, config: &SeamPlacerConfig) -> LayerSeams {
    let mut seams = LayerSeams::new(layer.slice_z);
    for polygon in &layer.perimeters {
        process_perimeter_polygon(polygon, global, config, &mut seams);
    }

    // keeps the layer indexable even when nothing is extruded on it
    if seams.perimeters.is_empty() {
        let placeholder = Polygon::from_points(vec![Point::zero()]);
        process_perimeter_polygon(&placeholder, global, config, &mut seams);
    }

    seams.build_index();
    seams
}

/// Append one perimeter and its candidates to `layer`. Empty polygons are
/// skipped.
pub fn process_perimeter_polygon(
    polygon: &Polygon,
    global: &GlobalModelInfo,
    config: &SeamPlacerConfig,
    layer: &mut LayerSeams,
) {
    if polygon.is_empty() {
        return;
    }

    let mut polygon = polygon.clone();
    let was_flipped = polygon.make_counter_clockwise();
    let points: Vec<PointF> = polygon.points().iter().map(|p| p.to_f64()).collect();
    let n = points.len();

    let lengths: Vec<CoordF> = (0..n)
        .map(|i| points[i].distance(&points[(i + 1) % n]).max(config.minimal_edge_length))
        .collect();

    let mut angles = calculate_polygon_angles_at_vertices(
        &points,
        &lengths,
        config.polygon_local_angles_arm_distance,
    );
    if was_flipped {
        for angle in &mut angles {
            *angle = -*angle;
        }
    }

    let perimeter_index = layer.perimeters.len();
    let start_index = layer.candidates.len();
    let z = layer.slice_z;
    let tolerance = config.enforcer_blocker_distance_tolerance;

    for i in 0..n {
        let position = Vec3::new(points[i].x, points[i].y, z);
        let mut candidate = SeamCandidate::new(position, perimeter_index, angles[i]);
        candidate.point_type = classify(global, &position, tolerance);
        layer.candidates.push(candidate);

        if n < 2 {
            continue;
        }
        let next = points[(i + 1) % n];
        let next_position = Vec3::new(next.x, next.y, z);
        let edge = next_position - position;
        let edge_length = edge.length();
        if edge_length <= config.enforcer_oversampling_distance {
            continue;
        }

        if global.is_enforced(&position, edge_length) || global.is_blocked(&position, edge_length) {
            let direction = edge * (1.0 / edge_length);
            let step = config.enforcer_oversampling_distance;
            let count = (edge_length / step).ceil() as usize;
            for j in 1..count {
                let offset = j as CoordF * step;
                if offset > edge_length - EPSILON {
                    break;
                }
                let inserted = position + direction * offset;
                let mut candidate = SeamCandidate::new(inserted, perimeter_index, 0.0);
                candidate.point_type = classify(global, &inserted, tolerance);
                layer.candidates.push(candidate);
            }
        }
    }

    let end_index = layer.candidates.len() - 1;
    layer
        .perimeters
        .push(Perimeter::new(start_index, end_index, was_flipped));
}

/// Enforcers first, blockers override.
fn classify(global: &GlobalModelInfo, position: &Vec3, tolerance: CoordF) -> EnforcedBlockedSeamPoint {
    let mut point_type = EnforcedBlockedSeamPoint::Neutral;
    if global.is_enforced(position, tolerance) {
        point_type = EnforcedBlockedSeamPoint::Enforced;
    }
    if global.is_blocked(position, tolerance) {
        point_type = EnforcedBlockedSeamPoint::Blocked;
    }
    point_type
}

/// Signed turning angle at every vertex of a counter-clockwise polygon.
///
/// `lengths[i]` is the length of the edge from vertex `i` to vertex `i + 1`.
/// The directions compared at a vertex come from the vertices at least
/// `min_arm_length` away along the polygon on each side, which hides noise
/// from densely sampled curves. Positive angles are convex.
pub fn calculate_polygon_angles_at_vertices(
    points: &[PointF],
    lengths: &[CoordF],
    min_arm_length: CoordF,
) -> Vec<CoordF> {
    let n = points.len();
    let mut result = vec![0.0; n];
    if n < 3 {
        return result;
    }

    let prev_idx = |i: usize| if i == 0 { n - 1 } else { i - 1 };

    let mut idx_prev = n - 1;
    let mut distance_to_prev = lengths[idx_prev];
    while distance_to_prev < min_arm_length {
        idx_prev = prev_idx(idx_prev);
        distance_to_prev += lengths[idx_prev];
    }

    let mut idx_next = 0;
    let mut distance_to_next = 0.0;

    for idx_curr in 0..n {
        // pull the back arm as close as the arm length allows
        while distance_to_prev - lengths[idx_prev] > min_arm_length {
            distance_to_prev -= lengths[idx_prev];
            idx_prev = (idx_prev + 1) % n;
        }

        while distance_to_next < min_arm_length {
            distance_to_next += lengths[idx_next];
            idx_next = (idx_next + 1) % n;
        }

        let v1 = points[idx_curr] - points[idx_prev];
        let v2 = points[idx_next] - points[idx_curr];
        result[idx_curr] = v1.cross(&v2).atan2(v1.dot(&v2));

        let curr_distance = lengths[idx_curr];
        distance_to_prev += curr_distance;
        distance_to_next -= curr_distance;
    }

    result
}
