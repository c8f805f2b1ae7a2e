//! Visibility and overhang attributes of seam candidates.

use super::occlusion::GlobalModelInfo;
use super::{LayerSeams, SeamCandidate};
use crate::geometry::Vec3;
use crate::CoordF;

const EPSILON: CoordF = 1e-6;

pub fn compute_layer_visibility(layer: &mut LayerSeams, global: &GlobalModelInfo) {
    for candidate in &mut layer.candidates {
        candidate.visibility = global.calculate_point_visibility(&candidate.position);
    }
}

/// Overhang of every candidate of `layer` against the layer printed below it,
/// in candidate order.
pub fn compute_layer_overhangs(below: &LayerSeams, layer: &LayerSeams) -> Vec<CoordF> {
    layer
        .candidates
        .iter()
        .map(|candidate| {
            let projected = candidate.position.with_z(below.slice_z);
            below
                .nearest_candidate(&projected)
                .map(|supporter| calculate_overhang(candidate, below, supporter))
                .unwrap_or(0.0)
        })
        .collect()
}

/// Signed XY distance of `p` from the line through `a` and `b`, positive on
/// the left.
fn oriented_line_dist(a: &Vec3, b: &Vec3, p: &Vec3) -> CoordF {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let (apx, apy) = (p.x - a.x, p.y - a.y);
    let length = (abx * abx + aby * aby).sqrt().max(EPSILON);
    (abx * apy - aby * apx) / length
}

/// Approximate overhang of `point` over the candidate `supporter_idx` of the
/// layer below. Negative values mean the point is supported.
///
/// Edge distances are signed positive on the material side: left of the
/// stored edges, or right of them for loops that were re-wound. A convex or
/// straight supporter holds the point if it is inside both edge half-planes,
/// a concave one if it is inside either.
pub fn calculate_overhang(point: &SeamCandidate, below: &LayerSeams, supporter_idx: usize) -> CoordF {
    let supporter = &below.candidates[supporter_idx];
    let perimeter = &below.perimeters[supporter.perimeter_index];
    let prev_idx = if supporter_idx == perimeter.start_index {
        perimeter.end_index
    } else {
        supporter_idx - 1
    };
    let next_idx = if supporter_idx == perimeter.end_index {
        perimeter.start_index
    } else {
        supporter_idx + 1
    };

    let a = &below.candidates[prev_idx].position;
    let b = &supporter.position;
    let c = &below.candidates[next_idx].position;
    let side = if perimeter.flipped { -1.0 } else { 1.0 };
    let dist_ab = side * oriented_line_dist(a, b, &point.position);
    let dist_bc = side * oriented_line_dist(b, c, &point.position);

    let planar = ((point.position.x - b.x).powi(2) + (point.position.y - b.y).powi(2)).sqrt();
    let magnitude = (planar + dist_ab.abs() + dist_bc.abs()) / 3.0;

    let supported = if supporter.local_ccw_angle < 0.0 {
        dist_ab > 0.0 || dist_bc > 0.0
    } else {
        dist_ab > 0.0 && dist_bc > 0.0
    };

    if supported {
        -magnitude
    } else {
        magnitude
    }
}
