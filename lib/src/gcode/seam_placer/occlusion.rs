//! Global occlusion model of one print object.
//!
//! Visibility of a surface patch is estimated by shooting rays over the outer
//! hemisphere of each face of a simplified world-space copy of the object and
//! counting how many of them escape. Painted enforcer and blocker regions are
//! kept as separate triangle sets for radius queries.

use log::debug;
use rayon::prelude::*;

use crate::config::SeamPlacerConfig;
use crate::geometry::{IndexedTriangleSet, Vec3};
use crate::mesh::{decimate_mesh, subdivide_to_max_edge, TriangleMesh};
use crate::print::PrintObject;
use crate::CoordF;

/// Init-time model shared read-only by the per-layer stages.
#[derive(Debug, Default)]
pub struct GlobalModelInfo {
    mesh: IndexedTriangleSet,
    visibility: Vec<CoordF>,
    enforcers: IndexedTriangleSet,
    blockers: IndexedTriangleSet,
}

impl GlobalModelInfo {
    /// Model with painted regions only. Visibility queries return 0 until
    /// [`GlobalModelInfo::compute_visibility`] has run.
    pub fn with_painted_regions(object: &PrintObject) -> Self {
        let (enforcers, blockers) = object.painted_seam_meshes();
        Self {
            enforcers: enforcers.to_indexed_triangle_set(),
            blockers: blockers.to_indexed_triangle_set(),
            ..Default::default()
        }
    }

    /// Build the raycasting mesh of `object` and score every face.
    pub fn compute_visibility(&mut self, object: &PrintObject, config: &SeamPlacerConfig) {
        let mesh = raycasting_mesh(object, config);
        self.mesh = mesh.to_indexed_triangle_set();
        let directions = sample_hemisphere_directions(config.sqr_rays_per_sample_point);
        self.visibility = raycast_visibility(&self.mesh, &directions, config.raycasting_origin_offset);
        debug!(
            "Occlusion model of '{}': {} faces, {} rays per face",
            object.name(),
            self.mesh.triangle_count(),
            directions.len()
        );
    }

    pub fn face_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    /// Visibility of the face closest to `position`, or 0 without a model.
    pub fn calculate_point_visibility(&self, position: &Vec3) -> CoordF {
        self.mesh
            .closest_point(position)
            .and_then(|hit| self.visibility.get(hit.primitive_idx).copied())
            .unwrap_or(0.0)
    }

    pub fn is_enforced(&self, position: &Vec3, radius: CoordF) -> bool {
        if self.enforcers.is_empty() {
            return false;
        }
        self.enforcers.any_triangle_in_radius(position, radius)
    }

    pub fn is_blocked(&self, position: &Vec3, radius: CoordF) -> bool {
        if self.blockers.is_empty() {
            return false;
        }
        self.blockers.any_triangle_in_radius(position, radius)
    }
}

/// Merged model parts, simplified, re-subdivided and moved to world space.
pub fn raycasting_mesh(object: &PrintObject, config: &SeamPlacerConfig) -> TriangleMesh {
    let mut merged = object.model_parts_mesh();
    merged.remove_degenerate_triangles();
    if merged.is_empty() {
        return merged;
    }

    let decimated = decimate_mesh(&merged, config.raycasting_decimation_target_error);
    let mut mesh = subdivide_to_max_edge(&decimated.mesh, config.raycasting_subdivision_target_length);
    mesh.transform(object.instance_trafo());
    mesh.remove_degenerate_triangles();
    mesh
}

/// `n * n` stratified directions over the +Z hemisphere.
pub fn sample_hemisphere_directions(n: usize) -> Vec<Vec3> {
    let step = 1.0 / n as CoordF;
    let mut directions = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let u = (i as CoordF + 0.5) * step;
            let v = (j as CoordF + 0.5) * step;
            let term = 2.0 * (v - v * v).sqrt();
            let phi = 2.0 * std::f64::consts::PI * u;
            directions.push(Vec3::new(
                phi.cos() * term,
                phi.sin() * term,
                (1.0 - 2.0 * v).abs(),
            ));
        }
    }
    directions
}

/// Orthonormal frame `(x, y, z)` with `z` along `normal`.
pub fn local_frame(normal: &Vec3) -> (Vec3, Vec3, Vec3) {
    let z = *normal;
    let tmp_x = if z.x.abs() > 0.99 {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    let y = z.cross(&tmp_x).normalized();
    let x = y.cross(&z);
    (x, y, z)
}

/// Fraction of rays escaping from each face of `mesh`.
pub fn raycast_visibility(
    mesh: &IndexedTriangleSet,
    directions: &[Vec3],
    origin_offset: CoordF,
) -> Vec<CoordF> {
    if directions.is_empty() {
        return vec![1.0; mesh.triangle_count()];
    }
    let decrease = 1.0 / directions.len() as CoordF;

    (0..mesh.triangle_count())
        .into_par_iter()
        .map(|face| {
            let (a, b, c) = mesh.triangle_vertices(face);
            let cross = (*b - *a).cross(&(*c - *a));
            if cross.length_squared() < 1e-20 {
                return 1.0;
            }
            let normal = cross.normalized();
            let centroid = (*a + *b + *c) * (1.0 / 3.0);
            let origin = centroid + normal * origin_offset;
            let (x, y, z) = local_frame(&normal);

            let mut visibility = 1.0;
            for d in directions {
                let direction = x * d.x + y * d.y + z * d.z;
                if mesh.ray_hits_any(&origin, &direction) {
                    visibility -= decrease;
                }
            }
            visibility
        })
        .collect()
}
