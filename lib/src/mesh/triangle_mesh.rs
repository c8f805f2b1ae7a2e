//! Triangle mesh data structure.
//!
//! An indexed triangle set in millimetres. Model volumes, painted seam regions
//! and the occlusion mesh all use it.

use crate::geometry::{IndexedTriangleSet, Transform3D, Vec3};
use crate::{CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single triangle defined by three vertex indices.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [u32; 3],
}

impl Triangle {
    #[inline]
    pub const fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self {
            indices: [v0, v1, v2],
        }
    }

    /// True if two corners share a vertex.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.indices[0] == self.indices[1]
            || self.indices[1] == self.indices[2]
            || self.indices[2] == self.indices[0]
    }
}

impl fmt::Debug for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Triangle({}, {}, {})",
            self.indices[0], self.indices[1], self.indices[2]
        )
    }
}

impl From<[u32; 3]> for Triangle {
    #[inline]
    fn from(indices: [u32; 3]) -> Self {
        Self { indices }
    }
}

/// A 3D triangle mesh represented as an indexed triangle set.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    vertices: Vec<Vec3>,
    indices: Vec<Triangle>,
}

impl TriangleMesh {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(vertices: Vec<Vec3>, indices: Vec<Triangle>) -> Self {
        Self { vertices, indices }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[Triangle] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, v: Vec3) -> u32 {
        let idx = self.vertices.len() as u32;
        self.vertices.push(v);
        idx
    }

    pub fn add_triangle_indices(&mut self, v0: u32, v1: u32, v2: u32) {
        self.indices.push(Triangle::new(v0, v1, v2));
    }

    #[inline]
    pub fn triangle_vertices(&self, tri_idx: usize) -> [Vec3; 3] {
        let tri = &self.indices[tri_idx];
        [
            self.vertices[tri.indices[0] as usize],
            self.vertices[tri.indices[1] as usize],
            self.vertices[tri.indices[2] as usize],
        ]
    }

    /// Unit normal from the counter-clockwise winding. Zero for degenerate faces.
    pub fn triangle_normal(&self, tri_idx: usize) -> Vec3 {
        let [v0, v1, v2] = self.triangle_vertices(tri_idx);
        (v1 - v0).cross(&(v2 - v0)).normalized()
    }

    pub fn triangle_area(&self, tri_idx: usize) -> CoordF {
        let [v0, v1, v2] = self.triangle_vertices(tri_idx);
        (v1 - v0).cross(&(v2 - v0)).length() / 2.0
    }

    /// Append another mesh, offsetting its indices.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|tri| {
            Triangle::new(
                tri.indices[0] + offset,
                tri.indices[1] + offset,
                tri.indices[2] + offset,
            )
        }));
    }

    /// Apply a transform in place. Mirroring transforms get their winding
    /// restored so normals keep pointing outward.
    pub fn transform(&mut self, trafo: &Transform3D) {
        for v in &mut self.vertices {
            *v = trafo.apply(*v);
        }
        if trafo.has_reflection() {
            for tri in &mut self.indices {
                tri.indices.swap(1, 2);
            }
        }
    }

    pub fn transformed(&self, trafo: &Transform3D) -> Self {
        let mut mesh = self.clone();
        mesh.transform(trafo);
        mesh
    }

    pub fn remove_degenerate_triangles(&mut self) {
        self.indices.retain(|tri| !tri.is_degenerate());
    }

    /// Drop vertices no triangle references and compact the index space.
    pub fn remove_unused_vertices(&mut self) {
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut new_vertices = Vec::new();
        for tri in &mut self.indices {
            for idx in &mut tri.indices {
                let old = *idx as usize;
                if remap[old] == u32::MAX {
                    remap[old] = new_vertices.len() as u32;
                    new_vertices.push(self.vertices[old]);
                }
                *idx = remap[old];
            }
        }
        self.vertices = new_vertices;
    }

    /// Check that every triangle references existing vertices.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len() as u32;
        for (i, tri) in self.indices.iter().enumerate() {
            if let Some(&idx) = tri.indices.iter().find(|&&idx| idx >= vertex_count) {
                return Err(Error::Mesh(format!(
                    "Triangle {} has invalid vertex index {} (only {} vertices)",
                    i, idx, vertex_count
                )));
            }
        }
        Ok(())
    }

    /// Build a ray-castable triangle set with its AABB tree.
    pub fn to_indexed_triangle_set(&self) -> IndexedTriangleSet {
        let triangles = self
            .indices
            .iter()
            .map(|tri| tri.indices.map(|i| i as usize))
            .collect();
        IndexedTriangleSet::new(self.vertices.clone(), triangles)
    }

    /// Axis-aligned cube centered at the origin.
    pub fn cube(size: CoordF) -> Self {
        let h = size / 2.0;
        let vertices = vec![
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ];

        let indices = [
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ]
        .into_iter()
        .map(Triangle::from)
        .collect();

        Self::from_parts(vertices, indices)
    }

    /// Closed prism approximating a cylinder standing on Z=0.
    pub fn cylinder(radius: CoordF, height: CoordF, segments: usize) -> Self {
        let segments = segments.max(3);
        let mut mesh = Self::new();
        let bottom_center = mesh.add_vertex(Vec3::new(0.0, 0.0, 0.0));
        let top_center = mesh.add_vertex(Vec3::new(0.0, 0.0, height));

        for i in 0..segments {
            let angle = 2.0 * std::f64::consts::PI * i as CoordF / segments as CoordF;
            let (s, c) = angle.sin_cos();
            mesh.add_vertex(Vec3::new(radius * c, radius * s, 0.0));
            mesh.add_vertex(Vec3::new(radius * c, radius * s, height));
        }

        for i in 0..segments as u32 {
            let j = (i + 1) % segments as u32;
            let (b0, t0, b1, t1) = (2 + 2 * i, 3 + 2 * i, 2 + 2 * j, 3 + 2 * j);
            mesh.add_triangle_indices(bottom_center, b1, b0);
            mesh.add_triangle_indices(top_center, t0, t1);
            mesh.add_triangle_indices(b0, b1, t1);
            mesh.add_triangle_indices(b0, t1, t0);
        }
        mesh
    }
}

impl fmt::Debug for TriangleMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TriangleMesh({} vertices, {} triangles)",
            self.vertices.len(),
            self.indices.len()
        )
    }
}
