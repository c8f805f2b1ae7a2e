//! Quadric edge-collapse decimation.
//!
//! Edges are collapsed cheapest-first while the quadric error of the merged
//! vertex stays within a bound. The occlusion model only needs the overall
//! shape, so flat regions collapse aggressively and features survive.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::{Triangle, TriangleMesh};
use crate::geometry::Vec3;
use log::debug;

/// Symmetric 4x4 error matrix, upper triangle stored row by row.
#[derive(Debug, Clone, Copy, Default)]
struct Quadric {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    g: f64,
    h: f64,
    i: f64,
    j: f64,
}

impl Quadric {
    /// Quadric of the plane `n·x + d = 0` with unit normal `n`.
    fn from_plane(n: Vec3, d: f64) -> Self {
        Self {
            a: n.x * n.x,
            b: n.x * n.y,
            c: n.x * n.z,
            d: n.x * d,
            e: n.y * n.y,
            f: n.y * n.z,
            g: n.y * d,
            h: n.z * n.z,
            i: n.z * d,
            j: d * d,
        }
    }

    fn add(&mut self, o: &Self) {
        self.a += o.a;
        self.b += o.b;
        self.c += o.c;
        self.d += o.d;
        self.e += o.e;
        self.f += o.f;
        self.g += o.g;
        self.h += o.h;
        self.i += o.i;
        self.j += o.j;
    }

    /// Sum of squared distances from `p` to the accumulated planes.
    fn evaluate(&self, p: Vec3) -> f64 {
        let (x, y, z) = (p.x, p.y, p.z);
        self.a * x * x
            + 2.0 * self.b * x * y
            + 2.0 * self.c * x * z
            + 2.0 * self.d * x
            + self.e * y * y
            + 2.0 * self.f * y * z
            + 2.0 * self.g * y
            + self.h * z * z
            + 2.0 * self.i * z
            + self.j
    }

    /// Minimiser of the error, or `None` when the system is singular.
    fn optimal_point(&self) -> Option<Vec3> {
        let det = self.a * (self.e * self.h - self.f * self.f)
            - self.b * (self.b * self.h - self.c * self.f)
            + self.c * (self.b * self.f - self.c * self.e);
        if det.abs() < 1e-10 {
            return None;
        }
        let inv = 1.0 / det;

        let m00 = (self.e * self.h - self.f * self.f) * inv;
        let m01 = (self.c * self.f - self.b * self.h) * inv;
        let m02 = (self.b * self.f - self.c * self.e) * inv;
        let m11 = (self.a * self.h - self.c * self.c) * inv;
        let m12 = (self.b * self.c - self.a * self.f) * inv;
        let m22 = (self.a * self.e - self.b * self.b) * inv;

        Some(Vec3::new(
            -(m00 * self.d + m01 * self.g + m02 * self.i),
            -(m01 * self.d + m11 * self.g + m12 * self.i),
            -(m02 * self.d + m12 * self.g + m22 * self.i),
        ))
    }
}

/// Queue entry. Stale once either endpoint's version moved on.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    v1: u32,
    v2: u32,
    version1: u32,
    version2: u32,
    cost: f64,
    target: Vec3,
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on cost
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// Outcome of [`decimate_mesh`].
#[derive(Debug, Clone)]
pub struct DecimateResult {
    pub mesh: TriangleMesh,
    pub original_triangles: usize,
    pub final_triangles: usize,
    pub collapses_performed: usize,
    pub collapses_rejected: usize,
}

struct Decimator {
    positions: Vec<Vec3>,
    alive: Vec<bool>,
    locked: Vec<bool>,
    version: Vec<u32>,
    quadrics: Vec<Quadric>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
}

impl Decimator {
    fn new(mesh: &TriangleMesh) -> Self {
        let n = mesh.vertex_count();
        let faces: Vec<[u32; 3]> = mesh.indices().iter().map(|t| t.indices).collect();

        let mut quadrics = vec![Quadric::default(); n];
        let mut vertex_faces = vec![Vec::new(); n];
        let mut edge_use: HashMap<(u32, u32), u32> = HashMap::new();
        let mut face_alive = vec![true; faces.len()];

        for (fi, face) in faces.iter().enumerate() {
            if Triangle::from(*face).is_degenerate() {
                face_alive[fi] = false;
                continue;
            }
            let [p0, p1, p2] = face.map(|i| mesh.vertices()[i as usize]);
            let normal = (p1 - p0).cross(&(p2 - p0));
            if normal.length() > 1e-12 {
                let unit = normal.normalized();
                let q = Quadric::from_plane(unit, -unit.dot(&p0));
                for &vi in face {
                    quadrics[vi as usize].add(&q);
                }
            }
            for k in 0..3 {
                vertex_faces[face[k] as usize].push(fi);
                *edge_use.entry(edge_key(face[k], face[(k + 1) % 3])).or_default() += 1;
            }
        }

        // open borders and non-manifold edges stay put
        let mut locked = vec![false; n];
        for (&(a, b), &count) in &edge_use {
            if count != 2 {
                locked[a as usize] = true;
                locked[b as usize] = true;
            }
        }

        Self {
            positions: mesh.vertices().to_vec(),
            alive: vec![true; n],
            locked,
            version: vec![0; n],
            quadrics,
            faces,
            face_alive,
            vertex_faces,
        }
    }

    fn collapse_candidate(&self, v1: u32, v2: u32) -> Option<EdgeCollapse> {
        if self.locked[v1 as usize] || self.locked[v2 as usize] {
            return None;
        }
        let mut q = self.quadrics[v1 as usize];
        q.add(&self.quadrics[v2 as usize]);

        let p1 = self.positions[v1 as usize];
        let p2 = self.positions[v2 as usize];
        let target = q
            .optimal_point()
            .filter(|p| p.distance(&p1).min(p.distance(&p2)) <= 2.0 * p1.distance(&p2))
            .unwrap_or((p1 + p2) * 0.5);

        Some(EdgeCollapse {
            v1,
            v2,
            version1: self.version[v1 as usize],
            version2: self.version[v2 as usize],
            cost: q.evaluate(target).max(0.0),
            target,
        })
    }

    fn neighbours(&self, v: u32) -> HashSet<u32> {
        self.vertex_faces[v as usize]
            .iter()
            .filter(|&&fi| self.face_alive[fi])
            .flat_map(|&fi| self.faces[fi])
            .filter(|&u| u != v)
            .collect()
    }

    /// Rejects collapses that pinch the surface or flip a surviving face.
    fn is_collapse_valid(&self, v1: u32, v2: u32, target: Vec3) -> bool {
        let n1 = self.neighbours(v1);
        let n2 = self.neighbours(v2);
        if n1.intersection(&n2).count() > 2 {
            return false;
        }

        for &v in &[v1, v2] {
            for &fi in &self.vertex_faces[v as usize] {
                if !self.face_alive[fi] {
                    continue;
                }
                let face = self.faces[fi];
                if face.contains(&v1) && face.contains(&v2) {
                    continue;
                }
                let before = face.map(|i| self.positions[i as usize]);
                let after = face.map(|i| {
                    if i == v1 || i == v2 {
                        target
                    } else {
                        self.positions[i as usize]
                    }
                });
                let nb = (before[1] - before[0]).cross(&(before[2] - before[0]));
                let na = (after[1] - after[0]).cross(&(after[2] - after[0]));
                if nb.dot(&na) <= 0.0 {
                    return false;
                }
            }
        }
        true
    }

    /// Merge `v2` into `v1`. Returns the number of faces removed.
    fn collapse(&mut self, v1: u32, v2: u32, target: Vec3) -> usize {
        self.positions[v1 as usize] = target;
        let q2 = self.quadrics[v2 as usize];
        self.quadrics[v1 as usize].add(&q2);
        self.alive[v2 as usize] = false;
        self.version[v1 as usize] += 1;
        self.version[v2 as usize] += 1;

        let mut removed = 0;
        let moved = std::mem::take(&mut self.vertex_faces[v2 as usize]);
        for fi in moved {
            if !self.face_alive[fi] {
                continue;
            }
            let face = &mut self.faces[fi];
            for idx in face.iter_mut() {
                if *idx == v2 {
                    *idx = v1;
                }
            }
            if Triangle::from(*face).is_degenerate() {
                self.face_alive[fi] = false;
                removed += 1;
            } else {
                self.vertex_faces[v1 as usize].push(fi);
            }
        }
        removed
    }

    fn into_mesh(self) -> TriangleMesh {
        let indices = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, &alive)| alive)
            .map(|(face, _)| Triangle::from(*face))
            .collect();
        let mut mesh = TriangleMesh::from_parts(self.positions, indices);
        mesh.remove_unused_vertices();
        mesh
    }
}

#[inline]
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Collapse edges until the cheapest remaining collapse exceeds `max_error`
/// (a sum of squared plane distances, mm²).
pub fn decimate_mesh(mesh: &TriangleMesh, max_error: f64) -> DecimateResult {
    let original_triangles = mesh.triangle_count();
    let mut decimator = Decimator::new(mesh);

    let mut heap = BinaryHeap::new();
    let mut seen = HashSet::new();
    for face in &decimator.faces {
        for k in 0..3 {
            let (a, b) = edge_key(face[k], face[(k + 1) % 3]);
            if a != b && seen.insert((a, b)) {
                heap.extend(decimator.collapse_candidate(a, b));
            }
        }
    }

    let mut active = decimator.face_alive.iter().filter(|&&a| a).count();
    let mut collapses_performed = 0;
    let mut collapses_rejected = 0;

    while let Some(candidate) = heap.pop() {
        let (v1, v2) = (candidate.v1, candidate.v2);
        if !decimator.alive[v1 as usize]
            || !decimator.alive[v2 as usize]
            || decimator.version[v1 as usize] != candidate.version1
            || decimator.version[v2 as usize] != candidate.version2
        {
            continue;
        }
        if candidate.cost > max_error {
            break;
        }
        if active <= 4 || !decimator.is_collapse_valid(v1, v2, candidate.target) {
            collapses_rejected += 1;
            continue;
        }

        active -= decimator.collapse(v1, v2, candidate.target);
        collapses_performed += 1;

        for u in decimator.neighbours(v1) {
            heap.extend(decimator.collapse_candidate(v1, u));
        }
    }

    let mesh = decimator.into_mesh();
    debug!(
        "decimated {} -> {} triangles ({} collapses, {} rejected)",
        original_triangles,
        mesh.triangle_count(),
        collapses_performed,
        collapses_rejected
    );

    DecimateResult {
        final_triangles: mesh.triangle_count(),
        mesh,
        original_triangles,
        collapses_performed,
        collapses_rejected,
    }
}
