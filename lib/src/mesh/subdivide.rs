//! Longest-edge bisection.
//!
//! After decimation, large flat faces would get a single visibility value. Splitting
//! them back down to a bounded edge length keeps visibility spatially detailed.

use std::collections::HashMap;

use super::TriangleMesh;
use crate::CoordF;

/// Split triangles along their longest edge until no edge is longer than
/// `max_edge_length`. Midpoints are shared between neighbours that split the
/// same edge.
pub fn subdivide_to_max_edge(mesh: &TriangleMesh, max_edge_length: CoordF) -> TriangleMesh {
    if !(max_edge_length > 0.0) || mesh.is_empty() {
        return mesh.clone();
    }
    let max_sq = max_edge_length * max_edge_length;

    let mut result = TriangleMesh::from_parts(mesh.vertices().to_vec(), Vec::new());
    let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
    let mut stack: Vec<[u32; 3]> = mesh.indices().iter().rev().map(|t| t.indices).collect();

    while let Some(tri) = stack.pop() {
        let vs = tri.map(|i| result.vertices()[i as usize]);
        let (longest, len_sq) = (0..3)
            .map(|k| (k, (vs[(k + 1) % 3] - vs[k]).length_squared()))
            .fold((0, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if len_sq <= max_sq {
            result.add_triangle_indices(tri[0], tri[1], tri[2]);
            continue;
        }

        let a = tri[longest];
        let b = tri[(longest + 1) % 3];
        let c = tri[(longest + 2) % 3];
        let key = if a < b { (a, b) } else { (b, a) };
        let m = match midpoints.get(&key) {
            Some(&m) => m,
            None => {
                let pos = (vs[longest] + vs[(longest + 1) % 3]) * 0.5;
                let m = result.add_vertex(pos);
                midpoints.insert(key, m);
                m
            }
        };

        // both halves keep the winding of the parent
        stack.push([m, b, c]);
        stack.push([a, m, c]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    fn max_edge(mesh: &TriangleMesh) -> f64 {
        (0..mesh.triangle_count())
            .flat_map(|i| {
                let [a, b, c] = mesh.triangle_vertices(i);
                [(b - a).length(), (c - b).length(), (a - c).length()]
            })
            .fold(0.0, f64::max)
    }

    fn total_area(mesh: &TriangleMesh) -> f64 {
        (0..mesh.triangle_count()).map(|i| mesh.triangle_area(i)).sum()
    }

    #[test]
    fn test_edges_bounded_and_area_preserved() {
        let cube = TriangleMesh::cube(10.0);
        let fine = subdivide_to_max_edge(&cube, 2.0);

        assert!(max_edge(&fine) <= 2.0 + 1e-9);
        assert!(fine.triangle_count() > cube.triangle_count());
        assert!((total_area(&fine) - total_area(&cube)).abs() < 1e-6);
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn test_winding_preserved() {
        let cube = TriangleMesh::cube(4.0);
        let fine = subdivide_to_max_edge(&cube, 1.0);
        for i in 0..fine.triangle_count() {
            let [a, b, c] = fine.triangle_vertices(i);
            let centroid = (a + b + c) * (1.0 / 3.0);
            assert!(fine.triangle_normal(i).dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn test_shared_midpoints() {
        // two triangles sharing the long diagonal of a unit square
        let mut mesh = TriangleMesh::new();
        let a = mesh.add_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Vec3::new(1.0, 1.0, 0.0));
        let d = mesh.add_vertex(Vec3::new(0.0, 1.0, 0.0));
        mesh.add_triangle_indices(a, b, c);
        mesh.add_triangle_indices(a, c, d);

        let split = subdivide_to_max_edge(&mesh, 1.2);
        assert_eq!(split.triangle_count(), 4);
        assert_eq!(split.vertex_count(), 5);
    }

    #[test]
    fn test_non_positive_length_is_noop() {
        let cube = TriangleMesh::cube(1.0);
        assert_eq!(subdivide_to_max_edge(&cube, 0.0).triangle_count(), 12);
        assert_eq!(subdivide_to_max_edge(&cube, f64::NAN).triangle_count(), 12);
    }
}
