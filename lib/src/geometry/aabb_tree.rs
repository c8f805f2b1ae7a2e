//! AABB Tree for spatial acceleration of mesh and point queries.
//!
//! The seam placer uses one tree type for three jobs:
//! - ray casting against the decimated object mesh (occlusion)
//! - closest-face and radius queries against the mesh and painted regions
//! - nearest-candidate lookups within a layer ([`IndexedPointSet`])
//!
//! # Algorithm
//!
//! The tree is balanced: at each level the primitives are split at the median
//! of their centroids along the longest axis of the combined bounding box.
//!
//! Storage is implicit: children of node `i` live at `2*i + 1` and `2*i + 2`.
//! There are no child pointers and a built tree is never mutated, so it can be
//! shared freely across rayon tasks.

use crate::CoordF;
use serde::{Deserialize, Serialize};

/// A 3D vector in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: CoordF,
    pub y: CoordF,
    pub z: CoordF,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: CoordF, y: CoordF, z: CoordF) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline]
    pub const fn splat(v: CoordF) -> Self {
        Self::new(v, v, v)
    }

    #[inline]
    pub fn dot(&self, other: &Self) -> CoordF {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    #[inline]
    pub fn length_squared(&self) -> CoordF {
        self.dot(self)
    }

    #[inline]
    pub fn length(&self) -> CoordF {
        self.length_squared().sqrt()
    }

    #[inline]
    pub fn distance(&self, other: &Self) -> CoordF {
        (*self - *other).length()
    }

    /// Unit vector, or `self` unchanged when (nearly) zero.
    #[inline]
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > 1e-10 {
            *self * (1.0 / len)
        } else {
            *self
        }
    }

    #[inline]
    pub fn min(&self, other: &Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    #[inline]
    pub fn max(&self, other: &Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    #[inline]
    pub fn component(&self, axis: usize) -> CoordF {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Same XY, different height.
    #[inline]
    pub fn with_z(&self, z: CoordF) -> Self {
        Self::new(self.x, self.y, z)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Mul<CoordF> for Vec3 {
    type Output = Self;
    #[inline]
    fn mul(self, s: CoordF) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// 3D axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct AABB3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB3 {
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted box; extending it with anything yields that thing's box.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(CoordF::MAX),
            max: Vec3::splat(CoordF::MIN),
        }
    }

    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    #[inline]
    pub fn from_triangle(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> Self {
        Self {
            min: v0.min(v1).min(v2),
            max: v0.max(v1).max(v2),
        }
    }

    #[inline]
    pub fn extend_box(&mut self, other: &AABB3) {
        self.min = self.min.min(&other.min);
        self.max = self.max.max(&other.max);
    }

    #[inline]
    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index of the longest axis (0=X, 1=Y, 2=Z).
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let d = self.diagonal();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    #[inline]
    pub fn contains(&self, p: &Vec3) -> bool {
        (0..3).all(|axis| {
            let v = p.component(axis);
            v >= self.min.component(axis) && v <= self.max.component(axis)
        })
    }

    /// Squared distance from a point to the box; 0 inside.
    #[inline]
    pub fn squared_exterior_distance(&self, p: &Vec3) -> CoordF {
        (0..3)
            .map(|axis| {
                let v = p.component(axis);
                let below = self.min.component(axis) - v;
                let above = v - self.max.component(axis);
                let d = below.max(above).max(0.0);
                d * d
            })
            .sum()
    }

    #[inline]
    pub fn inflate(&mut self, eps: CoordF) {
        self.min = self.min - Vec3::splat(eps);
        self.max = self.max + Vec3::splat(eps);
    }
}

impl Default for AABB3 {
    fn default() -> Self {
        Self::empty()
    }
}

const NPOS: usize = usize::MAX;
const INNER: usize = usize::MAX - 1;

/// A single node in the AABB tree.
#[derive(Debug, Clone)]
pub struct AABBNode {
    /// Primitive index for leaves, `INNER` for internal nodes, `NPOS` for unused slots.
    pub idx: usize,
    pub bbox: AABB3,
}

impl AABBNode {
    #[inline]
    pub fn empty() -> Self {
        Self {
            idx: NPOS,
            bbox: AABB3::empty(),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.idx != NPOS
    }

    #[inline]
    pub fn is_inner(&self) -> bool {
        self.idx == INNER
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_valid() && !self.is_inner()
    }
}

/// Primitive handed to the tree builder.
#[derive(Debug, Clone)]
struct BuildInput {
    idx: usize,
    bbox: AABB3,
    centroid: Vec3,
}

/// Result of a ray intersection test.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub primitive_idx: usize,
    /// Distance along the ray to the hit point.
    pub t: CoordF,
    /// Barycentric coordinates of the hit.
    pub u: CoordF,
    pub v: CoordF,
}

/// Result of a closest point query on an AABB tree.
#[derive(Debug, Clone, Copy)]
pub struct AABBClosestPointResult {
    pub primitive_idx: usize,
    pub point: Vec3,
    pub squared_distance: CoordF,
}

impl AABBClosestPointResult {
    pub fn distance(&self) -> CoordF {
        self.squared_distance.sqrt()
    }
}

/// A balanced, immutable AABB tree over primitive bounding boxes.
#[derive(Debug, Clone, Default)]
pub struct AABBTree {
    nodes: Vec<AABBNode>,
}

impl AABBTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> Option<&AABBNode> {
        self.nodes.get(idx)
    }

    pub fn root(&self) -> Option<&AABBNode> {
        self.nodes.first()
    }

    #[inline]
    pub fn left_child_idx(idx: usize) -> usize {
        idx * 2 + 1
    }

    #[inline]
    pub fn right_child_idx(idx: usize) -> usize {
        idx * 2 + 2
    }

    /// Build the tree over triangles.
    ///
    /// `eps` inflates every triangle box for numerical stability.
    pub fn build_from_triangles(vertices: &[Vec3], triangles: &[[usize; 3]], eps: CoordF) -> Self {
        let input = triangles
            .iter()
            .enumerate()
            .map(|(idx, tri)| {
                let (v0, v1, v2) = (&vertices[tri[0]], &vertices[tri[1]], &vertices[tri[2]]);
                let mut bbox = AABB3::from_triangle(v0, v1, v2);
                if eps > 0.0 {
                    bbox.inflate(eps);
                }
                BuildInput {
                    idx,
                    bbox,
                    centroid: (*v0 + *v1 + *v2) * (1.0 / 3.0),
                }
            })
            .collect();
        Self::build(input)
    }

    /// Build the tree over points. Leaf boxes are degenerate.
    pub fn build_from_points(points: &[Vec3]) -> Self {
        let input = points
            .iter()
            .enumerate()
            .map(|(idx, p)| BuildInput {
                idx,
                bbox: AABB3::from_point(*p),
                centroid: *p,
            })
            .collect();
        Self::build(input)
    }

    fn build(mut input: Vec<BuildInput>) -> Self {
        if input.is_empty() {
            return Self::new();
        }

        let last = input.len() - 1;
        let mut tree = Self {
            nodes: vec![AABBNode::empty(); input.len().next_power_of_two() * 2 - 1],
        };
        tree.build_recursive(&mut input, 0, 0, last);
        tree
    }

    fn build_recursive(
        &mut self,
        input: &mut [BuildInput],
        node_idx: usize,
        left: usize,
        right: usize,
    ) {
        debug_assert!(node_idx < self.nodes.len());
        debug_assert!(left <= right);

        if left == right {
            self.nodes[node_idx].idx = input[left].idx;
            self.nodes[node_idx].bbox = input[left].bbox;
            return;
        }

        let mut bbox = input[left].bbox;
        for item in &input[left + 1..=right] {
            bbox.extend_box(&item.bbox);
        }

        let axis = bbox.longest_axis();
        let center = (left + right) / 2;
        Self::select_median(input, axis, left, right, center);

        self.nodes[node_idx].idx = INNER;
        self.nodes[node_idx].bbox = bbox;

        self.build_recursive(input, Self::left_child_idx(node_idx), left, center);
        self.build_recursive(input, Self::right_child_idx(node_idx), center + 1, right);
    }

    /// Quickselect on centroids: afterwards no element before `k` is greater than
    /// element `k` along `axis`. Equal keys are fine, which matters for point sets
    /// where a whole layer shares Z.
    fn select_median(
        input: &mut [BuildInput],
        axis: usize,
        mut left: usize,
        mut right: usize,
        k: usize,
    ) {
        let key = |input: &[BuildInput], i: usize| input[i].centroid.component(axis);

        while left < right {
            let center = (left + right) / 2;

            // median of three, leaves input[left] <= input[center] <= input[right]
            if key(input, left) > key(input, center) {
                input.swap(left, center);
            }
            if key(input, left) > key(input, right) {
                input.swap(left, right);
            }
            if key(input, center) > key(input, right) {
                input.swap(center, right);
            }

            if right <= left + 2 {
                break;
            }

            let pivot = key(input, center);
            let mut i = left;
            let mut j = right - 1;
            input.swap(center, j);

            loop {
                i += 1;
                while key(input, i) < pivot {
                    i += 1;
                }
                j -= 1;
                while j > i && key(input, j) > pivot {
                    j -= 1;
                }
                if i >= j {
                    break;
                }
                input.swap(i, j);
            }
            input.swap(i, right - 1);

            match k.cmp(&i) {
                std::cmp::Ordering::Less => right = i - 1,
                std::cmp::Ordering::Equal => break,
                std::cmp::Ordering::Greater => left = i + 1,
            }
        }
    }
}

/// Ray-box intersection using the slab method.
///
/// True if the ray enters the box somewhere within `[t0, t1]`.
pub fn ray_box_intersect(
    origin: &Vec3,
    inv_dir: &Vec3,
    bbox: &AABB3,
    t0: CoordF,
    t1: CoordF,
) -> bool {
    let mut tmin = t0;
    let mut tmax = t1;

    for axis in 0..3 {
        let inv = inv_dir.component(axis);
        let o = origin.component(axis);
        let (near, far) = if inv >= 0.0 {
            (bbox.min.component(axis), bbox.max.component(axis))
        } else {
            (bbox.max.component(axis), bbox.min.component(axis))
        };
        let t_near = (near - o) * inv;
        let t_far = (far - o) * inv;

        // NaN (0 * inf) leaves the running bounds untouched
        if t_near > tmin {
            tmin = t_near;
        }
        if t_far < tmax {
            tmax = t_far;
        }
        if tmin > tmax {
            return false;
        }
    }
    true
}

/// Möller–Trumbore ray-triangle intersection.
///
/// Returns `(t, u, v)`: distance along the ray and barycentric coordinates.
pub fn ray_triangle_intersect(
    origin: &Vec3,
    dir: &Vec3,
    v0: &Vec3,
    v1: &Vec3,
    v2: &Vec3,
    eps: CoordF,
) -> Option<(CoordF, CoordF, CoordF)> {
    let edge1 = *v1 - *v0;
    let edge2 = *v2 - *v0;

    let pvec = dir.cross(&edge2);
    let det = edge1.dot(&pvec);
    if det.abs() < eps {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = *origin - *v0;

    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let v = dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&qvec) * inv_det;
    (t > eps).then_some((t, u, v))
}

/// Closest point on triangle `abc` to `p`, by Voronoi region
/// (Ericson, "Real-Time Collision Detection", 5.1.5).
pub fn closest_point_on_triangle(p: &Vec3, a: &Vec3, b: &Vec3, c: &Vec3) -> Vec3 {
    let ab = *b - *a;
    let ac = *c - *a;

    let ap = *p - *a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = *p - *b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return *a + ab * (d1 / (d1 - d3));
    }

    let cp = *p - *c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return *a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return *b + (*c - *b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    *a + ab * (vb * denom) + ac * (vc * denom)
}

/// Triangle soup with an AABB tree.
#[derive(Debug, Clone, Default)]
pub struct IndexedTriangleSet {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[usize; 3]>,
    pub tree: AABBTree,
}

impl IndexedTriangleSet {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[usize; 3]>) -> Self {
        Self::with_epsilon(vertices, triangles, 1e-6)
    }

    pub fn with_epsilon(vertices: Vec<Vec3>, triangles: Vec<[usize; 3]>, eps: CoordF) -> Self {
        let tree = AABBTree::build_from_triangles(&vertices, &triangles, eps);
        Self {
            vertices,
            triangles,
            tree,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle_vertices(&self, idx: usize) -> (&Vec3, &Vec3, &Vec3) {
        let tri = &self.triangles[idx];
        (
            &self.vertices[tri[0]],
            &self.vertices[tri[1]],
            &self.vertices[tri[2]],
        )
    }

    /// Nearest intersection along the ray.
    pub fn ray_cast_first(&self, origin: &Vec3, direction: &Vec3) -> Option<RayHit> {
        if self.tree.is_empty() {
            return None;
        }
        let inv_dir = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let eps = self.ray_epsilon();
        let mut best: Option<RayHit> = None;
        self.ray_cast_recursive(origin, direction, &inv_dir, 0, eps, &mut best, false);
        best
    }

    /// True if the ray hits anything. Stops at the first intersection found.
    pub fn ray_hits_any(&self, origin: &Vec3, direction: &Vec3) -> bool {
        if self.tree.is_empty() {
            return false;
        }
        let inv_dir = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let eps = self.ray_epsilon();
        let mut best: Option<RayHit> = None;
        self.ray_cast_recursive(origin, direction, &inv_dir, 0, eps, &mut best, true);
        best.is_some()
    }

    /// Closest point on the mesh surface, with the face it lies on.
    pub fn closest_point(&self, point: &Vec3) -> Option<AABBClosestPointResult> {
        if self.tree.is_empty() {
            return None;
        }

        let mut result = AABBClosestPointResult {
            primitive_idx: NPOS,
            point: Vec3::zero(),
            squared_distance: CoordF::MAX,
        };
        self.closest_point_recursive(point, 0, &mut result);

        (result.primitive_idx != NPOS).then_some(result)
    }

    /// True if some triangle lies strictly closer than `radius` to `point`.
    pub fn any_triangle_in_radius(&self, point: &Vec3, radius: CoordF) -> bool {
        if self.tree.is_empty() {
            return false;
        }
        self.any_triangle_in_radius_recursive(point, 0, radius * radius)
    }

    /// Intersection epsilon relative to the model size.
    fn ray_epsilon(&self) -> CoordF {
        self.tree
            .root()
            .map(|root| {
                let diag = root.bbox.diagonal();
                let max_dim = diag.x.max(diag.y).max(diag.z);
                if max_dim > 0.0 {
                    1e-6 / (max_dim * max_dim)
                } else {
                    1e-6
                }
            })
            .unwrap_or(1e-6)
    }

    #[allow(clippy::too_many_arguments)]
    fn ray_cast_recursive(
        &self,
        origin: &Vec3,
        dir: &Vec3,
        inv_dir: &Vec3,
        node_idx: usize,
        eps: CoordF,
        best: &mut Option<RayHit>,
        stop_at_first: bool,
    ) {
        if stop_at_first && best.is_some() {
            return;
        }
        let node = match self.tree.node(node_idx) {
            Some(n) if n.is_valid() => n,
            _ => return,
        };
        let max_t = best.map_or(CoordF::MAX, |hit| hit.t);
        if !ray_box_intersect(origin, inv_dir, &node.bbox, 0.0, max_t) {
            return;
        }

        if node.is_leaf() {
            let (v0, v1, v2) = self.triangle_vertices(node.idx);
            if let Some((t, u, v)) = ray_triangle_intersect(origin, dir, v0, v1, v2, eps) {
                if t < max_t {
                    *best = Some(RayHit {
                        primitive_idx: node.idx,
                        t,
                        u,
                        v,
                    });
                }
            }
            return;
        }

        for child in [
            AABBTree::left_child_idx(node_idx),
            AABBTree::right_child_idx(node_idx),
        ] {
            self.ray_cast_recursive(origin, dir, inv_dir, child, eps, best, stop_at_first);
        }
    }

    fn closest_point_recursive(
        &self,
        point: &Vec3,
        node_idx: usize,
        result: &mut AABBClosestPointResult,
    ) {
        let node = match self.tree.node(node_idx) {
            Some(n) if n.is_valid() => n,
            _ => return,
        };

        if node.is_leaf() {
            let (v0, v1, v2) = self.triangle_vertices(node.idx);
            let closest = closest_point_on_triangle(point, v0, v1, v2);
            let sqr_dist = (*point - closest).length_squared();
            if sqr_dist < result.squared_distance {
                *result = AABBClosestPointResult {
                    primitive_idx: node.idx,
                    point: closest,
                    squared_distance: sqr_dist,
                };
            }
            return;
        }

        visit_nearer_first(&self.tree, node_idx, point, |child, box_dist| {
            if box_dist < result.squared_distance {
                self.closest_point_recursive(point, child, result);
            }
        });
    }

    fn any_triangle_in_radius_recursive(
        &self,
        point: &Vec3,
        node_idx: usize,
        radius_sq: CoordF,
    ) -> bool {
        let node = match self.tree.node(node_idx) {
            Some(n) if n.is_valid() => n,
            _ => return false,
        };

        if node.bbox.squared_exterior_distance(point) >= radius_sq {
            return false;
        }

        if node.is_leaf() {
            let (v0, v1, v2) = self.triangle_vertices(node.idx);
            let closest = closest_point_on_triangle(point, v0, v1, v2);
            return (*point - closest).length_squared() < radius_sq;
        }

        self.any_triangle_in_radius_recursive(point, AABBTree::left_child_idx(node_idx), radius_sq)
            || self.any_triangle_in_radius_recursive(
                point,
                AABBTree::right_child_idx(node_idx),
                radius_sq,
            )
    }
}

/// Visit both children of an inner node, closer box first.
fn visit_nearer_first(
    tree: &AABBTree,
    node_idx: usize,
    point: &Vec3,
    mut visit: impl FnMut(usize, CoordF),
) {
    let left = AABBTree::left_child_idx(node_idx);
    let right = AABBTree::right_child_idx(node_idx);
    let box_dist = |idx: usize| {
        tree.node(idx)
            .filter(|n| n.is_valid())
            .map_or(CoordF::MAX, |n| n.bbox.squared_exterior_distance(point))
    };
    let (dl, dr) = (box_dist(left), box_dist(right));

    if dl <= dr {
        visit(left, dl);
        visit(right, dr);
    } else {
        visit(right, dr);
        visit(left, dl);
    }
}

/// Static nearest-neighbour index over a point set.
///
/// The index owns a copy of the positions; whatever the points were taken from
/// can be mutated afterwards without invalidating it.
#[derive(Debug, Clone, Default)]
pub struct IndexedPointSet {
    points: Vec<Vec3>,
    tree: AABBTree,
}

impl IndexedPointSet {
    pub fn new(points: Vec<Vec3>) -> Self {
        let tree = AABBTree::build_from_points(&points);
        Self { points, tree }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, idx: usize) -> Vec3 {
        self.points[idx]
    }

    /// Index of the nearest point and its squared distance. Ties keep whichever
    /// point the traversal reaches first.
    pub fn nearest(&self, query: &Vec3) -> Option<(usize, CoordF)> {
        if self.tree.is_empty() {
            return None;
        }
        let mut best = (NPOS, CoordF::MAX);
        self.nearest_recursive(query, 0, &mut best);
        (best.0 != NPOS).then_some(best)
    }

    fn nearest_recursive(&self, query: &Vec3, node_idx: usize, best: &mut (usize, CoordF)) {
        let node = match self.tree.node(node_idx) {
            Some(n) if n.is_valid() => n,
            _ => return,
        };

        if node.is_leaf() {
            let d = (self.points[node.idx] - *query).length_squared();
            if d < best.1 {
                *best = (node.idx, d);
            }
            return;
        }

        visit_nearer_first(&self.tree, node_idx, query, |child, box_dist| {
            if box_dist < best.1 {
                self.nearest_recursive(query, child, best);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_cube() -> (Vec<Vec3>, Vec<[usize; 3]>) {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ];

        let triangles = vec![
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
        ];

        (vertices, triangles)
    }

    #[test]
    fn test_vec3_cross_and_dot() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert!((a.dot(&b) - 32.0).abs() < 1e-10);
        let cross = a.cross(&b);
        assert!((cross - Vec3::new(-3.0, 6.0, -3.0)).length() < 1e-10);
        assert!((Vec3::new(0.0, 3.0, 4.0).normalized().length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_aabb3_squared_exterior_distance() {
        let bbox = AABB3::new(Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));

        assert!(bbox.squared_exterior_distance(&Vec3::new(0.5, 0.5, 0.5)).abs() < 1e-10);
        assert!((bbox.squared_exterior_distance(&Vec3::new(2.0, 0.5, 0.5)) - 1.0).abs() < 1e-10);
        assert!((bbox.squared_exterior_distance(&Vec3::new(2.0, 2.0, 2.0)) - 3.0).abs() < 1e-10);
        assert!(bbox.contains(&Vec3::new(1.0, 0.0, 0.5)));
    }

    #[test]
    fn test_build_tree() {
        let (vertices, triangles) = make_test_cube();
        let tree = AABBTree::build_from_triangles(&vertices, &triangles, 0.0);

        let root = tree.root().unwrap();
        assert!(root.is_inner());
        assert!(root.bbox.contains(&Vec3::new(0.5, 0.5, 0.5)));
        assert!(AABBTree::build_from_triangles(&vertices, &[], 0.0).is_empty());
    }

    #[test]
    fn test_ray_triangle_intersect() {
        let v0 = Vec3::new(0.0, 0.0, 0.0);
        let v1 = Vec3::new(1.0, 0.0, 0.0);
        let v2 = Vec3::new(0.5, 1.0, 0.0);
        let dir = Vec3::new(0.0, 0.0, -1.0);

        let (t, _, _) =
            ray_triangle_intersect(&Vec3::new(0.5, 0.5, 1.0), &dir, &v0, &v1, &v2, 1e-6).unwrap();
        assert!((t - 1.0).abs() < 1e-6);

        assert!(
            ray_triangle_intersect(&Vec3::new(5.0, 5.0, 1.0), &dir, &v0, &v1, &v2, 1e-6).is_none()
        );
        // pointing away
        assert!(
            ray_triangle_intersect(&Vec3::new(0.5, 0.5, 1.0), &-dir, &v0, &v1, &v2, 1e-6)
                .is_none()
        );
    }

    #[test]
    fn test_ray_box_axis_parallel() {
        let bbox = AABB3::new(Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        let dir = Vec3::new(0.0, 0.0, -1.0);
        let inv_dir = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);

        assert!(ray_box_intersect(
            &Vec3::new(0.5, 0.5, 2.0),
            &inv_dir,
            &bbox,
            0.0,
            CoordF::MAX
        ));
        assert!(!ray_box_intersect(
            &Vec3::new(5.0, 5.0, 2.0),
            &inv_dir,
            &bbox,
            0.0,
            CoordF::MAX
        ));
        // box lies beyond t1
        assert!(!ray_box_intersect(
            &Vec3::new(0.5, 0.5, 2.0),
            &inv_dir,
            &bbox,
            0.0,
            0.5
        ));
    }

    #[test]
    fn test_closest_point_on_triangle() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 1.0, 0.0);

        let face = closest_point_on_triangle(&Vec3::new(0.25, 0.25, 1.0), &a, &b, &c);
        assert!((face - Vec3::new(0.25, 0.25, 0.0)).length() < 1e-9);

        let vertex = closest_point_on_triangle(&Vec3::new(-1.0, -1.0, 0.0), &a, &b, &c);
        assert!((vertex - a).length() < 1e-9);

        let edge = closest_point_on_triangle(&Vec3::new(1.0, 1.0, 0.0), &a, &b, &c);
        assert!((edge - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_ray_cast_first_and_any() {
        let (vertices, triangles) = make_test_cube();
        let mesh = IndexedTriangleSet::new(vertices, triangles);
        let down = Vec3::new(0.0, 0.0, -1.0);

        let hit = mesh.ray_cast_first(&Vec3::new(0.5, 0.5, 2.0), &down).unwrap();
        assert!((hit.t - 1.0).abs() < 1e-5);
        assert!(mesh.ray_hits_any(&Vec3::new(0.5, 0.5, 2.0), &down));

        assert!(mesh.ray_cast_first(&Vec3::new(5.0, 5.0, 2.0), &down).is_none());
        assert!(!mesh.ray_hits_any(&Vec3::new(0.5, 0.5, 2.0), &-down));
    }

    #[test]
    fn test_closest_point_reports_face() {
        let (vertices, triangles) = make_test_cube();
        let mesh = IndexedTriangleSet::new(vertices, triangles);

        let result = mesh.closest_point(&Vec3::new(2.0, 0.5, 0.5)).unwrap();
        assert!((result.distance() - 1.0).abs() < 1e-5);
        // right face is triangles 10 and 11
        assert!(result.primitive_idx == 10 || result.primitive_idx == 11);

        assert!(IndexedTriangleSet::default()
            .closest_point(&Vec3::zero())
            .is_none());
    }

    #[test]
    fn test_any_triangle_in_radius() {
        let (vertices, triangles) = make_test_cube();
        let mesh = IndexedTriangleSet::new(vertices, triangles);

        assert!(mesh.any_triangle_in_radius(&Vec3::new(0.5, 0.5, 1.05), 0.1));
        assert!(!mesh.any_triangle_in_radius(&Vec3::new(10.0, 10.0, 10.0), 1.0));
        assert!(!IndexedTriangleSet::default().any_triangle_in_radius(&Vec3::zero(), 100.0));
    }

    #[test]
    fn test_point_set_nearest_matches_brute_force() {
        // a whole layer at one Z with many shared X values
        let mut points = Vec::new();
        for i in 0..20 {
            for j in 0..7 {
                points.push(Vec3::new((i % 5) as f64, j as f64 * 0.7 + i as f64 * 0.01, 0.2));
            }
        }
        let index = IndexedPointSet::new(points.clone());

        for query in [
            Vec3::new(0.0, 0.0, 0.2),
            Vec3::new(2.3, 3.1, 0.4),
            Vec3::new(-4.0, 10.0, 0.2),
            Vec3::new(4.5, 1.9, 0.0),
        ] {
            let (idx, d) = index.nearest(&query).unwrap();
            let brute = points
                .iter()
                .map(|p| (*p - query).length_squared())
                .fold(CoordF::MAX, CoordF::min);
            assert!((d - brute).abs() < 1e-12);
            assert!(((points[idx] - query).length_squared() - brute).abs() < 1e-12);
        }
    }

    #[test]
    fn test_point_set_edge_cases() {
        assert!(IndexedPointSet::new(Vec::new()).nearest(&Vec3::zero()).is_none());

        let single = IndexedPointSet::new(vec![Vec3::new(1.0, 2.0, 3.0)]);
        assert_eq!(single.nearest(&Vec3::zero()).map(|(i, _)| i), Some(0));

        let same = IndexedPointSet::new(vec![Vec3::splat(1.0); 9]);
        let (idx, d) = same.nearest(&Vec3::splat(1.0)).unwrap();
        assert!(idx < 9);
        assert!(d.abs() < 1e-12);
    }
}
