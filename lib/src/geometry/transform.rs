//! 3D affine transforms for model volumes and object instances.
//!
//! Volumes are placed into object space by their volume matrix, and objects into
//! world space by their instance matrix. The occlusion mesh is built in world space.

use super::Vec3;
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 3D affine transformation matrix.
///
/// Represented as a 4x4 matrix in homogeneous coordinates.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    /// The 4x4 matrix stored in column-major order.
    pub matrix: [CoordF; 16],
}

impl Transform3D {
    pub fn identity() -> Self {
        Self::scaling(1.0, 1.0, 1.0)
    }

    pub fn translation(tx: CoordF, ty: CoordF, tz: CoordF) -> Self {
        let mut t = Self::identity();
        t.set(0, 3, tx);
        t.set(1, 3, ty);
        t.set(2, 3, tz);
        t
    }

    pub fn scaling(sx: CoordF, sy: CoordF, sz: CoordF) -> Self {
        Self {
            matrix: [
                sx, 0.0, 0.0, 0.0, // Column 0
                0.0, sy, 0.0, 0.0, // Column 1
                0.0, 0.0, sz, 0.0, // Column 2
                0.0, 0.0, 0.0, 1.0, // Column 3
            ],
        }
    }

    /// Rotation around the Z axis (angle in radians).
    pub fn rotation_z(angle: CoordF) -> Self {
        let (sin_a, cos_a) = angle.sin_cos();
        Self {
            matrix: [
                cos_a, sin_a, 0.0, 0.0, // Column 0
                -sin_a, cos_a, 0.0, 0.0, // Column 1
                0.0, 0.0, 1.0, 0.0, // Column 2
                0.0, 0.0, 0.0, 1.0, // Column 3
            ],
        }
    }

    /// Rotation around the X axis (angle in radians).
    pub fn rotation_x(angle: CoordF) -> Self {
        let (sin_a, cos_a) = angle.sin_cos();
        Self {
            matrix: [
                1.0, 0.0, 0.0, 0.0, // Column 0
                0.0, cos_a, sin_a, 0.0, // Column 1
                0.0, -sin_a, cos_a, 0.0, // Column 2
                0.0, 0.0, 0.0, 1.0, // Column 3
            ],
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> CoordF {
        self.matrix[col * 4 + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: CoordF) {
        self.matrix[col * 4 + row] = value;
    }

    /// Compose transformations: the result applies `self` first, then `other`.
    pub fn then(&self, other: &Transform3D) -> Self {
        let mut result = Self::identity();
        for i in 0..4 {
            for j in 0..4 {
                let sum = (0..4).map(|k| other.get(i, k) * self.get(k, j)).sum();
                result.set(i, j, sum);
            }
        }
        result
    }

    /// Transform a position.
    pub fn apply(&self, p: Vec3) -> Vec3 {
        let row = |i: usize| {
            self.get(i, 0) * p.x + self.get(i, 1) * p.y + self.get(i, 2) * p.z + self.get(i, 3)
        };
        let (x, y, z, w) = (row(0), row(1), row(2), row(3));

        if w.abs() > 1e-10 {
            Vec3::new(x / w, y / w, z / w)
        } else {
            Vec3::new(x, y, z)
        }
    }

    /// Transform a direction (linear part only, no translation).
    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        let row = |i: usize| self.get(i, 0) * v.x + self.get(i, 1) * v.y + self.get(i, 2) * v.z;
        Vec3::new(row(0), row(1), row(2))
    }

    pub fn is_identity(&self, epsilon: CoordF) -> bool {
        (0..4).all(|i| {
            (0..4).all(|j| {
                let expected = if i == j { 1.0 } else { 0.0 };
                (self.get(i, j) - expected).abs() <= epsilon
            })
        })
    }

    /// Determinant of the 3x3 rotation/scale part.
    pub fn determinant_3x3(&self) -> CoordF {
        self.get(0, 0) * (self.get(1, 1) * self.get(2, 2) - self.get(1, 2) * self.get(2, 1))
            - self.get(0, 1) * (self.get(1, 0) * self.get(2, 2) - self.get(1, 2) * self.get(2, 0))
            + self.get(0, 2) * (self.get(1, 0) * self.get(2, 1) - self.get(1, 1) * self.get(2, 0))
    }

    /// A mirroring transform flips triangle winding.
    #[inline]
    pub fn has_reflection(&self) -> bool {
        self.determinant_3x3() < 0.0
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Transform3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform3D(")?;
        for i in 0..4 {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(
                f,
                "[{:.4}, {:.4}, {:.4}, {:.4}]",
                self.get(i, 0),
                self.get(i, 1),
                self.get(i, 2),
                self.get(i, 3)
            )?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: CoordF = 1e-10;

    fn approx_eq(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    #[test]
    fn test_identity() {
        assert!(Transform3D::identity().is_identity(EPSILON));
        assert!(!Transform3D::translation(0.0, 0.0, 1.0).is_identity(EPSILON));
    }

    #[test]
    fn test_translation_moves_points_not_vectors() {
        let t = Transform3D::translation(10.0, 20.0, 30.0);
        let p = Vec3::new(5.0, 5.0, 5.0);
        assert!(approx_eq(t.apply(p), Vec3::new(15.0, 25.0, 35.0)));
        assert!(approx_eq(t.apply_vector(p), p));
    }

    #[test]
    fn test_rotation_z() {
        let t = Transform3D::rotation_z(std::f64::consts::FRAC_PI_2);
        let result = t.apply(Vec3::new(1.0, 0.0, 0.0));
        assert!(approx_eq(result, Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_rotation_x_tilts_up_vector() {
        let t = Transform3D::rotation_x(std::f64::consts::FRAC_PI_2);
        let result = t.apply_vector(Vec3::new(0.0, 0.0, 1.0));
        assert!(approx_eq(result, Vec3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn test_compose_order() {
        let volume = Transform3D::translation(10.0, 0.0, 0.0);
        let instance = Transform3D::scaling(2.0, 2.0, 2.0);
        let composed = volume.then(&instance);

        // translate to (15, 5, 5), then scale
        let result = composed.apply(Vec3::new(5.0, 5.0, 5.0));
        assert!(approx_eq(result, Vec3::new(30.0, 10.0, 10.0)));
    }

    #[test]
    fn test_reflection() {
        assert!(Transform3D::scaling(-1.0, 1.0, 1.0).has_reflection());
        assert!(!Transform3D::scaling(2.0, 3.0, 4.0).has_reflection());
        assert!((Transform3D::scaling(2.0, 3.0, 4.0).determinant_3x3() - 24.0).abs() < EPSILON);
    }
}
