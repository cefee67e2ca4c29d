//! 3D vectors and affine transforms over `glam`'s double-precision types.
//!
//! Points are column vectors: a transformed point is `M * p`.

use glam::{DMat4, DVec3, DVec4};
use serde::Serialize;

use crate::error::{Result, SceneError};
use crate::express::Express;
use crate::symbols::impl_declarable;

pub type Vector3 = DVec3;

/// Determinants smaller than this make a `matrix` statement singular.
const SINGULAR_EPSILON: f64 = 1.0e-10;

/// Conversions between scene-language values and `DVec3`.
pub trait VectorExt {
    /// The first three slots of `e`.
    fn from_express(e: &Express) -> Self;

    fn to_express(self) -> Express;
}

impl VectorExt for DVec3 {
    fn from_express(e: &Express) -> Self {
        DVec3::new(e.get(0), e.get(1), e.get(2))
    }

    fn to_express(self) -> Express {
        Express::vector(self.x, self.y, self.z)
    }
}

/// An affine transform together with its inverse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    matrix: DMat4,
    inverse: DMat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl_declarable!(Transform => Transform);

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: DMat4::IDENTITY,
            inverse: DMat4::IDENTITY,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == DMat4::IDENTITY
    }

    pub fn translation(v: Vector3) -> Self {
        Self {
            matrix: DMat4::from_translation(v),
            inverse: DMat4::from_translation(-v),
        }
    }

    /// Per-axis scale. Zero components must already have been rejected.
    pub fn scaling(v: Vector3) -> Self {
        Self {
            matrix: DMat4::from_scale(v),
            inverse: DMat4::from_scale(v.recip()),
        }
    }

    /// Rotation by `degrees` about x, then y, then z.
    pub fn rotation(degrees: Vector3) -> Self {
        let r = degrees * (std::f64::consts::PI / 180.0);
        let matrix = DMat4::from_rotation_z(r.z) * DMat4::from_rotation_y(r.y) * DMat4::from_rotation_x(r.x);
        // rotations are orthonormal
        Self {
            matrix,
            inverse: matrix.transpose(),
        }
    }

    /// Rotation by `degrees` about an axis through the origin. A zero axis
    /// leaves points where they are.
    pub fn axis_rotation(axis: Vector3, degrees: f64) -> Self {
        let Some(axis) = axis.try_normalize() else {
            return Self::identity();
        };
        let matrix = DMat4::from_axis_angle(axis, degrees.to_radians());
        Self {
            matrix,
            inverse: matrix.transpose(),
        }
    }

    /// From the twelve values of a `matrix <...>` statement. Each group of
    /// three is where one basis vector goes; the last group is the
    /// translation.
    pub fn from_matrix(values: &[f64; 12]) -> Result<Self> {
        let col = |i: usize, w: f64| DVec4::new(values[i * 3], values[i * 3 + 1], values[i * 3 + 2], w);
        let matrix = DMat4::from_cols(col(0, 0.0), col(1, 0.0), col(2, 0.0), col(3, 1.0));
        if matrix.determinant().abs() < SINGULAR_EPSILON {
            return Err(SceneError::parse("Singular matrix in MInvers."));
        }
        Ok(Self {
            matrix,
            inverse: matrix.inverse(),
        })
    }

    /// `self` followed by `next`.
    pub fn compose(&self, next: &Transform) -> Transform {
        Transform {
            matrix: next.matrix * self.matrix,
            inverse: self.inverse * next.inverse,
        }
    }

    pub fn inverted(&self) -> Transform {
        Transform {
            matrix: self.inverse,
            inverse: self.matrix,
        }
    }

    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        self.matrix.transform_point3(p)
    }

    pub fn inverse_transform_point(&self, p: Vector3) -> Vector3 {
        self.inverse.transform_point3(p)
    }

    /// Directions ignore the translation.
    pub fn transform_direction(&self, d: Vector3) -> Vector3 {
        self.matrix.transform_vector3(d)
    }

    /// Normals transform by the inverse transpose.
    pub fn transform_normal(&self, n: Vector3) -> Vector3 {
        self.inverse.transpose().transform_vector3(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector3, b: Vector3) -> bool {
        (a - b).length() < 1e-10
    }

    #[test]
    fn rotate_about_z_moves_x_to_y() {
        let t = Transform::rotation(Vector3::new(0.0, 0.0, 90.0));
        let p = t.transform_point(Vector3::X);
        assert!(close(p, Vector3::Y), "{p:?}");
    }

    #[test]
    fn rotate_about_y_moves_z_to_x() {
        let t = Transform::rotation(Vector3::new(0.0, 90.0, 0.0));
        let p = t.transform_point(Vector3::Z);
        assert!(close(p, Vector3::X), "{p:?}");
    }

    #[test]
    fn rotations_apply_x_first() {
        // x then z: y goes to z, and z stays put under the z turn
        let t = Transform::rotation(Vector3::new(90.0, 0.0, 90.0));
        let p = t.transform_point(Vector3::Y);
        assert!(close(p, Vector3::Z), "{p:?}");
    }

    #[test]
    fn axis_rotation_matches_euler_rotation() {
        let a = Transform::axis_rotation(Vector3::new(0.0, 0.0, 2.0), 90.0);
        let b = Transform::rotation(Vector3::new(0.0, 0.0, 90.0));
        let p = Vector3::new(0.3, -1.2, 4.0);
        assert!(close(a.transform_point(p), b.transform_point(p)));
    }

    #[test]
    fn zero_axis_rotation_is_identity() {
        assert!(Transform::axis_rotation(Vector3::ZERO, 45.0).is_identity());
    }

    #[test]
    fn compose_and_invert() {
        let t = Transform::translation(Vector3::new(1.0, 2.0, 3.0))
            .compose(&Transform::scaling(Vector3::splat(2.0)));
        let p = Vector3::ONE;
        let q = t.transform_point(p);
        assert!(close(q, Vector3::new(4.0, 6.0, 8.0)));
        assert!(close(t.inverse_transform_point(q), p));
        assert!(close(t.inverted().transform_point(q), p));
    }

    #[test]
    fn matrix_statement_round_trips() {
        let values = [2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 4.0, 1.0, -1.0, 5.0];
        let t = Transform::from_matrix(&values).expect("invertible");
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert!(close(t.transform_point(p), Vector3::new(3.0, 1.0, 17.0)));
        assert!(close(t.inverse_transform_point(t.transform_point(p)), p));
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let values = [0.0; 12];
        let err = Transform::from_matrix(&values).expect_err("singular");
        assert_eq!(err.message(), "Singular matrix in MInvers.");
    }

    #[test]
    fn normals_stay_perpendicular_under_stretch() {
        let t = Transform::scaling(Vector3::new(4.0, 1.0, 1.0));
        let surface = t.transform_direction(Vector3::new(1.0, -1.0, 0.0));
        let n = t.transform_normal(Vector3::new(1.0, 1.0, 0.0));
        assert!(surface.dot(n).abs() < 1e-10);
    }

    #[test]
    fn express_conversion_keeps_three_slots() {
        let v = Vector3::from_express(&Express::vector(1.0, 2.0, 3.0));
        assert_eq!(v, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(v.to_express(), Express::vector(1.0, 2.0, 3.0));
    }
}
