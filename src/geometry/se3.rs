//! SE(3) rigid-body transform.
//!
//! Naming follows `T_target_source`: `t_cw` maps world points into the
//! camera frame, `t_lw` maps world points into a landmark's local frame.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

use super::so3::{exp_so3, rotation_angle};

/// Rigid transform stored as a unit quaternion and a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Build from a rotation matrix and translation.
    ///
    /// The matrix is re-orthonormalized through the quaternion, so slightly
    /// non-orthogonal input is tolerated.
    pub fn from_rt(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&rotation));
        Self {
            rotation,
            translation,
        }
    }

    pub fn from_quaternion(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build from an axis-angle (Rodrigues) vector and translation.
    pub fn from_axis_angle(axis_angle: &Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self::from_rt(exp_so3(axis_angle), translation)
    }

    /// Build from a homogeneous 4x4 matrix. The bottom row is ignored.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let rotation: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let translation: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
        Self::from_rt(rotation, translation)
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        let translation = -(rotation * self.translation);
        Self {
            rotation,
            translation,
        }
    }

    /// `self * other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Rotation angle in radians, from the matrix trace.
    pub fn angle(&self) -> f64 {
        rotation_angle(&self.rotation_matrix())
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for SE3 {
    type Output = SE3;

    fn mul(self, rhs: SE3) -> SE3 {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_pose() -> SE3 {
        SE3::from_quaternion(
            UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
            Vector3::new(1.0, -2.0, 0.5),
        )
    }

    #[test]
    fn test_inverse_composes_to_identity() {
        let pose = sample_pose();
        let id = pose.compose(&pose.inverse());

        assert_relative_eq!(id.to_matrix(), Matrix4::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_roundtrip() {
        let pose = sample_pose();
        let recovered = SE3::from_matrix(&pose.to_matrix());

        assert_relative_eq!(recovered.to_matrix(), pose.to_matrix(), epsilon = 1e-12);
    }

    #[test]
    fn test_transform_point_matches_matrix() {
        let pose = sample_pose();
        let p = Vector3::new(0.3, 0.4, 5.0);
        let m = pose.to_matrix();
        let expected = (m * p.push(1.0)).xyz();

        assert_relative_eq!(pose.transform_point(&p), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_axis_angle_constructor() {
        let pose = SE3::from_axis_angle(&Vector3::new(0.0, 0.0, 0.25), Vector3::zeros());

        assert_relative_eq!(pose.angle(), 0.25, epsilon = 1e-12);
    }
}
