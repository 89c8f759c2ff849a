//! SO(3) helpers: skew matrices, the Rodrigues exponential, and the
//! trace-based rotation angle used for tracking diagnostics.

use nalgebra::{Matrix3, Vector3};

/// Below this angle the exponential uses its second-order expansion.
const SMALL_ANGLE_THRESHOLD: f64 = 1e-8;

/// Constructs the skew-symmetric matrix [v]× such that [v]× u = v × u.
///
/// ```text
/// [v]× = |  0   -v_z   v_y |
///        |  v_z   0   -v_x |
///        | -v_y  v_x    0  |
/// ```
#[inline]
#[rustfmt::skip]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Rotation matrix from an axis-angle vector (Rodrigues' formula).
///
/// ```text
/// R = I + sin θ/θ [φ]× + (1 - cos θ)/θ² [φ]×²
/// ```
pub fn exp_so3(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta_sq = phi.norm_squared();
    let skew_phi = skew(phi);

    if theta_sq < SMALL_ANGLE_THRESHOLD * SMALL_ANGLE_THRESHOLD {
        return Matrix3::identity() + skew_phi + 0.5 * skew_phi * skew_phi;
    }

    let theta = theta_sq.sqrt();
    Matrix3::identity()
        + (theta.sin() / theta) * skew_phi
        + ((1.0 - theta.cos()) / theta_sq) * skew_phi * skew_phi
}

/// Rotation angle `acos((tr R - 1) / 2)`.
///
/// The cosine is clamped to [-1, 1] so round-off on near-identity or
/// near-half-turn rotations never produces NaN.
pub fn rotation_angle(r: &Matrix3<f64>) -> f64 {
    ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Unit};

    #[test]
    fn test_skew_cross_product() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let u = Vector3::new(4.0, 5.0, 6.0);

        assert_relative_eq!(v.cross(&u), skew(&v) * u, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_matches_nalgebra() {
        let phi = Vector3::new(0.3, -0.1, 0.7);
        let expected = Rotation3::from_axis_angle(&Unit::new_normalize(phi), phi.norm());

        assert_relative_eq!(exp_so3(&phi), expected.into_inner(), epsilon = 1e-12);
    }

    #[test]
    fn test_exp_of_zero_is_identity() {
        assert_relative_eq!(exp_so3(&Vector3::zeros()), Matrix3::identity(), epsilon = 1e-15);
    }

    #[test]
    fn test_rotation_angle() {
        let phi = Vector3::new(0.0, 0.2, 0.0);
        assert_relative_eq!(rotation_angle(&exp_so3(&phi)), 0.2, epsilon = 1e-12);
        assert_eq!(rotation_angle(&Matrix3::identity()), 0.0);
    }

    #[test]
    fn test_rotation_angle_tolerates_roundoff() {
        // Trace slightly above 3 from accumulated error.
        let r = Matrix3::identity() * (1.0 + 1e-12);
        assert!(rotation_angle(&r).is_finite());
    }
}
