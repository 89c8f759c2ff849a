//! Pinhole camera intrinsics.

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

use super::image_plane::point_from_homogeneous;

/// Undistorted pinhole model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraModel {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Read intrinsics back out of a calibration matrix.
    pub fn from_k(k: &Matrix3<f64>) -> Self {
        Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])
    }

    /// Calibration matrix `K`.
    #[rustfmt::skip]
    pub fn k(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx,
            0.0, self.fy, self.cy,
            0.0, 0.0, 1.0,
        )
    }

    /// Closed-form `K⁻¹`.
    #[rustfmt::skip]
    pub fn k_inv(&self) -> Matrix3<f64> {
        Matrix3::new(
            1.0 / self.fx, 0.0, -self.cx / self.fx,
            0.0, 1.0 / self.fy, -self.cy / self.fy,
            0.0, 0.0, 1.0,
        )
    }

    /// Project a camera-frame point, guarded against near-zero depth.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Point2<f64> {
        point_from_homogeneous(&(self.k() * p_cam))
    }

    /// Back-project a pixel to the camera-frame point at the given depth.
    pub fn unproject(&self, pixel: &Point2<f64>, depth: f64) -> Vector3<f64> {
        depth * (self.k_inv() * Vector3::new(pixel.x, pixel.y, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_k_inverse() {
        let cam = CameraModel::new(458.0, 457.0, 367.0, 248.0);
        assert_relative_eq!(cam.k() * cam.k_inv(), Matrix3::identity(), epsilon = 1e-12);
        assert_eq!(CameraModel::from_k(&cam.k()), cam);
    }

    #[test]
    fn test_project_unproject() {
        let cam = CameraModel::new(300.0, 300.0, 320.0, 240.0);
        let pixel = Point2::new(100.0, 400.0);
        let p = cam.unproject(&pixel, 2.5);

        assert_relative_eq!(p.z, 2.5, epsilon = 1e-12);
        assert_relative_eq!(cam.project(&p), pixel, epsilon = 1e-9);
    }
}
