//! KeyFrame - reference view for tracking and landmark initialization.

use nalgebra::Matrix3;

use crate::geometry::{BoundingBox, SE3};
use crate::tracking::high_gradient::HighGradientPoints;

use super::types::KeyFrameId;

/// A KeyFrame in the map.
///
/// Holds what the photometric tracker and the cuboid initializer read:
/// the pose, the inverse calibration and the high-gradient points with
/// their depths. Landmarks refer back to keyframes by id only.
#[derive(Debug, Clone)]
pub struct KeyFrame {
    pub id: KeyFrameId,

    /// Timestamp in nanoseconds.
    pub timestamp_ns: u64,

    /// Pose: transform from camera to world (T_wc).
    /// To transform a point from camera to world: p_world = pose.transform_point(p_cam)
    pub pose: SE3,

    /// Inverse calibration matrix of the camera that took this frame.
    pub k_inv: Matrix3<f64>,

    pub high_grad: HighGradientPoints,
}

impl KeyFrame {
    pub fn new(
        id: KeyFrameId,
        timestamp_ns: u64,
        pose: SE3,
        k_inv: Matrix3<f64>,
        high_grad: HighGradientPoints,
    ) -> Self {
        Self {
            id,
            timestamp_ns,
            pose,
            k_inv,
            high_grad,
        }
    }

    /// World-to-camera transform (T_cw).
    pub fn pose_cw(&self) -> SE3 {
        self.pose.inverse()
    }

    /// Camera center in world coordinates.
    pub fn camera_center(&self) -> nalgebra::Vector3<f64> {
        self.pose.translation
    }

    /// Median depth of the high-gradient points inside `bbox`.
    pub fn depth_prior(&self, bbox: &BoundingBox, min_samples: usize) -> Option<f64> {
        self.high_grad.median_depth_in(bbox, min_samples)
    }
}
