//! Result of a single photometric pose solve.

use crate::geometry::SE3;
use crate::optimizer::SolverSummary;

/// Camera pose plus the diagnostics callers use to judge the solve.
///
/// The diagnostics are computed after the solve and never influence it.
#[derive(Debug, Clone)]
pub struct PoseEstimate {
    /// World-to-camera pose of the current frame (Tcw).
    pub pose: SE3,
    /// Motion from the reference camera to the current camera.
    pub relative_pose: SE3,
    /// Rotation angle of `relative_pose`, radians.
    pub rotation_angle: f64,
    /// Translation norm of `relative_pose`.
    pub translation_distance: f64,
    /// Fraction of reference points whose nominal projection lands in the
    /// current image.
    pub valid_ratio: f64,
    /// Final robust cost divided by the number of points.
    pub residual_scale: f64,
    pub summary: SolverSummary,
}

impl PoseEstimate {
    /// True when the solver stopped on a tolerance rather than on the
    /// budget or a failure.
    pub fn converged(&self) -> bool {
        self.summary.converged()
    }
}
