//! Direct photometric tracking.
//!
//! The current color frame is aligned against a reference keyframe by
//! minimizing a depth-whitened photometric error over the keyframe's
//! high-gradient points:
//! - [`high_gradient`] - Point selection and storage
//! - [`photometric`] - Residual model
//! - [`pose_estimation`] - The budgeted solve and its diagnostics

pub mod high_gradient;
pub mod photometric;
pub mod pose_estimation;
pub mod result;

pub use high_gradient::{DepthMap, HighGradientPoints};
pub use pose_estimation::estimate_camera_pose;
pub use result::PoseEstimate;
