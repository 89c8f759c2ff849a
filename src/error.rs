//! Library error type.
//!
//! Only structural misuse is an error. Numeric degeneracy (points behind
//! the camera, parallel lines, solver running out of time) is reported
//! through validity flags and diagnostics instead.

use thiserror::Error;

use crate::atlas::map::KeyFrameId;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("misaligned high-gradient arrays: {field} has {actual} entries, expected {expected}")]
    MisalignedPoints {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("reference keyframe {0} has no high-gradient points")]
    EmptyPointSet(KeyFrameId),

    #[error("depth map is {depth_width}x{depth_height} but the image is {width}x{height}")]
    DepthSizeMismatch {
        width: u32,
        height: u32,
        depth_width: u32,
        depth_height: u32,
    },

    #[error("cuboid proposal cannot be back-projected: {0}")]
    DegenerateProposal(&'static str),

    #[error("keyframe {0} not found in map")]
    UnknownKeyFrame(KeyFrameId),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
