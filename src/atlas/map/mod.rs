//! Map module - keyframes and cuboid landmarks.
//!
//! This module contains:
//! - [`KeyFrame`] - Reference views with pose and high-gradient depth points
//! - [`Landmark`] - Rigid objects modeled as oriented cuboids
//! - [`Map`] - Owner of keyframes and landmarks
//!
//! Keyframes and landmarks reference each other through [`KeyFrameId`] and
//! [`LandmarkId`]. A landmark records the 2D box center of each keyframe that
//! observes it.
//!
//! # Example
//!
//! ```ignore
//! use rust_cubeslam::atlas::map::Map;
//!
//! let mut map = Map::new();
//! let kf_id = map.create_keyframe(timestamp, pose, k_inv, high_grad);
//! let lm_id = map.create_landmark(&proposal, &bbox, kf_id, class_idx, &config.landmark)?;
//!
//! let projected = map.get_landmark(lm_id).unwrap().project(&t_cw, &k);
//! if projected.valid {
//!     projected.draw(&mut canvas, &k, Rgb([0, 255, 0]));
//! }
//! ```

pub mod keyframe;
pub mod landmark;
pub mod map;
pub mod types;

pub use keyframe::KeyFrame;
pub use landmark::Landmark;
pub use map::Map;
pub use types::{KeyFrameId, LandmarkId};
