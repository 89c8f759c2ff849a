//! Loading RGB-D frames from disk.

pub mod rgbd;

pub use rgbd::{depth_std_from_ratio, load_depth, load_rgb};
