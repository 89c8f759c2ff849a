//! Atlas module - map data structures.
//!
//! Only a single active [`map::Map`] is kept; there is no multi-map
//! management or place recognition database.

pub mod map;

pub use map::{KeyFrame, KeyFrameId, Landmark, LandmarkId, Map};
