pub mod atlas;
pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod object;
pub mod optimizer;
pub mod tracking;

pub use error::{Result, TrackingError};
