//! Object representation: 3D cuboids and their image projections.

pub mod cuboid;
pub mod cuboid2d;

pub use cuboid::{Cuboid3D, Dimension3D, CORNER_SIGNS, CUBOID_EDGES};
pub use cuboid2d::Cuboid2D;
