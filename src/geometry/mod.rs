//! Geometry utilities: SE3 transforms, SO3 helpers, pinhole camera, and the
//! image-plane kernel shared by tracking and the cuboid model.

pub mod camera;
pub mod image_plane;
pub mod se3;
pub mod so3;

pub use camera::CameraModel;
pub use image_plane::{
    clip_segment, distance, distance_squared, is_parallel, line_intersection,
    line_intersection_or_sentinel, line_intersection_x, line_intersection_y,
    point_from_homogeneous, BoundingBox,
};
pub use se3::SE3;
