//! Image-space projection of a 3D cuboid.

use std::fmt;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use nalgebra::{Matrix3, Point2, Vector2};

use crate::geometry::image_plane::{clip_segment, line_intersection, point_from_homogeneous};
use crate::geometry::BoundingBox;

use super::cuboid::CUBOID_EDGES;

/// Length in pixels of the orientation axes drawn from the centroid.
const AXIS_LENGTH_PX: f64 = 30.0;

const AXIS_COLORS: [Rgb<u8>; 3] = [Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255])];

/// A cuboid as seen from one camera.
///
/// Corner `i` corresponds to corner `i` of [`super::Cuboid3D::corners`], so
/// drawing [`CUBOID_EDGES`] reproduces the box. Consumers must check
/// `valid` before using the corners for geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Cuboid2D {
    /// Rotation from the camera frame to the cuboid's local frame.
    pub rlc: Matrix3<f64>,
    pub corners: [Point2<f64>; 8],
    /// Per-corner frustum visibility (positive depth). No occlusion test.
    pub visible: [bool; 8],
    pub valid: bool,
}

impl Default for Cuboid2D {
    fn default() -> Self {
        Self {
            rlc: Matrix3::identity(),
            corners: [Point2::origin(); 8],
            visible: [true; 8],
            valid: false,
        }
    }
}

impl Cuboid2D {
    pub fn new(rlc: Matrix3<f64>, corners: [Point2<f64>; 8]) -> Self {
        Self {
            rlc,
            corners,
            visible: [true; 8],
            valid: true,
        }
    }

    /// Image of the 3D centroid.
    ///
    /// Perspective projection keeps lines, so the projected body diagonals
    /// 0-6 and 1-7 meet at the projected center. Falls back to the corner
    /// mean when the diagonals are parallel.
    pub fn centroid(&self) -> Point2<f64> {
        let c = &self.corners;
        line_intersection(&c[0], &c[6], &c[1], &c[7]).unwrap_or_else(|| {
            let sum = c.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
            Point2::from(sum / 8.0)
        })
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.corners.iter())
            .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    pub fn edges(&self) -> &'static [(usize, usize); 12] {
        &CUBOID_EDGES
    }

    pub fn all_visible(&self) -> bool {
        self.visible.iter().all(|&v| v)
    }

    /// Overlay the cuboid on `canvas`.
    ///
    /// Edges are drawn only when both endpoints are visible. For a valid
    /// cuboid the three local axes are also drawn from the centroid toward
    /// their vanishing points (`K` maps camera directions to the image).
    pub fn draw(&self, canvas: &mut RgbImage, k: &Matrix3<f64>, edge_color: Rgb<u8>) {
        let (width, height) = canvas.dimensions();

        for &(i, j) in CUBOID_EDGES.iter() {
            if !(self.visible[i] && self.visible[j]) {
                continue;
            }
            if let Some((p, q)) = clip_segment(&self.corners[i], &self.corners[j], width, height) {
                draw_line_segment_mut(
                    canvas,
                    (p.x as f32, p.y as f32),
                    (q.x as f32, q.y as f32),
                    edge_color,
                );
            }
        }

        if !self.valid {
            return;
        }

        let center = self.centroid();
        let r_cl = self.rlc.transpose();
        for (axis, color) in AXIS_COLORS.iter().enumerate() {
            let kd = k * r_cl.column(axis);
            // Image direction of the axis at the centroid: towards the
            // vanishing point when the axis points away from the camera.
            let dir = if kd.z.abs() < 1e-9 {
                Vector2::new(kd.x, kd.y)
            } else {
                (point_from_homogeneous(&kd) - center) * kd.z.signum()
            };
            let norm = dir.norm();
            if norm < 1e-9 {
                continue;
            }
            let tip = center + dir * (AXIS_LENGTH_PX / norm);
            if let Some((p, q)) = clip_segment(&center, &tip, width, height) {
                draw_line_segment_mut(
                    canvas,
                    (p.x as f32, p.y as f32),
                    (q.x as f32, q.y as f32),
                    *color,
                );
            }
        }
    }
}

impl fmt::Display for Cuboid2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.corners.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "({:.2}, {:.2})", c.x, c.y)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::geometry::{CameraModel, SE3};
    use crate::object::cuboid::{Cuboid3D, Dimension3D};

    fn camera() -> CameraModel {
        CameraModel::new(300.0, 300.0, 160.0, 120.0)
    }

    /// Project a cuboid placed in front of an identity camera.
    fn projected(center: nalgebra::Vector3<f64>) -> (Cuboid3D, Cuboid2D) {
        let cuboid = Cuboid3D::new(
            SE3::from_axis_angle(&nalgebra::Vector3::new(0.1, 0.4, -0.2), center),
            Dimension3D::new(0.6, 0.8, 0.5),
        );
        let cam = camera();
        let corners = cuboid.corners().map(|c| cam.project(&c));
        let rlc = cuboid.pose.rotation_matrix().transpose();
        (cuboid, Cuboid2D::new(rlc, corners))
    }

    #[test]
    fn test_default_is_invalid() {
        let c = Cuboid2D::default();
        assert!(!c.valid);
        assert!(c.all_visible());
    }

    #[test]
    fn test_centroid_matches_projected_center() {
        let (cuboid, c2d) = projected(nalgebra::Vector3::new(0.3, -0.2, 4.0));
        let expected = camera().project(&cuboid.centroid());

        assert_relative_eq!(c2d.centroid(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_clone_is_deep() {
        let (_, c2d) = projected(nalgebra::Vector3::new(0.0, 0.0, 3.0));
        let mut copy = c2d.clone();
        copy.rlc[(0, 0)] = 42.0;
        copy.corners[3] = Point2::new(-1.0, -1.0);

        assert_ne!(copy.rlc, c2d.rlc);
        assert_ne!(copy.corners[3], c2d.corners[3]);
    }

    #[test]
    fn test_draw_marks_canvas() {
        let (_, c2d) = projected(nalgebra::Vector3::new(0.0, 0.0, 3.0));
        let mut canvas = RgbImage::new(320, 240);
        let white = Rgb([255, 255, 255]);
        c2d.draw(&mut canvas, &camera().k(), white);

        assert!(canvas.pixels().any(|p| *p == white));
        // Valid cuboid: at least the red axis is drawn as well.
        assert!(canvas.pixels().any(|p| *p == Rgb([255, 0, 0])));
    }

    #[test]
    fn test_draw_skips_invisible_edges() {
        let (_, mut c2d) = projected(nalgebra::Vector3::new(0.0, 0.0, 3.0));
        c2d.visible = [false; 8];
        c2d.valid = false;
        let mut canvas = RgbImage::new(320, 240);
        c2d.draw(&mut canvas, &camera().k(), Rgb([255, 255, 255]));

        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_draw_survives_far_corners() {
        let mut c2d = Cuboid2D::default();
        c2d.corners[0] = Point2::new(1e6, -1e6);
        c2d.corners[1] = Point2::new(-1e6, 1e6);
        let mut canvas = RgbImage::new(64, 48);
        c2d.draw(&mut canvas, &Matrix3::identity(), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_display() {
        let mut c2d = Cuboid2D::default();
        c2d.corners[7] = Point2::new(1.0, 2.5);
        let s = c2d.to_string();

        assert!(s.starts_with("[(0.00, 0.00),"));
        assert!(s.ends_with("(1.00, 2.50)]"));
    }
}
