//! High-gradient points of a reference keyframe.
//!
//! The estimator tracks a fixed budget of strong-gradient pixels with known
//! depth. They are stored as parallel arrays aligned by index.

use image::imageops::grayscale;
use image::{ImageBuffer, Luma, RgbImage};
use imageproc::gradients::sobel_gradients;
use nalgebra::{Point2, Vector3};
use tracing::debug;

use crate::error::{Result, TrackingError};
use crate::geometry::BoundingBox;

/// Per-pixel metric depth (or its standard deviation), same size as the
/// color image it belongs to.
pub type DepthMap = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighGradientPoints {
    depth: Vec<f64>,
    depth_std: Vec<f64>,
    /// Pixel coordinates as `(u, v, 1)`.
    homo: Vec<Vector3<f64>>,
    color: Vec<[u8; 3]>,
}

impl HighGradientPoints {
    /// Build from already aligned arrays. Fails if the lengths disagree.
    pub fn new(
        depth: Vec<f64>,
        depth_std: Vec<f64>,
        homo: Vec<Vector3<f64>>,
        color: Vec<[u8; 3]>,
    ) -> Result<Self> {
        let expected = depth.len();
        for (field, actual) in [
            ("depth_std", depth_std.len()),
            ("homo", homo.len()),
            ("color", color.len()),
        ] {
            if actual != expected {
                return Err(TrackingError::MisalignedPoints {
                    field,
                    expected,
                    actual,
                });
            }
        }

        Ok(Self {
            depth,
            depth_std,
            homo,
            color,
        })
    }

    /// Select the `num_points` pixels with the strongest Sobel response that
    /// have a valid depth. Border pixels are skipped. Ties are broken in
    /// raster order so the selection is deterministic.
    pub fn select(
        image: &RgbImage,
        depth: &DepthMap,
        depth_std: &DepthMap,
        num_points: usize,
    ) -> Result<Self> {
        let (width, height) = image.dimensions();
        for map in [depth, depth_std] {
            if map.dimensions() != (width, height) {
                return Err(TrackingError::DepthSizeMismatch {
                    width,
                    height,
                    depth_width: map.width(),
                    depth_height: map.height(),
                });
            }
        }

        let gradients = sobel_gradients(&grayscale(image));

        let mut candidates: Vec<(u16, u32, u32)> = Vec::new();
        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let d = depth.get_pixel(x, y)[0];
                let s = depth_std.get_pixel(x, y)[0];
                if !(d.is_finite() && d > 0.0 && s.is_finite() && s >= 0.0) {
                    continue;
                }
                let magnitude = gradients.get_pixel(x, y)[0];
                if magnitude > 0 {
                    candidates.push((magnitude, y, x));
                }
            }
        }

        candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        candidates.truncate(num_points);

        debug!(
            "Selected {} high-gradient points (requested {}) from {}x{} image",
            candidates.len(),
            num_points,
            width,
            height
        );

        let mut points = Self::default();
        for &(_, y, x) in &candidates {
            points.depth.push(f64::from(depth.get_pixel(x, y)[0]));
            points.depth_std.push(f64::from(depth_std.get_pixel(x, y)[0]));
            points.homo.push(Vector3::new(f64::from(x), f64::from(y), 1.0));
            points.color.push(image.get_pixel(x, y).0);
        }
        Ok(points)
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn depth(&self) -> &[f64] {
        &self.depth
    }

    pub fn depth_std(&self) -> &[f64] {
        &self.depth_std
    }

    pub fn homo(&self) -> &[Vector3<f64>] {
        &self.homo
    }

    pub fn color(&self) -> &[[u8; 3]] {
        &self.color
    }

    pub fn pixel(&self, i: usize) -> Point2<f64> {
        Point2::new(self.homo[i].x, self.homo[i].y)
    }

    /// Median depth of the points falling inside `bbox`, or `None` when
    /// fewer than `min_samples` points are inside.
    pub fn median_depth_in(&self, bbox: &BoundingBox, min_samples: usize) -> Option<f64> {
        let mut inside: Vec<f64> = (0..self.len())
            .filter(|&i| bbox.contains(&self.pixel(i)))
            .map(|i| self.depth[i])
            .collect();
        if inside.is_empty() || inside.len() < min_samples {
            return None;
        }

        inside.sort_by(|a, b| a.total_cmp(b));
        let mid = inside.len() / 2;
        if inside.len() % 2 == 0 {
            Some(0.5 * (inside[mid - 1] + inside[mid]))
        } else {
            Some(inside[mid])
        }
    }
}
