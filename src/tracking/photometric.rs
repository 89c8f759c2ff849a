//! Depth-whitened photometric residual between a reference keyframe and the
//! current color image.
//!
//! For reference point `i` back-projected to `pᵢ`, with the relative motion
//! `T = [R | t]` as parameters `[r (axis-angle), t]`:
//!
//! ```text
//! c_nom   = I(π(K (R pᵢ + t)))              pᵢ at its depth
//! c_right = I(π(K (R p⁺ᵢ + t)))             p⁺ᵢ at depth + one std
//! rᵢ      = ‖c_ref − c_nom‖ / sqrt((‖c_ref − c_right‖ − ‖c_ref − c_nom‖)² + 2σ²)
//! ```
//!
//! Points that land outside the image or behind the camera take the mean
//! residual of the valid points, so the residual vector keeps its length.

use image::RgbImage;
use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, Matrix3, Owned, Point2, Vector3};
use rayon::prelude::*;
use tracing::trace;

use crate::geometry::image_plane::point_from_homogeneous;
use crate::geometry::SE3;
use crate::optimizer::numeric_jacobian;

use super::high_gradient::HighGradientPoints;

/// Reference points lifted into the reference camera frame.
#[derive(Debug, Clone)]
pub struct ReferenceCloud {
    nominal: Vec<Vector3<f64>>,
    /// Same rays, pushed out by one depth standard deviation.
    right: Vec<Vector3<f64>>,
    colors: Vec<Vector3<f64>>,
}

impl ReferenceCloud {
    pub fn new(points: &HighGradientPoints, inv_k: &Matrix3<f64>) -> Self {
        let mut cloud = Self {
            nominal: Vec::with_capacity(points.len()),
            right: Vec::with_capacity(points.len()),
            colors: Vec::with_capacity(points.len()),
        };
        for i in 0..points.len() {
            let ray = inv_k * points.homo()[i];
            let depth = points.depth()[i];
            cloud.nominal.push(ray * depth);
            cloud.right.push(ray * (depth + points.depth_std()[i]));
            let [r, g, b] = points.color()[i];
            cloud
                .colors
                .push(Vector3::new(f64::from(r), f64::from(g), f64::from(b)));
        }
        cloud
    }

    pub fn len(&self) -> usize {
        self.nominal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nominal.is_empty()
    }
}

/// Bilinear color lookup. `None` outside `[0, w-1] × [0, h-1]`.
pub fn sample_bilinear(image: &RgbImage, p: &Point2<f64>) -> Option<Vector3<f64>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);
    if !(p.x >= 0.0 && p.x <= max_x && p.y >= 0.0 && p.y <= max_y) {
        return None;
    }

    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let fx = p.x - x0;
    let fy = p.y - y0;
    let (x0, y0) = (x0 as u32, y0 as u32);
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let px = |x: u32, y: u32| {
        let c = image.get_pixel(x, y).0;
        Vector3::new(f64::from(c[0]), f64::from(c[1]), f64::from(c[2]))
    };
    let top = px(x0, y0) * (1.0 - fx) + px(x1, y0) * fx;
    let bottom = px(x0, y1) * (1.0 - fx) + px(x1, y1) * fx;
    Some(top * (1.0 - fy) + bottom * fy)
}

/// The photometric tracking problem over the six motion parameters.
#[derive(Debug, Clone)]
pub struct PhotometricProblem<'a> {
    image: &'a RgbImage,
    cloud: &'a ReferenceCloud,
    k: Matrix3<f64>,
    camera_pixel_noise2: f64,
    diff_step: f64,
    /// `[rx, ry, rz, tx, ty, tz]`.
    params: DVector<f64>,
}

impl<'a> PhotometricProblem<'a> {
    pub fn new(
        image: &'a RgbImage,
        cloud: &'a ReferenceCloud,
        k: Matrix3<f64>,
        camera_pixel_noise2: f64,
        diff_step: f64,
    ) -> Self {
        Self {
            image,
            cloud,
            k,
            camera_pixel_noise2,
            diff_step,
            params: DVector::zeros(6),
        }
    }

    /// Current estimate of the reference-to-current camera motion.
    pub fn relative_pose(&self) -> SE3 {
        let p = &self.params;
        SE3::from_axis_angle(
            &Vector3::new(p[0], p[1], p[2]),
            Vector3::new(p[3], p[4], p[5]),
        )
    }

    fn project(&self, rel: &SE3, p: &Vector3<f64>) -> Option<Point2<f64>> {
        let p_c = rel.transform_point(p);
        if p_c.z <= 0.0 {
            return None;
        }
        Some(point_from_homogeneous(&(self.k * p_c)))
    }

    fn point_residual(&self, rel: &SE3, i: usize) -> Option<f64> {
        let uv = self.project(rel, &self.cloud.nominal[i])?;
        let uv_right = self.project(rel, &self.cloud.right[i])?;
        let color = sample_bilinear(self.image, &uv)?;
        let color_right = sample_bilinear(self.image, &uv_right)?;

        let reference = &self.cloud.colors[i];
        let err = (reference - color).norm();
        let err_right = (reference - color_right).norm();
        let sigma2 = (err_right - err).powi(2) + 2.0 * self.camera_pixel_noise2;
        if sigma2 > 0.0 {
            Some(err / sigma2.sqrt())
        } else if err == 0.0 {
            Some(0.0)
        } else {
            None
        }
    }

    /// Per-point residuals with invalid points replaced by the valid mean.
    /// `None` if the parameters are not finite or no point is valid.
    pub fn evaluate(&self) -> Option<DVector<f64>> {
        if self.params.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let rel = self.relative_pose();

        let per_point: Vec<Option<f64>> = (0..self.cloud.len())
            .into_par_iter()
            .map(|i| self.point_residual(&rel, i))
            .collect();

        let (sum, valid) = per_point
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, n), r| (s + r, n + 1));
        if valid == 0 {
            trace!("Photometric evaluation: no valid points");
            return None;
        }
        let mean = sum / valid as f64;
        trace!(
            "Photometric evaluation: {}/{} valid, mean residual {:.4}",
            valid,
            per_point.len(),
            mean
        );

        Some(DVector::from_iterator(
            per_point.len(),
            per_point.iter().map(|r| r.unwrap_or(mean)),
        ))
    }

    /// Fraction of nominal projections that land inside the image.
    pub fn valid_ratio(&self) -> f64 {
        if self.cloud.is_empty() {
            return 0.0;
        }
        let rel = self.relative_pose();
        let (width, height) = self.image.dimensions();
        let max_x = f64::from(width.saturating_sub(1));
        let max_y = f64::from(height.saturating_sub(1));

        let inside = self
            .cloud
            .nominal
            .par_iter()
            .filter(|p| {
                self.project(&rel, p)
                    .map(|uv| uv.x >= 0.0 && uv.x <= max_x && uv.y >= 0.0 && uv.y <= max_y)
                    .unwrap_or(false)
            })
            .count();
        inside as f64 / self.cloud.len() as f64
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for PhotometricProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.evaluate()
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        numeric_jacobian(self, self.diff_step)
    }
}
