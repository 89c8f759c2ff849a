//! Direct photometric camera pose estimation against a reference keyframe.

use std::time::Duration;

use image::RgbImage;
use nalgebra::Matrix3;
use tracing::{debug, info};

use crate::atlas::map::KeyFrame;
use crate::config::EstimatorConfig;
use crate::error::{Result, TrackingError};
use crate::optimizer::{BudgetedLevenbergMarquardt, HuberLoss};

use super::photometric::{PhotometricProblem, ReferenceCloud};
use super::result::PoseEstimate;

/// Estimate the world-to-camera pose of `image` relative to `reference`.
///
/// Starts from zero motion and minimizes the Huber-robustified photometric
/// residual over the reference keyframe's high-gradient points. The solve
/// never runs past `max_seconds`; when the budget is exhausted the best
/// motion found so far is used, and a zero budget returns the reference
/// pose unchanged.
///
/// Only an empty reference point set is an error. Bad geometry or an
/// unhelpful image shows up in the diagnostics of the returned estimate.
pub fn estimate_camera_pose(
    image: &RgbImage,
    k: &Matrix3<f64>,
    inv_k: &Matrix3<f64>,
    reference: &KeyFrame,
    camera_pixel_noise2: f64,
    max_seconds: f64,
    config: &EstimatorConfig,
) -> Result<PoseEstimate> {
    if reference.high_grad.is_empty() {
        return Err(TrackingError::EmptyPointSet(reference.id));
    }

    let cloud = ReferenceCloud::new(&reference.high_grad, inv_k);
    let problem = PhotometricProblem::new(image, &cloud, *k, camera_pixel_noise2, config.diff_step);
    let solver = BudgetedLevenbergMarquardt::from_config(config, time_budget(max_seconds));

    debug!(
        "Tracking against {} with {} points, budget {:?}",
        reference.id,
        cloud.len(),
        solver.time_budget
    );
    let (problem, summary) = solver.minimize(problem, &HuberLoss::new(config.huber_delta));

    let relative_pose = problem.relative_pose();
    let estimate = PoseEstimate {
        pose: relative_pose.compose(&reference.pose_cw()),
        relative_pose,
        rotation_angle: relative_pose.angle(),
        translation_distance: relative_pose.translation.norm(),
        valid_ratio: problem.valid_ratio(),
        residual_scale: summary.final_cost / cloud.len() as f64,
        summary,
    };

    info!(
        "Pose vs {}: {:?}, {} iters, {:?}, rot {:.4}, trans {:.4}, valid {:.2}, res {:.4}",
        reference.id,
        estimate.summary.termination,
        estimate.summary.iterations,
        estimate.summary.elapsed,
        estimate.rotation_angle,
        estimate.translation_distance,
        estimate.valid_ratio,
        estimate.residual_scale
    );
    Ok(estimate)
}

/// Non-finite or non-positive budgets mean "no time".
fn time_budget(max_seconds: f64) -> Duration {
    if max_seconds.is_nan() || max_seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(max_seconds).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;
    use nalgebra::Vector3;

    use crate::atlas::map::KeyFrameId;
    use crate::geometry::{CameraModel, SE3};
    use crate::optimizer::Termination;
    use crate::tracking::high_gradient::HighGradientPoints;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;

    fn camera() -> CameraModel {
        CameraModel::new(300.0, 300.0, 320.0, 240.0)
    }

    fn texture(x: f64, y: f64) -> Rgb<u8> {
        let r = 128.0 + 90.0 * (8.0 * x + 2.0 * y).sin();
        let g = 128.0 + 90.0 * (6.0 * y - 3.0 * x).cos();
        let b = 128.0 + 60.0 * (5.0 * x + 7.0 * y).sin();
        Rgb([r.round() as u8, g.round() as u8, b.round() as u8])
    }

    /// Ray parameter where `origin + s·dir` meets the slanted plane
    /// `z = 2 + 0.4x - 0.2y`.
    fn hit_plane(origin: &Vector3<f64>, dir: &Vector3<f64>) -> f64 {
        (2.0 + 0.4 * origin.x - 0.2 * origin.y - origin.z) / (dir.z - 0.4 * dir.x + 0.2 * dir.y)
    }

    /// Render the textured plane from a camera with world-to-camera `t_cw`.
    fn render(t_cw: &SE3) -> RgbImage {
        let t_wc = t_cw.inverse();
        let k_inv = camera().k_inv();
        RgbImage::from_fn(WIDTH, HEIGHT, |u, v| {
            let dir = t_wc.rotation * (k_inv * Vector3::new(f64::from(u), f64::from(v), 1.0));
            let s = hit_plane(&t_wc.translation, &dir);
            let p = t_wc.translation + dir * s;
            texture(p.x, p.y)
        })
    }

    /// Reference keyframe at the world origin with a grid of tracked points.
    fn reference_keyframe(reference: &RgbImage) -> KeyFrame {
        let k_inv = camera().k_inv();
        let (mut depth, mut homo, mut color) = (Vec::new(), Vec::new(), Vec::new());
        for v in (80..400).step_by(20) {
            for u in (100..540).step_by(22) {
                let h = Vector3::new(f64::from(u), f64::from(v), 1.0);
                depth.push(hit_plane(&Vector3::zeros(), &(k_inv * h)));
                homo.push(h);
                color.push(reference.get_pixel(u, v).0);
            }
        }
        let n = depth.len();
        let points = HighGradientPoints::new(depth, vec![0.01; n], homo, color).unwrap();
        KeyFrame::new(KeyFrameId::new(0), 0, SE3::identity(), k_inv, points)
    }

    fn config() -> EstimatorConfig {
        EstimatorConfig {
            max_iterations: 100,
            ..EstimatorConfig::default()
        }
    }

    fn solve(image: &RgbImage, kf: &KeyFrame, max_seconds: f64) -> PoseEstimate {
        let cam = camera();
        estimate_camera_pose(image, &cam.k(), &cam.k_inv(), kf, 1.0, max_seconds, &config())
            .unwrap()
    }

    #[test]
    fn test_recovers_small_motion() {
        let axis = Vector3::new(0.2, -0.3, 1.0).normalize();
        let truth = SE3::from_axis_angle(&(axis * 0.01), Vector3::new(0.02, -0.01, 0.03));
        let reference = render(&SE3::identity());
        let current = render(&truth);
        let kf = reference_keyframe(&reference);

        let estimate = solve(&current, &kf, 10.0);

        let error = estimate.pose.compose(&truth.inverse());
        assert!(
            error.translation.norm() < 0.01,
            "translation error {}",
            error.translation.norm()
        );
        assert!(error.angle() < 0.01, "rotation error {}", error.angle());
        assert_eq!(estimate.valid_ratio, 1.0);
        assert!(estimate.summary.final_cost < estimate.summary.initial_cost);
        assert_relative_eq!(
            estimate.translation_distance,
            truth.translation.norm(),
            epsilon = 0.01
        );
    }

    #[test]
    fn test_identical_image_stays_put() {
        let reference = render(&SE3::identity());
        let kf = reference_keyframe(&reference);

        let estimate = solve(&reference, &kf, 10.0);

        assert_relative_eq!(estimate.residual_scale, 0.0, epsilon = 1e-12);
        assert!(estimate.rotation_angle < 1e-6);
        assert!(estimate.translation_distance < 1e-6);
        assert_eq!(estimate.valid_ratio, 1.0);
    }

    #[test]
    fn test_zero_budget_returns_reference_pose() {
        let reference = render(&SE3::identity());
        let mut kf = reference_keyframe(&reference);
        kf.pose = SE3::from_axis_angle(&Vector3::new(0.0, 0.2, 0.0), Vector3::new(1.0, 0.0, 0.5));
        let shifted = SE3::from_axis_angle(&Vector3::zeros(), Vector3::new(0.05, 0.0, 0.0));
        let current = render(&shifted);

        let estimate = solve(&current, &kf, 0.0);

        assert_eq!(estimate.summary.iterations, 0);
        assert_eq!(estimate.summary.termination, Termination::TimeBudget);
        assert_relative_eq!(
            estimate.pose.to_matrix(),
            kf.pose_cw().to_matrix(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_points_outside_image_degrade_gracefully() {
        let reference = render(&SE3::identity());
        let kf = reference_keyframe(&reference);
        let tiny = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));

        let estimate = solve(&tiny, &kf, 1.0);

        assert_eq!(estimate.summary.termination, Termination::EvaluationFailure);
        assert_eq!(estimate.valid_ratio, 0.0);
        assert_eq!(estimate.residual_scale, f64::INFINITY);
        assert!(estimate.residual_scale > 10.0);
        assert_relative_eq!(estimate.pose.to_matrix(), kf.pose_cw().to_matrix(), epsilon = 1e-12);
    }

    #[test]
    fn test_unbounded_budget_solves() {
        let truth = SE3::from_axis_angle(&Vector3::zeros(), Vector3::new(0.01, 0.0, 0.0));
        let reference = render(&SE3::identity());
        let current = render(&truth);
        let kf = reference_keyframe(&reference);

        for max_seconds in [f64::INFINITY, 1e300] {
            let estimate = solve(&current, &kf, max_seconds);

            assert_ne!(estimate.summary.termination, Termination::TimeBudget);
            assert!(estimate.summary.iterations > 0);
            assert!(estimate.summary.final_cost < estimate.summary.initial_cost);
        }
    }

    #[test]
    fn test_empty_reference_is_an_error() {
        let kf = KeyFrame::new(
            KeyFrameId::new(3),
            0,
            SE3::identity(),
            camera().k_inv(),
            HighGradientPoints::default(),
        );
        let image = RgbImage::new(4, 4);
        let cam = camera();

        let result = estimate_camera_pose(&image, &cam.k(), &cam.k_inv(), &kf, 1.0, 1.0, &config());
        assert!(matches!(
            result,
            Err(TrackingError::EmptyPointSet(id)) if id == KeyFrameId::new(3)
        ));
    }

    #[test]
    fn test_time_budget_conversion() {
        assert_eq!(time_budget(-1.0), Duration::ZERO);
        assert_eq!(time_budget(f64::NAN), Duration::ZERO);
        assert_eq!(time_budget(f64::INFINITY), Duration::MAX);
        assert_eq!(time_budget(0.5), Duration::from_millis(500));
    }
}
