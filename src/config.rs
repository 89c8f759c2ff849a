//! Tuning parameters for tracking and landmark initialization.
//!
//! Every struct has a `Default` carrying the values used in practice, and
//! every field is optional in a YAML file:
//!
//! ```yaml
//! camera:
//!   fx: 517.3
//!   fy: 516.5
//!   cx: 318.6
//!   cy: 255.3
//! depth_scale: 5000.0
//! camera_pixel_noise2: 4.0
//! max_seconds: 0.05
//! estimator:
//!   huber_delta: 1.0
//!   num_points: 500
//! landmark:
//!   default_depth: 3.0
//! ```

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::CameraModel;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub camera: CameraModel,
    /// Depth image units per meter (5000 for 16-bit TUM depth PNGs).
    pub depth_scale: f64,
    /// Depth standard deviation as a fraction of depth, for depth sources
    /// without their own uncertainty.
    pub depth_std_ratio: f64,
    /// Camera pixel noise variance σ² (squared intensity units).
    pub camera_pixel_noise2: f64,
    /// Wall-clock budget for one pose solve.
    pub max_seconds: f64,
    pub estimator: EstimatorConfig,
    pub landmark: LandmarkConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            camera: CameraModel::new(517.3, 516.5, 318.6, 255.3),
            depth_scale: 5000.0,
            depth_std_ratio: 0.05,
            camera_pixel_noise2: 4.0,
            max_seconds: 0.05,
            estimator: EstimatorConfig::default(),
            landmark: LandmarkConfig::default(),
        }
    }
}

impl TrackingConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("Failed to parse tracking config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse tracking config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.camera.fx > 0.0 && self.camera.fy > 0.0,
            "camera focal lengths must be positive"
        );
        anyhow::ensure!(self.depth_scale > 0.0, "depth_scale must be positive");
        anyhow::ensure!(
            self.depth_std_ratio >= 0.0,
            "depth_std_ratio must be non-negative"
        );
        anyhow::ensure!(
            self.camera_pixel_noise2 >= 0.0,
            "camera_pixel_noise2 must be non-negative, got {}",
            self.camera_pixel_noise2
        );
        anyhow::ensure!(
            self.max_seconds >= 0.0,
            "max_seconds must be non-negative, got {}",
            self.max_seconds
        );
        anyhow::ensure!(self.estimator.num_points > 0, "estimator.num_points must be positive");
        anyhow::ensure!(
            self.estimator.huber_delta > 0.0,
            "estimator.huber_delta must be positive"
        );
        anyhow::ensure!(
            self.estimator.diff_step > 0.0,
            "estimator.diff_step must be positive"
        );
        anyhow::ensure!(
            self.landmark.default_depth > 0.0,
            "landmark.default_depth must be positive"
        );
        Ok(())
    }
}

/// Photometric pose estimator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of high-gradient points selected per keyframe.
    pub num_points: usize,
    /// Huber threshold on the whitened residual.
    pub huber_delta: f64,
    pub max_iterations: usize,
    /// Relative central-difference step.
    pub diff_step: f64,
    pub initial_lambda: f64,
    pub gradient_tolerance: f64,
    pub step_tolerance: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            num_points: 500,
            huber_delta: 1.0,
            max_iterations: 50,
            diff_step: 1e-4,
            initial_lambda: 1e-3,
            gradient_tolerance: 1e-10,
            step_tolerance: 1e-8,
        }
    }
}

/// Cuboid landmark initialization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkConfig {
    /// Object center depth used when the keyframe has no depth inside the
    /// detection box.
    pub default_depth: f64,
    /// Minimum number of keyframe depth samples inside the box before the
    /// median is trusted.
    pub min_depth_samples: usize,
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            default_depth: 3.0,
            min_depth_samples: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "max_seconds: 0.2\nestimator:\n  huber_delta: 0.5\n";
        let config = TrackingConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.max_seconds, 0.2);
        assert_eq!(config.estimator.huber_delta, 0.5);
        assert_eq!(config.estimator.num_points, EstimatorConfig::default().num_points);
        assert_eq!(config.landmark, LandmarkConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "camera_pixel_noise2: 9.0").unwrap();
        writeln!(file, "camera: {{ fx: 300.0, fy: 300.0, cx: 320.0, cy: 240.0 }}").unwrap();
        writeln!(file, "landmark:").unwrap();
        writeln!(file, "  default_depth: 5.5").unwrap();

        let config = TrackingConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.camera_pixel_noise2, 9.0);
        assert_eq!(config.landmark.default_depth, 5.5);
        assert_eq!(config.camera, CameraModel::new(300.0, 300.0, 320.0, 240.0));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = TrackingConfig::from_yaml_file(&path).unwrap_err();

        assert!(format!("{:#}", err).contains("absent.yaml"));
    }

    #[test]
    fn test_rejects_negative_budget() {
        assert!(TrackingConfig::from_yaml_str("max_seconds: -1.0\n").is_err());
    }
}
