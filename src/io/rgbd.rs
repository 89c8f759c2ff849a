use std::path::Path;

use anyhow::{Context, Result};
use image::{Luma, RgbImage};

use crate::tracking::high_gradient::DepthMap;

pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let image = image::open(path).with_context(|| format!("Failed to read image {:?}", path))?;
    Ok(image.to_rgb8())
}

/// Load a 16-bit depth PNG and convert it to meters. Zero pixels mean
/// "no measurement" and stay zero.
pub fn load_depth(path: impl AsRef<Path>, depth_scale: f64) -> Result<DepthMap> {
    anyhow::ensure!(depth_scale > 0.0, "depth_scale must be positive, got {}", depth_scale);
    let path = path.as_ref();
    let raw = image::open(path)
        .with_context(|| format!("Failed to read depth image {:?}", path))?
        .into_luma16();

    let inv_scale = 1.0 / depth_scale;
    Ok(DepthMap::from_fn(raw.width(), raw.height(), |x, y| {
        Luma([(f64::from(raw.get_pixel(x, y)[0]) * inv_scale) as f32])
    }))
}

/// Depth uncertainty proportional to depth.
pub fn depth_std_from_ratio(depth: &DepthMap, ratio: f64) -> DepthMap {
    let ratio = ratio as f32;
    DepthMap::from_fn(depth.width(), depth.height(), |x, y| {
        Luma([depth.get_pixel(x, y)[0] * ratio])
    })
}
