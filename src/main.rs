use anyhow::{bail, Context, Result};

use rust_cubeslam::atlas::Map;
use rust_cubeslam::config::TrackingConfig;
use rust_cubeslam::geometry::SE3;
use rust_cubeslam::io::{depth_std_from_ratio, load_depth, load_rgb};
use rust_cubeslam::tracking::{estimate_camera_pose, HighGradientPoints};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        bail!(
            "usage: {} <reference.png> <reference_depth.png> <current.png> [config.yaml]",
            args.first().map(String::as_str).unwrap_or("rust-cubeslam")
        );
    }

    let config = match args.get(4) {
        Some(path) => TrackingConfig::from_yaml_file(path)?,
        None => TrackingConfig::default(),
    };
    let camera = config.camera;

    let reference = load_rgb(&args[1])?;
    let depth = load_depth(&args[2], config.depth_scale)?;
    let depth_std = depth_std_from_ratio(&depth, config.depth_std_ratio);
    let current = load_rgb(&args[3])?;

    let num_points = config.estimator.num_points;
    let points = HighGradientPoints::select(&reference, &depth, &depth_std, num_points)?;
    println!(
        "Reference {}x{}: selected {} high-gradient points",
        reference.width(),
        reference.height(),
        points.len()
    );

    let mut map = Map::new();
    let kf_id = map.create_keyframe(0, SE3::identity(), camera.k_inv(), points);
    let keyframe = map
        .get_keyframe(kf_id)
        .context("reference keyframe missing from map")?;

    let estimate = estimate_camera_pose(
        &current,
        &camera.k(),
        &camera.k_inv(),
        keyframe,
        config.camera_pixel_noise2,
        config.max_seconds,
        &config.estimator,
    )?;

    let t = estimate.pose.translation;
    let q = estimate.pose.rotation;
    println!(
        "Tcw: t = [{:.4}, {:.4}, {:.4}], q = [{:.4}, {:.4}, {:.4}, {:.4}]",
        t.x, t.y, t.z, q.w, q.i, q.j, q.k
    );
    println!(
        "rotation {:.4} rad, translation {:.4}, valid ratio {:.2}, residual scale {:.4}",
        estimate.rotation_angle,
        estimate.translation_distance,
        estimate.valid_ratio,
        estimate.residual_scale
    );
    println!(
        "solver: {:?} after {} iterations in {:?} (cost {:.4} -> {:.4})",
        estimate.summary.termination,
        estimate.summary.iterations,
        estimate.summary.elapsed,
        estimate.summary.initial_cost,
        estimate.summary.final_cost
    );

    Ok(())
}
