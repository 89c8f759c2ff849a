//! Landmark - a rigid object modeled as an oriented 3D cuboid.
//!
//! The pose and the dimension are mutated together by the mapping thread
//! while tracking reads them, so both live behind a single lock. Everything
//! else (the inverse pose, the centroid, the combined cuboid handle) is
//! derived from that one copy on read, which keeps them consistent.

use std::collections::HashMap;

use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::LandmarkConfig;
use crate::error::{Result, TrackingError};
use crate::geometry::image_plane::point_from_homogeneous;
use crate::geometry::so3::skew;
use crate::geometry::{BoundingBox, SE3};
use crate::object::{Cuboid2D, Cuboid3D, Dimension3D, CORNER_SIGNS};

use super::keyframe::KeyFrame;
use super::types::{KeyFrameId, LandmarkId};

/// Relative singular value below which the back-projection system is
/// considered to have more than one solution.
const RANK_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct LandmarkState {
    /// World-to-local transform.
    t_lw: SE3,
    dimension: Dimension3D,
}

/// A cuboid landmark in the map.
#[derive(Debug)]
pub struct Landmark {
    pub id: LandmarkId,

    /// Semantic class of the detected object.
    pub class_idx: usize,

    state: Mutex<LandmarkState>,

    /// 2D bounding-box center of this object in each observing keyframe.
    bbox_centers: Mutex<HashMap<KeyFrameId, Point2<f64>>>,

    meas_quality: Mutex<f64>,
}

impl Landmark {
    /// Create a landmark from a world-to-local pose and a dimension.
    pub fn new(id: LandmarkId, class_idx: usize, t_lw: SE3, dimension: Dimension3D) -> Self {
        Self {
            id,
            class_idx,
            state: Mutex::new(LandmarkState { t_lw, dimension }),
            bbox_centers: Mutex::new(HashMap::new()),
            meas_quality: Mutex::new(1.0),
        }
    }

    /// Lift a 2D cuboid proposal seen from `keyframe` into a 3D landmark.
    ///
    /// Every corner ray `invK·(u, v, 1)` is parallel to the camera-frame
    /// corner `c + R_cl·diag(sᵢ)·h`. The cross-product constraints give a
    /// homogeneous system in the center `c` and half extents `h`, known up
    /// to scale. The scale comes from the keyframe's depth inside `bbox`,
    /// or from `config.default_depth` when there is none.
    pub fn from_proposal(
        id: LandmarkId,
        proposal: &Cuboid2D,
        bbox: &BoundingBox,
        keyframe: &KeyFrame,
        inv_k: &Matrix3<f64>,
        class_idx: usize,
        config: &LandmarkConfig,
    ) -> Result<Self> {
        if !proposal.valid {
            return Err(TrackingError::DegenerateProposal("proposal is not valid"));
        }

        let r_cl = proposal.rlc.transpose();
        let mut a = DMatrix::<f64>::zeros(24, 6);
        for (i, signs) in CORNER_SIGNS.iter().enumerate() {
            let corner = &proposal.corners[i];
            let ray = inv_k * Vector3::new(corner.x, corner.y, 1.0);
            let ray_x = skew(&ray);
            let m = r_cl * Matrix3::from_diagonal(&Vector3::new(signs[0], signs[1], signs[2]));
            a.fixed_view_mut::<3, 3>(3 * i, 0).copy_from(&ray_x);
            a.fixed_view_mut::<3, 3>(3 * i, 3).copy_from(&(ray_x * m));
        }
        if a.iter().any(|v| !v.is_finite()) {
            return Err(TrackingError::DegenerateProposal("non-finite corner"));
        }

        let svd = a.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or(TrackingError::DegenerateProposal("SVD did not converge"))?;

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&i, &j| svd.singular_values[i].total_cmp(&svd.singular_values[j]));
        let largest = svd.singular_values[order[order.len() - 1]];
        if svd.singular_values[order[1]] <= RANK_TOLERANCE * largest {
            warn!("Landmark {}: proposal admits more than one cuboid", id);
            return Err(TrackingError::DegenerateProposal("rank-deficient system"));
        }

        let x = v_t.row(order[0]).transpose();
        let mut center = Vector3::new(x[0], x[1], x[2]);
        let mut half = Vector3::new(x[3], x[4], x[5]);
        if center.z < 0.0 {
            center = -center;
            half = -half;
        }
        if center.z <= f64::EPSILON || half.norm() <= RANK_TOLERANCE * center.norm() {
            warn!("Landmark {}: proposal back-projects to a flat or unseen box", id);
            return Err(TrackingError::DegenerateProposal("box is flat or behind the camera"));
        }

        let depth = match keyframe.depth_prior(bbox, config.min_depth_samples) {
            Some(depth) => depth,
            None => {
                debug!(
                    "Landmark {}: no depth inside {:?} in {}, using default {}",
                    id, bbox, keyframe.id, config.default_depth
                );
                config.default_depth
            }
        };
        let scale = depth / center.z;
        center *= scale;
        half = (half * scale).abs();

        if !(center.iter().all(|v| v.is_finite()) && half.iter().all(|v| v.is_finite())) {
            return Err(TrackingError::DegenerateProposal("non-finite solution"));
        }

        let t_wl = keyframe.pose.compose(&SE3::from_rt(r_cl, center));
        let dimension = Dimension3D::from_half_extents(&half);
        let landmark = Self::new(id, class_idx, t_wl.inverse(), dimension);
        landmark.add_observation(keyframe.id, bbox.center());

        debug!(
            "Initialized landmark {} (class {}) at depth {:.3} with half extents {:?}",
            id, class_idx, depth, half
        );
        Ok(landmark)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pose and dimension
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_dimension(&self, dimension: Dimension3D) {
        self.state.lock().dimension = dimension;
    }

    /// Set the world-to-local transform.
    pub fn set_pose(&self, t_lw: &SE3) {
        self.state.lock().t_lw = *t_lw;
    }

    pub fn set_pose_rt(&self, r_lw: &Matrix3<f64>, t_lw: &Vector3<f64>) {
        let pose = SE3::from_rt(*r_lw, *t_lw);
        self.state.lock().t_lw = pose;
    }

    /// Replace pose and dimension together from an optimizer handle.
    pub fn set_pose_and_dimension(&self, cuboid: &Cuboid3D) {
        let state = LandmarkState {
            t_lw: cuboid.pose.inverse(),
            dimension: cuboid.dimension(),
        };
        *self.state.lock() = state;
    }

    pub fn dimension(&self) -> Dimension3D {
        self.state.lock().dimension
    }

    /// World-to-local transform (Tlw).
    pub fn pose(&self) -> SE3 {
        self.state.lock().t_lw
    }

    /// Local-to-world transform (Twl).
    pub fn pose_inverse(&self) -> SE3 {
        self.pose().inverse()
    }

    /// Rotation part of Tlw.
    pub fn rotation(&self) -> Matrix3<f64> {
        self.pose().rotation_matrix()
    }

    /// Translation part of Tlw.
    pub fn translation(&self) -> Vector3<f64> {
        self.pose().translation
    }

    /// Object center in world coordinates.
    pub fn centroid(&self) -> Vector3<f64> {
        self.pose_inverse().translation
    }

    /// Pose and dimension as one handle, read under a single lock.
    pub fn cuboid(&self) -> Cuboid3D {
        let state = *self.state.lock();
        Cuboid3D::new(state.t_lw.inverse(), state.dimension)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Projection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn projected_centroid(&self, t_cw: &SE3, k: &Matrix3<f64>) -> Point2<f64> {
        point_from_homogeneous(&(k * t_cw.transform_point(&self.centroid())))
    }

    /// Project the eight corners into the camera with pose `t_cw`.
    ///
    /// Corners with non-positive depth are flagged invisible and the result
    /// is valid only when all eight are in front of the camera. Corner
    /// coordinates are always finite.
    pub fn project(&self, t_cw: &SE3, k: &Matrix3<f64>) -> Cuboid2D {
        let state = *self.state.lock();
        let cuboid = Cuboid3D::new(state.t_lw.inverse(), state.dimension);

        let mut projected = Cuboid2D::default();
        for (i, corner) in cuboid.corners().iter().enumerate() {
            let p_c = t_cw.transform_point(corner);
            projected.visible[i] = p_c.z > 0.0;
            projected.corners[i] = point_from_homogeneous(&(k * p_c));
        }
        projected.rlc = (state.t_lw.rotation * t_cw.rotation.inverse())
            .to_rotation_matrix()
            .into_inner();
        projected.valid = projected.all_visible();
        projected
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_observation(&self, kf_id: KeyFrameId, bbox_center: Point2<f64>) {
        self.bbox_centers.lock().insert(kf_id, bbox_center);
    }

    pub fn erase_observation(&self, kf_id: KeyFrameId) -> Option<Point2<f64>> {
        self.bbox_centers.lock().remove(&kf_id)
    }

    pub fn bbox_center(&self, kf_id: KeyFrameId) -> Option<Point2<f64>> {
        self.bbox_centers.lock().get(&kf_id).copied()
    }

    pub fn is_observed_by(&self, kf_id: KeyFrameId) -> bool {
        self.bbox_centers.lock().contains_key(&kf_id)
    }

    /// Observing keyframes in id order.
    pub fn observations(&self) -> Vec<KeyFrameId> {
        let mut ids: Vec<KeyFrameId> = self.bbox_centers.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn num_observations(&self) -> usize {
        self.bbox_centers.lock().len()
    }

    pub fn set_measurement_quality(&self, quality: f64) {
        *self.meas_quality.lock() = quality;
    }

    pub fn measurement_quality(&self) -> f64 {
        *self.meas_quality.lock()
    }
}

impl Clone for Landmark {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            class_idx: self.class_idx,
            state: Mutex::new(*self.state.lock()),
            bbox_centers: Mutex::new(self.bbox_centers.lock().clone()),
            meas_quality: Mutex::new(*self.meas_quality.lock()),
        }
    }
}
