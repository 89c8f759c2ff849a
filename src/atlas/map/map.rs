//! Map - Container for KeyFrames and cuboid Landmarks.
//!
//! The Map is the single owner of landmarks. Keyframes and landmarks refer
//! to each other through ids, and other components hold landmark handles
//! only for the duration of a query.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::Matrix3;
use tracing::debug;

use crate::config::LandmarkConfig;
use crate::error::{Result, TrackingError};
use crate::geometry::{BoundingBox, SE3};
use crate::object::Cuboid2D;
use crate::tracking::high_gradient::HighGradientPoints;

use super::keyframe::KeyFrame;
use super::landmark::Landmark;
use super::types::{KeyFrameId, LandmarkId};

#[derive(Debug, Default)]
pub struct Map {
    keyframes: HashMap<KeyFrameId, KeyFrame>,

    /// Landmarks are shared with readers (tracking, rendering) through
    /// `Arc`, and mutated in place through their internal lock.
    landmarks: HashMap<LandmarkId, Arc<Landmark>>,

    next_kf_id: u64,
    next_landmark_id: u64,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ID Generation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn next_keyframe_id(&mut self) -> KeyFrameId {
        let id = KeyFrameId::new(self.next_kf_id);
        self.next_kf_id += 1;
        id
    }

    pub fn next_landmark_id(&mut self) -> LandmarkId {
        let id = LandmarkId::new(self.next_landmark_id);
        self.next_landmark_id += 1;
        id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // KeyFrame Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create and add a new KeyFrame. Returns its id.
    pub fn create_keyframe(
        &mut self,
        timestamp_ns: u64,
        pose: SE3,
        k_inv: Matrix3<f64>,
        high_grad: HighGradientPoints,
    ) -> KeyFrameId {
        let id = self.next_keyframe_id();
        self.keyframes
            .insert(id, KeyFrame::new(id, timestamp_ns, pose, k_inv, high_grad));
        id
    }

    pub fn get_keyframe(&self, id: KeyFrameId) -> Option<&KeyFrame> {
        self.keyframes.get(&id)
    }

    pub fn num_keyframes(&self) -> usize {
        self.keyframes.len()
    }

    /// Remove a KeyFrame and drop its observations from every landmark.
    pub fn remove_keyframe(&mut self, id: KeyFrameId) -> Option<KeyFrame> {
        let kf = self.keyframes.remove(&id)?;
        for lm in self.landmarks.values() {
            lm.erase_observation(id);
        }
        Some(kf)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Landmark Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Initialize a landmark from a cuboid proposal seen in keyframe `kf_id`.
    pub fn create_landmark(
        &mut self,
        proposal: &Cuboid2D,
        bbox: &BoundingBox,
        kf_id: KeyFrameId,
        class_idx: usize,
        config: &LandmarkConfig,
    ) -> Result<LandmarkId> {
        let kf = self
            .keyframes
            .get(&kf_id)
            .ok_or(TrackingError::UnknownKeyFrame(kf_id))?;
        let id = LandmarkId::new(self.next_landmark_id);
        let landmark =
            Landmark::from_proposal(id, proposal, bbox, kf, &kf.k_inv, class_idx, config)?;
        self.next_landmark_id += 1;
        self.landmarks.insert(id, Arc::new(landmark));
        Ok(id)
    }

    /// Insert an already built landmark, keyed by its own id.
    pub fn add_landmark(&mut self, landmark: Landmark) {
        self.next_landmark_id = self.next_landmark_id.max(landmark.id.0 + 1);
        self.landmarks.insert(landmark.id, Arc::new(landmark));
    }

    pub fn get_landmark(&self, id: LandmarkId) -> Option<Arc<Landmark>> {
        self.landmarks.get(&id).cloned()
    }

    pub fn landmarks(&self) -> impl Iterator<Item = &Arc<Landmark>> {
        self.landmarks.values()
    }

    pub fn num_landmarks(&self) -> usize {
        self.landmarks.len()
    }

    pub fn remove_landmark(&mut self, id: LandmarkId) -> Option<Arc<Landmark>> {
        self.landmarks.remove(&id)
    }

    /// Landmarks observed by a keyframe, in id order.
    pub fn landmarks_observed_by(&self, kf_id: KeyFrameId) -> Vec<LandmarkId> {
        let mut ids: Vec<LandmarkId> = self
            .landmarks
            .values()
            .filter(|lm| lm.is_observed_by(kf_id))
            .map(|lm| lm.id)
            .collect();
        ids.sort();
        ids
    }

    /// Remove landmarks whose measurement quality fell below `min_quality`.
    /// Returns the number removed.
    pub fn cull_landmarks(&mut self, min_quality: f64) -> usize {
        let before = self.landmarks.len();
        self.landmarks
            .retain(|_, lm| lm.measurement_quality() >= min_quality);
        let removed = before - self.landmarks.len();
        if removed > 0 {
            debug!("Culled {} landmarks below quality {}", removed, min_quality);
        }
        removed
    }
}
