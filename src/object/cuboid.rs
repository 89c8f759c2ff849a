//! 3D cuboid parameterization.
//!
//! A cuboid is a pose (local-to-world) plus half extents along the local
//! axes. Local `z` is the vertical axis: corners `0..4` form the bottom face
//! (`z = -h`), corners `4..8` the top face, and corner `i` sits directly
//! below corner `i + 4`.

use nalgebra::{SVector, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::SE3;

/// Unit-cube corner signs, in canonical order.
#[rustfmt::skip]
pub const CORNER_SIGNS: [[f64; 3]; 8] = [
    [ 1.0,  1.0, -1.0],
    [ 1.0, -1.0, -1.0],
    [-1.0, -1.0, -1.0],
    [-1.0,  1.0, -1.0],
    [ 1.0,  1.0,  1.0],
    [ 1.0, -1.0,  1.0],
    [-1.0, -1.0,  1.0],
    [-1.0,  1.0,  1.0],
];

/// The 12 edges as corner index pairs: bottom ring, top ring, verticals.
pub const CUBOID_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Full edge lengths of a cuboid: `width` along local x, `length` along
/// local y, `height` along local z. Always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimension3D {
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

impl Dimension3D {
    /// Negative inputs are folded to their magnitude.
    pub fn new(width: f64, length: f64, height: f64) -> Self {
        Self {
            width: width.abs(),
            length: length.abs(),
            height: height.abs(),
        }
    }

    pub fn from_half_extents(half: &Vector3<f64>) -> Self {
        Self::new(2.0 * half.x, 2.0 * half.y, 2.0 * half.z)
    }

    pub fn half_extents(&self) -> Vector3<f64> {
        Vector3::new(self.width, self.length, self.height) * 0.5
    }

    pub fn volume(&self) -> f64 {
        self.width * self.length * self.height
    }
}

impl Default for Dimension3D {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Combined pose + dimension handle, as consumed by an external optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cuboid3D {
    /// Local-to-world transform (`T_wl`); its translation is the centroid.
    pub pose: SE3,
    /// Half extents along the local axes.
    pub scale: Vector3<f64>,
}

impl Cuboid3D {
    pub fn new(pose: SE3, dimension: Dimension3D) -> Self {
        Self {
            pose,
            scale: dimension.half_extents(),
        }
    }

    pub fn dimension(&self) -> Dimension3D {
        Dimension3D::from_half_extents(&self.scale)
    }

    pub fn centroid(&self) -> Vector3<f64> {
        self.pose.translation
    }

    /// Corners in the local frame, canonical order.
    pub fn local_corners(&self) -> [Vector3<f64>; 8] {
        CORNER_SIGNS.map(|s| Vector3::new(s[0], s[1], s[2]).component_mul(&self.scale))
    }

    /// Corners in the world frame, canonical order.
    pub fn corners(&self) -> [Vector3<f64>; 8] {
        self.local_corners().map(|c| self.pose.transform_point(&c))
    }

    /// `[x, y, z, roll, pitch, yaw, sx, sy, sz]`.
    pub fn to_minimal_vector(&self) -> SVector<f64, 9> {
        let (roll, pitch, yaw) = self.pose.rotation.euler_angles();
        let t = self.pose.translation;
        SVector::<f64, 9>::from_column_slice(&[
            t.x,
            t.y,
            t.z,
            roll,
            pitch,
            yaw,
            self.scale.x,
            self.scale.y,
            self.scale.z,
        ])
    }

    /// Inverse of [`Cuboid3D::to_minimal_vector`]. Negative scales are
    /// folded to their magnitude.
    pub fn from_minimal_vector(v: &SVector<f64, 9>) -> Self {
        let rotation = UnitQuaternion::from_euler_angles(v[3], v[4], v[5]);
        Self {
            pose: SE3::from_quaternion(rotation, Vector3::new(v[0], v[1], v[2])),
            scale: Vector3::new(v[6].abs(), v[7].abs(), v[8].abs()),
        }
    }

    /// Apply a rigid transform to the whole box (`T * pose`).
    pub fn transform(&self, t: &SE3) -> Self {
        Self {
            pose: t.compose(&self.pose),
            scale: self.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_cuboid() -> Cuboid3D {
        Cuboid3D::new(
            SE3::from_quaternion(
                UnitQuaternion::from_euler_angles(0.0, 0.0, 0.4),
                Vector3::new(1.0, 2.0, 3.0),
            ),
            Dimension3D::new(2.0, 4.0, 1.0),
        )
    }

    #[test]
    fn test_dimension_non_negative() {
        let d = Dimension3D::new(-1.0, 2.0, -3.0);
        assert_eq!(d, Dimension3D::new(1.0, 2.0, 3.0));
        assert_relative_eq!(d.volume(), 6.0);
    }

    #[test]
    fn test_corner_layout() {
        let c = Cuboid3D::new(SE3::identity(), Dimension3D::new(2.0, 4.0, 6.0)).corners();

        for i in 0..4 {
            assert_eq!(c[i].z, -3.0, "corner {} should be on the bottom face", i);
            assert_eq!(c[i + 4].z, 3.0, "corner {} should be on the top face", i + 4);
            assert_eq!(c[i].xy(), c[i + 4].xy(), "vertical edge {}-{}", i, i + 4);
        }
    }

    #[test]
    fn test_edges_have_cuboid_lengths() {
        let cuboid = sample_cuboid();
        let corners = cuboid.corners();
        let dim = cuboid.dimension();

        let mut lengths: Vec<f64> = CUBOID_EDGES
            .iter()
            .map(|&(a, b)| (corners[a] - corners[b]).norm())
            .collect();
        lengths.sort_by(|a, b| a.partial_cmp(b).unwrap());

        for (i, expected) in [dim.height, dim.width, dim.length].iter().enumerate() {
            for l in &lengths[i * 4..i * 4 + 4] {
                assert_relative_eq!(*l, *expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_centroid_is_corner_mean() {
        let cuboid = sample_cuboid();
        let mean = cuboid
            .corners()
            .iter()
            .fold(Vector3::zeros(), |acc, c| acc + c)
            / 8.0;

        assert_relative_eq!(mean, cuboid.centroid(), epsilon = 1e-12);
    }

    #[test]
    fn test_minimal_vector_roundtrip() {
        let cuboid = sample_cuboid();
        let recovered = Cuboid3D::from_minimal_vector(&cuboid.to_minimal_vector());

        assert_relative_eq!(recovered.scale, cuboid.scale, epsilon = 1e-12);
        assert_relative_eq!(
            recovered.pose.to_matrix(),
            cuboid.pose.to_matrix(),
            epsilon = 1e-12
        );
    }
}
