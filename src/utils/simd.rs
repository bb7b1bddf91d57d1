//! SIMD-related helpers for batch math operations.
//!
//! [`Vec3x4`] stores four 3D vectors in structure-of-arrays form so that one
//! `glam::Vec4` operation processes the same component of all four lanes.
//! The contact solver's SIMD path uses it to set up the Jacobians of a whole
//! four-point manifold at once.

use glam::{BVec4A, Mat3, Vec3, Vec4};

/// Structure-of-Arrays (SoA) SIMD vector holding 4 3D vectors.
///
/// x: [v0.x, v1.x, v2.x, v3.x]
/// y: [v0.y, v1.y, v2.y, v3.y]
/// z: [v0.z, v1.z, v2.z, v3.z]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3x4 {
    pub x: Vec4,
    pub y: Vec4,
    pub z: Vec4,
}

impl Vec3x4 {
    pub fn splat(v: Vec3) -> Self {
        Self {
            x: Vec4::splat(v.x),
            y: Vec4::splat(v.y),
            z: Vec4::splat(v.z),
        }
    }

    pub fn from_lanes(lanes: [Vec3; 4]) -> Self {
        Self {
            x: Vec4::new(lanes[0].x, lanes[1].x, lanes[2].x, lanes[3].x),
            y: Vec4::new(lanes[0].y, lanes[1].y, lanes[2].y, lanes[3].y),
            z: Vec4::new(lanes[0].z, lanes[1].z, lanes[2].z, lanes[3].z),
        }
    }

    pub fn lane(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z[i])
    }

    pub fn dot(&self, other: Self) -> Vec4 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Multiplies every lane by the same matrix.
    pub fn transform(&self, m: &Mat3) -> Self {
        Self {
            x: self.x * m.x_axis.x + self.y * m.y_axis.x + self.z * m.z_axis.x,
            y: self.x * m.x_axis.y + self.y * m.y_axis.y + self.z * m.z_axis.y,
            z: self.x * m.x_axis.z + self.y * m.y_axis.z + self.z * m.z_axis.z,
        }
    }
}

/// Lane-wise reciprocal that yields zero wherever `k <= epsilon`, together
/// with the mask of lanes that were usable.
pub fn recip_or_zero(k: Vec4, epsilon: f32) -> (Vec4, BVec4A) {
    let usable = k.cmpgt(Vec4::splat(epsilon));
    let safe = Vec4::select(usable, k, Vec4::ONE);
    (Vec4::select(usable, Vec4::ONE / safe, Vec4::ZERO), usable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn lane_ops_match_scalar_ops() {
        let a = [
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-1.0, 0.5, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(4.0, -2.0, 1.0),
        ];
        let b = Vec3::new(0.3, -0.7, 2.0);
        let m = Mat3::from_cols(
            Vec3::new(1.0, 0.2, 0.0),
            Vec3::new(0.1, 2.0, 0.3),
            Vec3::new(0.0, 0.4, 3.0),
        );

        let wide = Vec3x4::from_lanes(a);
        let crossed = wide.cross(Vec3x4::splat(b));
        let transformed = crossed.transform(&m);
        let dots = transformed.dot(crossed);

        for (i, lane) in a.iter().enumerate() {
            let expected = m * lane.cross(b);
            let actual = transformed.lane(i);
            assert_abs_diff_eq!(actual.x, expected.x, epsilon = 1e-5);
            assert_abs_diff_eq!(actual.y, expected.y, epsilon = 1e-5);
            assert_abs_diff_eq!(actual.z, expected.z, epsilon = 1e-5);
            assert_abs_diff_eq!(dots[i], expected.dot(lane.cross(b)), epsilon = 1e-4);
        }
    }

    #[test]
    fn recip_or_zero_masks_degenerate_lanes() {
        let (inv, usable) = recip_or_zero(Vec4::new(2.0, 0.0, 1e-9, 4.0), 1e-6);
        assert_eq!(inv, Vec4::new(0.5, 0.0, 0.0, 0.25));
        assert_eq!(usable.bitmask(), 0b1001);
    }
}
