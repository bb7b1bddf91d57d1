//! Dense per-step body state the velocity iterations read and write.
//!
//! The solver kernels are generic over [`SolverVec`] so the same rows run
//! either on plain `Vec3`/`Mat3` or on the 16-byte aligned `Vec3A`/`Mat3A`
//! SIMD types. The two instantiations must agree within float tolerance.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use glam::{Mat3, Mat3A, Quat, Vec3, Vec3A, Vec4};

use crate::core::rigidbody::RigidBody;
use crate::utils::simd::{recip_or_zero, Vec3x4};

/// Jacobian terms for one axis across the four points of a manifold.
#[derive(Debug, Clone, Copy)]
pub struct PointRows<V> {
    pub r_cross_a: [V; 4],
    pub r_cross_b: [V; 4],
    pub r_cross_a_inertia: [V; 4],
    pub r_cross_b_inertia: [V; 4],
    /// Inverse of the effective mass, zero where the row is degenerate.
    pub mass: [f32; 4],
    pub usable: [bool; 4],
}

pub trait SolverVec:
    Copy
    + Default
    + Debug
    + Send
    + Sync
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f32, Output = Self>
    + AddAssign
    + SubAssign
{
    type Mat: Copy + Debug + Send + Sync + Mul<Self, Output = Self>;

    const ZERO: Self;

    fn from_vec3(v: Vec3) -> Self;
    fn to_vec3(self) -> Vec3;
    fn mat_from(m: Mat3) -> Self::Mat;
    fn dot(self, other: Self) -> f32;
    fn cross(self, other: Self) -> Self;

    /// Builds the rows for `axis` at up to four points with offsets `r_a` and
    /// `r_b` from the body centers. Lanes at or beyond `count` are left unusable.
    fn point_rows(
        axis: Vec3,
        r_a: &[Vec3; 4],
        r_b: &[Vec3; 4],
        count: usize,
        inv_mass_sum: f32,
        inertia_a: &Mat3,
        inertia_b: &Mat3,
    ) -> PointRows<Self>;
}

/// Rows whose effective mass falls below this are not enforced.
pub const MASS_EPSILON: f32 = 1e-8;

impl SolverVec for Vec3 {
    type Mat = Mat3;

    const ZERO: Self = Vec3::ZERO;

    fn from_vec3(v: Vec3) -> Self {
        v
    }

    fn to_vec3(self) -> Vec3 {
        self
    }

    fn mat_from(m: Mat3) -> Mat3 {
        m
    }

    fn dot(self, other: Self) -> f32 {
        Vec3::dot(self, other)
    }

    fn cross(self, other: Self) -> Self {
        Vec3::cross(self, other)
    }

    fn point_rows(
        axis: Vec3,
        r_a: &[Vec3; 4],
        r_b: &[Vec3; 4],
        count: usize,
        inv_mass_sum: f32,
        inertia_a: &Mat3,
        inertia_b: &Mat3,
    ) -> PointRows<Self> {
        let mut rows = PointRows {
            r_cross_a: [Vec3::ZERO; 4],
            r_cross_b: [Vec3::ZERO; 4],
            r_cross_a_inertia: [Vec3::ZERO; 4],
            r_cross_b_inertia: [Vec3::ZERO; 4],
            mass: [0.0; 4],
            usable: [false; 4],
        };
        for i in 0..count.min(4) {
            let ra_n = r_a[i].cross(axis);
            let rb_n = r_b[i].cross(axis);
            let ia = *inertia_a * ra_n;
            let ib = *inertia_b * rb_n;
            let k = inv_mass_sum + ra_n.dot(ia) + rb_n.dot(ib);
            rows.r_cross_a[i] = ra_n;
            rows.r_cross_b[i] = rb_n;
            rows.r_cross_a_inertia[i] = ia;
            rows.r_cross_b_inertia[i] = ib;
            if k > MASS_EPSILON {
                rows.mass[i] = 1.0 / k;
                rows.usable[i] = true;
            }
        }
        rows
    }
}

impl SolverVec for Vec3A {
    type Mat = Mat3A;

    const ZERO: Self = Vec3A::ZERO;

    fn from_vec3(v: Vec3) -> Self {
        Vec3A::from(v)
    }

    fn to_vec3(self) -> Vec3 {
        Vec3::from(self)
    }

    fn mat_from(m: Mat3) -> Mat3A {
        Mat3A::from(m)
    }

    fn dot(self, other: Self) -> f32 {
        Vec3A::dot(self, other)
    }

    fn cross(self, other: Self) -> Self {
        Vec3A::cross(self, other)
    }

    /// All four points are processed at once in structure-of-arrays form.
    fn point_rows(
        axis: Vec3,
        r_a: &[Vec3; 4],
        r_b: &[Vec3; 4],
        count: usize,
        inv_mass_sum: f32,
        inertia_a: &Mat3,
        inertia_b: &Mat3,
    ) -> PointRows<Self> {
        let axis4 = Vec3x4::splat(axis);
        let ra_n = Vec3x4::from_lanes(*r_a).cross(axis4);
        let rb_n = Vec3x4::from_lanes(*r_b).cross(axis4);
        let ia = ra_n.transform(inertia_a);
        let ib = rb_n.transform(inertia_b);
        let k = Vec4::splat(inv_mass_sum) + ra_n.dot(ia) + rb_n.dot(ib);
        let (mass, usable) = recip_or_zero(k, MASS_EPSILON);
        let usable_bits = usable.bitmask();

        let mut rows = PointRows {
            r_cross_a: [Vec3A::ZERO; 4],
            r_cross_b: [Vec3A::ZERO; 4],
            r_cross_a_inertia: [Vec3A::ZERO; 4],
            r_cross_b_inertia: [Vec3A::ZERO; 4],
            mass: [0.0; 4],
            usable: [false; 4],
        };
        for i in 0..count.min(4) {
            rows.r_cross_a[i] = Vec3A::from(ra_n.lane(i));
            rows.r_cross_b[i] = Vec3A::from(rb_n.lane(i));
            rows.r_cross_a_inertia[i] = Vec3A::from(ia.lane(i));
            rows.r_cross_b_inertia[i] = Vec3A::from(ib.lane(i));
            rows.mass[i] = mass[i];
            rows.usable[i] = usable_bits & (1 << i) != 0;
        }
        rows
    }
}

/// Velocity state of one body for the duration of a solve.
#[derive(Debug, Clone, Copy)]
pub struct SolverBody<V: SolverVec> {
    pub linear: V,
    pub angular: V,
    pub inv_mass: f32,
    /// World-space inverse inertia.
    pub inv_inertia: V::Mat,
    pub inv_inertia_scalar: Mat3,
    pub position: Vec3,
    pub rotation: Quat,
}

impl<V: SolverVec> SolverBody<V> {
    pub fn from_body(body: &RigidBody) -> Self {
        let inv_inertia = body.world_inverse_inertia();
        Self {
            linear: V::from_vec3(body.velocity.linear),
            angular: V::from_vec3(body.velocity.angular),
            inv_mass: body.inverse_mass(),
            inv_inertia: V::mat_from(inv_inertia),
            inv_inertia_scalar: inv_inertia,
            position: body.transform.position,
            rotation: body.transform.rotation,
        }
    }

    pub fn write_back(&self, body: &mut RigidBody) {
        if body.is_static() {
            return;
        }
        body.velocity.linear = self.linear.to_vec3();
        body.velocity.angular = self.angular.to_vec3();
    }
}

/// Mutable access to two distinct entries of a slice.
pub fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> Option<(&mut T, &mut T)> {
    if a == b || a >= items.len() || b >= items.len() {
        return None;
    }
    if a < b {
        let (left, right) = items.split_at_mut(b);
        Some((&mut left[a], &mut right[0]))
    } else {
        let (left, right) = items.split_at_mut(a);
        Some((&mut right[0], &mut left[b]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn wide_rows_match_scalar_rows() {
        let r_a = [
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::ZERO,
        ];
        let r_b = [
            Vec3::new(0.1, 0.4, 0.0),
            Vec3::new(-0.1, 0.4, 0.2),
            Vec3::new(0.3, 0.4, -0.2),
            Vec3::ZERO,
        ];
        let ia = Mat3::from_diagonal(Vec3::new(6.0, 6.0, 6.0));
        let ib = Mat3::from_diagonal(Vec3::new(2.0, 4.0, 3.0));

        let scalar = <Vec3 as SolverVec>::point_rows(Vec3::Y, &r_a, &r_b, 3, 1.5, &ia, &ib);
        let wide = <Vec3A as SolverVec>::point_rows(Vec3::Y, &r_a, &r_b, 3, 1.5, &ia, &ib);

        for i in 0..3 {
            assert_eq!(scalar.usable[i], wide.usable[i]);
            assert_abs_diff_eq!(scalar.mass[i], wide.mass[i], epsilon = 1e-6);
            let diff = scalar.r_cross_a_inertia[i] - wide.r_cross_a_inertia[i].to_vec3();
            assert!(diff.length() < 1e-5);
        }
        assert!(!scalar.usable[3]);
        assert!(!wide.usable[3]);
    }

    #[test]
    fn degenerate_rows_are_unusable() {
        let zero = [Vec3::ZERO; 4];
        let rows = <Vec3A as SolverVec>::point_rows(Vec3::X, &zero, &zero, 4, 0.0, &Mat3::ZERO, &Mat3::ZERO);
        assert!(rows.usable.iter().all(|u| !u));
        assert!(rows.mass.iter().all(|m| *m == 0.0));
    }

    #[test]
    fn pair_mut_rejects_aliasing() {
        let mut items = [1, 2, 3];
        assert!(pair_mut(&mut items, 1, 1).is_none());
        let (a, b) = pair_mut(&mut items, 2, 0).expect("distinct");
        std::mem::swap(a, b);
        assert_eq!(items, [3, 2, 1]);
    }
}
