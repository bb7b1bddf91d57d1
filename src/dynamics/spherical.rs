//! Ball-and-socket joint with swing cone and twist limits.
//!
//! The linear block keeps both anchors together through one 3x3 solve. The
//! angular block limits the relative orientation after splitting it into a
//! swing (cone deviation of the frame's Z axis) and a twist about that axis.
//! The swing limit is an ellipse in angle space with semi-axes equal to the
//! X and Y half-angles.

use glam::{Mat3, Quat, Vec2, Vec3};

use crate::core::constraints::{ConstraintObj, SphericalConstraint};
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross_matrix, ellipse_line_intersect, ellipse_point_to_normal, wrap_angle, EPSILON};

use super::solver_body::{pair_mut, SolverBody, SolverVec, MASS_EPSILON};

/// Anchor separation that is never corrected (meters).
pub const LINEAR_SLOP: f32 = 0.005;
/// Limit violation that is never corrected (radians).
pub const ANGULAR_SLOP: f32 = 0.01;
/// Upper bound on the correction speed of the anchor error.
pub const MAX_LINEAR_BIAS: f32 = 5.0;
pub const MAX_ANGULAR_BIAS: f32 = 5.0;

const SWING: usize = 0;
const TWIST: usize = 1;
const LIMIT_FRICTION: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct JointSettings {
    pub dt: f32,
    pub baumgarte: f32,
    pub warm_starting: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SphericalBlock<V: SolverVec> {
    pub r_a: V,
    pub r_b: V,
    pub lambda_sum: V,
    pub bias: V,
    /// Inverse of `K = (mA + mB)I - [rA]x IA [rA]x - [rB]x IB [rB]x`.
    pub constraint_mass: V::Mat,
    pub mass_a: f32,
    pub mass_b: f32,
    pub enforce: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SwingTwistBlock<V: SolverVec> {
    /// Swing, twist, and limit friction row directions.
    pub angular: [V; 3],
    pub angular_ma: [V; 3],
    pub angular_mb: [V; 3],
    pub lambda_sum: [f32; 3],
    pub bias: [f32; 2],
    pub constraint_mass: [f32; 3],
    pub max_sum: f32,
    pub limit_friction: f32,
    pub enforce: [bool; 3],
}

/// Swing state relative to the limit ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingError {
    /// Radians beyond the limit; zero inside the cone.
    pub error: f32,
    pub angle: f32,
    pub limit: f32,
    /// Outward ellipse normal at the swing point, in the joint frame.
    pub axis: Vec3,
}

impl<V: SolverVec> SwingTwistBlock<V> {
    /// Splits `relative` into `(swing, twist)` with `relative = swing * twist`
    /// and the twist about Z.
    pub fn decompose(relative: Quat) -> (Quat, Quat) {
        let relative = if relative.w < 0.0 { -relative } else { relative };
        let len = (relative.z * relative.z + relative.w * relative.w).sqrt();
        let twist = if len < EPSILON {
            Quat::IDENTITY
        } else {
            Quat::from_xyzw(0.0, 0.0, relative.z / len, relative.w / len)
        };
        let swing = relative * twist.conjugate();
        (swing, twist)
    }

    pub fn compute_swing_error(swing: Quat, max_swing_x: f32, max_swing_y: f32) -> SwingError {
        let xy = Vec2::new(swing.x, swing.y);
        let sin_half = xy.length();
        let angle = 2.0 * sin_half.atan2(swing.w.abs());
        let scale = Vec2::new(max_swing_x, max_swing_y);
        if sin_half < EPSILON * EPSILON {
            return SwingError {
                error: 0.0,
                angle,
                limit: scale.min_element(),
                axis: Vec3::ZERO,
            };
        }
        let direction = xy / sin_half * swing.w.signum();
        let limit = ellipse_line_intersect(direction, scale);
        let point = direction * angle;
        let normal = ellipse_point_to_normal(point, scale).unwrap_or(direction);
        SwingError {
            error: (angle - limit).max(0.0),
            angle,
            limit,
            axis: normal.extend(0.0),
        }
    }

    /// Signed twist angle about Z in `[-π, π]`.
    pub fn compute_twist_angle(twist: Quat) -> f32 {
        wrap_angle(2.0 * twist.z.atan2(twist.w))
    }

    fn row_mass(direction: Vec3, inertia_a: &Mat3, inertia_b: &Mat3) -> f32 {
        let k = direction.dot(*inertia_a * direction) + direction.dot(*inertia_b * direction);
        if k > MASS_EPSILON {
            1.0 / k
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalSphericalConstraint<V: SolverVec> {
    pub owner: EntityId,
    pub body_a: usize,
    pub body_b: usize,
    pub linear: SphericalBlock<V>,
    pub angular: SwingTwistBlock<V>,
}

impl<V: SolverVec> LocalSphericalConstraint<V> {
    pub fn first_iteration(
        owner_id: EntityId,
        owner: &SphericalConstraint,
        body_a: usize,
        body_b: usize,
        bodies: &mut [SolverBody<V>],
        settings: &JointSettings,
    ) -> Option<Self> {
        let (a, b) = pair_mut(bodies, body_a, body_b)?;
        let linear = Self::setup_linear(owner, a, b, settings);
        let angular = Self::setup_angular(owner, a, b, settings);

        let mut local = Self {
            owner: owner_id,
            body_a,
            body_b,
            linear,
            angular,
        };

        if settings.warm_starting {
            if local.linear.enforce {
                local.linear.lambda_sum = V::from_vec3(owner.linear_warm_start());
                local.apply_linear(local.linear.lambda_sum, a, b);
            }
            let warm = owner.angular_warm_start();
            for row in 0..3 {
                if !local.angular.enforce[row] {
                    continue;
                }
                let (low, high) = local.row_bounds(row);
                let lambda = warm[row].clamp(low, high);
                local.angular.lambda_sum[row] = lambda;
                local.apply_angular(row, lambda, a, b);
            }
        }

        Some(local)
    }

    fn setup_linear(
        owner: &SphericalConstraint,
        a: &SolverBody<V>,
        b: &SolverBody<V>,
        settings: &JointSettings,
    ) -> SphericalBlock<V> {
        let r_a = a.rotation * owner.local_anchor(ConstraintObj::A);
        let r_b = b.rotation * owner.local_anchor(ConstraintObj::B);

        let ra_x = cross_matrix(r_a);
        let rb_x = cross_matrix(r_b);
        let k = Mat3::IDENTITY * (a.inv_mass + b.inv_mass)
            - ra_x * a.inv_inertia_scalar * ra_x
            - rb_x * b.inv_inertia_scalar * rb_x;
        let enforce = k.determinant().abs() > MASS_EPSILON;
        let constraint_mass = if enforce { k.inverse() } else { Mat3::ZERO };

        let error = (b.position + r_b) - (a.position + r_a);
        let distance = error.length();
        let bias = if distance > LINEAR_SLOP {
            let speed = (settings.baumgarte / settings.dt * (distance - LINEAR_SLOP)).min(MAX_LINEAR_BIAS);
            error / distance * speed
        } else {
            Vec3::ZERO
        };

        SphericalBlock {
            r_a: V::from_vec3(r_a),
            r_b: V::from_vec3(r_b),
            lambda_sum: V::ZERO,
            bias: V::from_vec3(bias),
            constraint_mass: V::mat_from(constraint_mass),
            mass_a: a.inv_mass,
            mass_b: b.inv_mass,
            enforce,
        }
    }

    fn setup_angular(
        owner: &SphericalConstraint,
        a: &SolverBody<V>,
        b: &SolverBody<V>,
        settings: &JointSettings,
    ) -> SwingTwistBlock<V> {
        let (ref_a, ref_b) = owner.angular_references();
        let frame_a = (a.rotation * ref_a).normalize();
        let frame_b = (b.rotation * ref_b).normalize();
        let relative = (frame_a.conjugate() * frame_b).normalize();
        let (swing, twist) = SwingTwistBlock::<V>::decompose(relative);

        let mut directions = [Vec3::ZERO; 3];
        let mut bias = [0.0; 2];
        let mut enforce = [false; 3];
        let bias_for = |error: f32| {
            (settings.baumgarte / settings.dt * (error - ANGULAR_SLOP).max(0.0)).min(MAX_ANGULAR_BIAS)
        };

        let twist_axis = frame_b * Vec3::Z;
        let mut swing_axis = Vec3::ZERO;

        if owner.swing_enabled() {
            let (max_x, max_y) = owner.swing_limits();
            let swing_error = SwingTwistBlock::<V>::compute_swing_error(swing, max_x, max_y);
            if swing_error.error > 0.0 {
                swing_axis = (frame_a * swing_error.axis).normalize_or_zero();
                directions[SWING] = -swing_axis;
                bias[SWING] = bias_for(swing_error.error);
                enforce[SWING] = swing_axis != Vec3::ZERO;
            }
        }

        if owner.twist_enabled() {
            let (min_twist, max_twist) = owner.twist_limits();
            let angle = SwingTwistBlock::<V>::compute_twist_angle(twist);
            if angle > max_twist {
                directions[TWIST] = -twist_axis;
                bias[TWIST] = bias_for(angle - max_twist);
                enforce[TWIST] = true;
            } else if angle < min_twist {
                directions[TWIST] = twist_axis;
                bias[TWIST] = bias_for(min_twist - angle);
                enforce[TWIST] = true;
            }
        }

        if enforce[SWING] && owner.limit_friction() > 0.0 {
            let orthogonal = swing_axis.cross(twist_axis);
            if orthogonal.length_squared() > EPSILON * EPSILON {
                directions[LIMIT_FRICTION] = orthogonal.normalize();
                enforce[LIMIT_FRICTION] = true;
            }
        }

        let mut block = SwingTwistBlock {
            angular: [V::ZERO; 3],
            angular_ma: [V::ZERO; 3],
            angular_mb: [V::ZERO; 3],
            lambda_sum: [0.0; 3],
            bias,
            constraint_mass: [0.0; 3],
            max_sum: owner.max_angular_impulse(),
            limit_friction: owner.limit_friction(),
            enforce,
        };
        for row in 0..3 {
            if !block.enforce[row] {
                continue;
            }
            let d = directions[row];
            let mass = SwingTwistBlock::<V>::row_mass(d, &a.inv_inertia_scalar, &b.inv_inertia_scalar);
            if mass == 0.0 {
                block.enforce[row] = false;
                continue;
            }
            block.angular[row] = V::from_vec3(d);
            block.angular_ma[row] = V::from_vec3(a.inv_inertia_scalar * d);
            block.angular_mb[row] = V::from_vec3(b.inv_inertia_scalar * d);
            block.constraint_mass[row] = mass;
        }
        block
    }

    fn row_bounds(&self, row: usize) -> (f32, f32) {
        let max_sum = self.angular.max_sum;
        if row == LIMIT_FRICTION {
            let bound = (self.angular.limit_friction * self.angular.lambda_sum[SWING]).min(max_sum);
            (-bound, bound)
        } else {
            (0.0, max_sum)
        }
    }

    #[inline]
    fn apply_linear(&self, lambda: V, a: &mut SolverBody<V>, b: &mut SolverBody<V>) {
        let block = &self.linear;
        a.linear -= lambda * block.mass_a;
        a.angular -= a.inv_inertia * block.r_a.cross(lambda);
        b.linear += lambda * block.mass_b;
        b.angular += b.inv_inertia * block.r_b.cross(lambda);
    }

    #[inline]
    fn apply_angular(&self, row: usize, lambda: f32, a: &mut SolverBody<V>, b: &mut SolverBody<V>) {
        a.angular -= self.angular.angular_ma[row] * lambda;
        b.angular += self.angular.angular_mb[row] * lambda;
    }

    fn solve_linear(&mut self, a: &mut SolverBody<V>, b: &mut SolverBody<V>) -> f32 {
        let block = &self.linear;
        let cdot = b.linear + b.angular.cross(block.r_b) - a.linear - a.angular.cross(block.r_a);
        let lambda = block.constraint_mass * -(cdot + block.bias);
        self.linear.lambda_sum += lambda;
        self.apply_linear(lambda, a, b);
        let l = lambda.to_vec3();
        l.x.abs() + l.y.abs() + l.z.abs()
    }

    fn solve_angular(&mut self, a: &mut SolverBody<V>, b: &mut SolverBody<V>) -> f32 {
        let mut change = 0.0;
        for row in 0..3 {
            if !self.angular.enforce[row] {
                continue;
            }
            let direction = self.angular.angular[row];
            let jv = direction.dot(b.angular) - direction.dot(a.angular);
            let target = if row == LIMIT_FRICTION { 0.0 } else { self.angular.bias[row] };
            let lambda = (target - jv) * self.angular.constraint_mass[row];

            let (low, high) = self.row_bounds(row);
            let old_sum = self.angular.lambda_sum[row];
            let new_sum = (old_sum + lambda).clamp(low, high);
            let applied = new_sum - old_sum;
            self.angular.lambda_sum[row] = new_sum;
            self.apply_angular(row, applied, a, b);
            change += applied.abs();
        }
        change
    }

    /// One velocity iteration. Returns the summed absolute impulse change.
    pub fn solve(&mut self, bodies: &mut [SolverBody<V>]) -> f32 {
        let Some((a, b)) = pair_mut(bodies, self.body_a, self.body_b) else {
            return 0.0;
        };
        let mut change = 0.0;
        if self.linear.enforce {
            change += self.solve_linear(a, b);
        }
        change + self.solve_angular(a, b)
    }

    pub fn last_iteration(&self, owner: &mut SphericalConstraint) {
        owner.linear_warm_start = if self.linear.enforce {
            self.linear.lambda_sum.to_vec3()
        } else {
            Vec3::ZERO
        };
        for row in 0..3 {
            owner.angular_warm_start[row] = if self.angular.enforce[row] {
                self.angular.lambda_sum[row]
            } else {
                0.0
            };
        }
    }

    pub fn swing_enforced(&self) -> bool {
        self.angular.enforce[SWING]
    }

    pub fn twist_enforced(&self) -> bool {
        self.angular.enforce[TWIST]
    }

    pub fn swing_bias(&self) -> f32 {
        self.angular.bias[SWING]
    }
}
