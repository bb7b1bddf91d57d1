//! Per-step contact rows built from a persistent [`ContactConstraint`].
//!
//! The normal block is solved first; the friction block then reads the
//! normal running sums of the same iteration to bound its impulses.

use glam::Vec3;

use crate::collision::contact::MAX_CONTACT_POINTS;
use crate::core::constraints::ContactConstraint;
use crate::utils::allocator::EntityId;

use super::solver_body::{pair_mut, SolverBody, SolverVec};

/// Step-constant inputs of the contact rows.
#[derive(Debug, Clone, Copy)]
pub struct ContactSettings {
    pub dt: f32,
    pub baumgarte: f32,
    pub position_slop: f32,
    pub restitution_threshold: f32,
    pub warm_starting: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ContactBlock<V: SolverVec> {
    pub normal: V,
    /// Normal premultiplied by each body's inverse mass.
    pub normal_mass_a: V,
    pub normal_mass_b: V,
    pub r_cross_n_a: [V; 4],
    pub r_cross_n_b: [V; 4],
    pub r_cross_n_a_inertia: [V; 4],
    pub r_cross_n_b_inertia: [V; 4],
    pub penetration_bias: [f32; 4],
    pub contact_mass: [f32; 4],
    pub lambda_sum: [f32; 4],
    pub enforce: [bool; 4],
}

#[derive(Debug, Clone, Copy)]
pub struct FrictionAxisBlock<V: SolverVec> {
    pub axis: V,
    pub linear_a: V,
    pub linear_b: V,
    pub r_cross_axis_a: [V; 4],
    pub r_cross_axis_b: [V; 4],
    pub angular_a: [V; 4],
    pub angular_b: [V; 4],
    pub constraint_mass: [f32; 4],
    pub lambda_sum: [f32; 4],
}

#[derive(Debug, Clone, Copy)]
pub struct FrictionBlock<V: SolverVec> {
    /// Normal running sums the friction bound is taken from.
    pub contact_lambda_sum: [f32; 4],
    pub friction: f32,
    pub axes: [FrictionAxisBlock<V>; 2],
    pub enforce: [bool; 4],
}

#[derive(Debug, Clone)]
pub struct LocalContactConstraint<V: SolverVec> {
    pub owner: EntityId,
    pub body_a: usize,
    pub body_b: usize,
    pub count: usize,
    pub contact: ContactBlock<V>,
    pub friction: FrictionBlock<V>,
}

fn empty_axis<V: SolverVec>() -> FrictionAxisBlock<V> {
    FrictionAxisBlock {
        axis: V::ZERO,
        linear_a: V::ZERO,
        linear_b: V::ZERO,
        r_cross_axis_a: [V::ZERO; 4],
        r_cross_axis_b: [V::ZERO; 4],
        angular_a: [V::ZERO; 4],
        angular_b: [V::ZERO; 4],
        constraint_mass: [0.0; 4],
        lambda_sum: [0.0; 4],
    }
}

impl<V: SolverVec> LocalContactConstraint<V> {
    /// Builds the rows for `owner`, computes biases, and applies the warm
    /// start impulses stored in the manifold.
    pub fn first_iteration(
        owner_id: EntityId,
        owner: &ContactConstraint,
        body_a: usize,
        body_b: usize,
        bodies: &mut [SolverBody<V>],
        settings: &ContactSettings,
    ) -> Option<Self> {
        let manifold = &owner.manifold;
        let count = manifold.len().min(MAX_CONTACT_POINTS);
        if count == 0 {
            return None;
        }
        let (a, b) = pair_mut(bodies, body_a, body_b)?;

        let normal = manifold.normal();
        let tangents = manifold.tangents();
        let mut r_a = [Vec3::ZERO; 4];
        let mut r_b = [Vec3::ZERO; 4];
        for (i, point) in manifold.points().iter().take(count).enumerate() {
            r_a[i] = point.world_a - a.position;
            r_b[i] = point.world_b - b.position;
        }
        let inv_mass_sum = a.inv_mass + b.inv_mass;

        let rows = V::point_rows(
            normal,
            &r_a,
            &r_b,
            count,
            inv_mass_sum,
            &a.inv_inertia_scalar,
            &b.inv_inertia_scalar,
        );

        let normal_v = V::from_vec3(normal);
        let mut contact = ContactBlock {
            normal: normal_v,
            normal_mass_a: normal_v * a.inv_mass,
            normal_mass_b: normal_v * b.inv_mass,
            r_cross_n_a: rows.r_cross_a,
            r_cross_n_b: rows.r_cross_b,
            r_cross_n_a_inertia: rows.r_cross_a_inertia,
            r_cross_n_b_inertia: rows.r_cross_b_inertia,
            penetration_bias: [0.0; 4],
            contact_mass: rows.mass,
            lambda_sum: [0.0; 4],
            enforce: rows.usable,
        };

        let mut axes = [empty_axis::<V>(), empty_axis::<V>()];
        for (axis_block, tangent) in axes.iter_mut().zip(tangents) {
            let tangent_rows = V::point_rows(
                tangent,
                &r_a,
                &r_b,
                count,
                inv_mass_sum,
                &a.inv_inertia_scalar,
                &b.inv_inertia_scalar,
            );
            let axis = V::from_vec3(tangent);
            *axis_block = FrictionAxisBlock {
                axis,
                linear_a: axis * a.inv_mass,
                linear_b: axis * b.inv_mass,
                r_cross_axis_a: tangent_rows.r_cross_a,
                r_cross_axis_b: tangent_rows.r_cross_b,
                angular_a: tangent_rows.r_cross_a_inertia,
                angular_b: tangent_rows.r_cross_b_inertia,
                constraint_mass: tangent_rows.mass,
                lambda_sum: [0.0; 4],
            };
        }
        let mut friction = FrictionBlock {
            contact_lambda_sum: [0.0; 4],
            friction: owner.material.friction.max(0.0),
            axes,
            enforce: [false; 4],
        };

        let restitution = owner.material.restitution.max(0.0);
        for (i, point) in manifold.points().iter().take(count).enumerate() {
            if !contact.enforce[i] {
                continue;
            }
            let positional = settings.baumgarte / settings.dt
                * (point.penetration - settings.position_slop).max(0.0);
            let approach = -Self::relative_velocity(
                a,
                b,
                contact.normal,
                contact.r_cross_n_a[i],
                contact.r_cross_n_b[i],
            );
            let bounce = if approach > settings.restitution_threshold {
                restitution * approach
            } else {
                0.0
            };
            contact.penetration_bias[i] = positional.max(bounce);
            friction.enforce[i] = friction.axes[0].constraint_mass[i] > 0.0
                && friction.axes[1].constraint_mass[i] > 0.0;
        }

        let mut local = Self {
            owner: owner_id,
            body_a,
            body_b,
            count,
            contact,
            friction,
        };

        if settings.warm_starting {
            for (i, point) in manifold.points().iter().take(count).enumerate() {
                if local.contact.enforce[i] {
                    local.contact.lambda_sum[i] = point.warm_contact.max(0.0);
                    local.apply_contact(i, point.warm_contact.max(0.0), a, b);
                }
                if local.friction.enforce[i] {
                    for axis in 0..2 {
                        local.friction.axes[axis].lambda_sum[i] = point.warm_friction[axis];
                        local.apply_friction(axis, i, point.warm_friction[axis], a, b);
                    }
                }
            }
            local.friction.contact_lambda_sum = local.contact.lambda_sum;
        }

        Some(local)
    }

    /// Relative velocity of B with respect to A along a row.
    #[inline]
    fn relative_velocity(
        a: &SolverBody<V>,
        b: &SolverBody<V>,
        axis: V,
        r_cross_a: V,
        r_cross_b: V,
    ) -> f32 {
        axis.dot(b.linear) + r_cross_b.dot(b.angular) - axis.dot(a.linear) - r_cross_a.dot(a.angular)
    }

    #[inline]
    fn apply_contact(&self, i: usize, lambda: f32, a: &mut SolverBody<V>, b: &mut SolverBody<V>) {
        let block = &self.contact;
        a.linear -= block.normal_mass_a * lambda;
        a.angular -= block.r_cross_n_a_inertia[i] * lambda;
        b.linear += block.normal_mass_b * lambda;
        b.angular += block.r_cross_n_b_inertia[i] * lambda;
    }

    #[inline]
    fn apply_friction(
        &self,
        axis: usize,
        i: usize,
        lambda: f32,
        a: &mut SolverBody<V>,
        b: &mut SolverBody<V>,
    ) {
        let block = &self.friction.axes[axis];
        a.linear -= block.linear_a * lambda;
        a.angular -= block.angular_a[i] * lambda;
        b.linear += block.linear_b * lambda;
        b.angular += block.angular_b[i] * lambda;
    }

    fn solve_contact(&mut self, i: usize, a: &mut SolverBody<V>, b: &mut SolverBody<V>) -> f32 {
        let block = &self.contact;
        let jv = Self::relative_velocity(a, b, block.normal, block.r_cross_n_a[i], block.r_cross_n_b[i]);
        let lambda = (block.penetration_bias[i] - jv) * block.contact_mass[i];

        let old_sum = block.lambda_sum[i];
        let new_sum = (old_sum + lambda).max(0.0);
        let applied = new_sum - old_sum;
        self.contact.lambda_sum[i] = new_sum;
        self.apply_contact(i, applied, a, b);
        applied.abs()
    }

    /// Both tangent rows of a point solved together; their running sums are
    /// clamped as one vector to the friction cone of the normal sum.
    fn solve_friction(&mut self, i: usize, a: &mut SolverBody<V>, b: &mut SolverBody<V>) -> f32 {
        let mut lambdas = [0.0_f32; 2];
        for (axis, lambda) in lambdas.iter_mut().enumerate() {
            let block = &self.friction.axes[axis];
            let jv = Self::relative_velocity(
                a,
                b,
                block.axis,
                block.r_cross_axis_a[i],
                block.r_cross_axis_b[i],
            );
            *lambda = -jv * block.constraint_mass[i];
        }

        let old = [
            self.friction.axes[0].lambda_sum[i],
            self.friction.axes[1].lambda_sum[i],
        ];
        let mut new = [old[0] + lambdas[0], old[1] + lambdas[1]];
        let max_sum = self.friction.friction * self.friction.contact_lambda_sum[i];
        let magnitude = (new[0] * new[0] + new[1] * new[1]).sqrt();
        if magnitude > max_sum {
            let scale = if magnitude > 0.0 { max_sum / magnitude } else { 0.0 };
            new = [new[0] * scale, new[1] * scale];
        }

        let mut change = 0.0;
        for axis in 0..2 {
            let applied = new[axis] - old[axis];
            self.friction.axes[axis].lambda_sum[i] = new[axis];
            self.apply_friction(axis, i, applied, a, b);
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
        for i in 0..self.count {
            if self.contact.enforce[i] {
                change += self.solve_contact(i, a, b);
            }
        }
        self.friction.contact_lambda_sum = self.contact.lambda_sum;
        for i in 0..self.count {
            if self.friction.enforce[i] {
                change += self.solve_friction(i, a, b);
            }
        }
        change
    }

    /// Stores the running sums in the manifold for the next step's warm start.
    pub fn last_iteration(&self, owner: &mut ContactConstraint) {
        for (i, point) in owner
            .manifold
            .points_mut()
            .iter_mut()
            .take(self.count)
            .enumerate()
        {
            point.warm_contact = if self.contact.enforce[i] {
                self.contact.lambda_sum[i]
            } else {
                0.0
            };
            point.warm_friction = if self.friction.enforce[i] {
                [
                    self.friction.axes[0].lambda_sum[i],
                    self.friction.axes[1].lambda_sum[i],
                ]
            } else {
                [0.0; 2]
            };
        }
    }

    pub fn normal_sums(&self) -> &[f32] {
        &self.contact.lambda_sum[..self.count]
    }

    /// Magnitude of the tangential running sum at point `i`.
    pub fn friction_magnitude(&self, i: usize) -> f32 {
        let x = self.friction.axes[0].lambda_sum[i];
        let y = self.friction.axes[1].lambda_sum[i];
        (x * x + y * y).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::contact::{ContactReport, ReportedPoint};
    use crate::core::rigidbody::RigidBody;
    use crate::core::types::{MassProperties, MaterialPairProperties, Transform};
    use glam::Vec3A;

    fn settings() -> ContactSettings {
        ContactSettings {
            dt: 1.0 / 60.0,
            baumgarte: 0.2,
            position_slop: 0.01,
            restitution_threshold: 1.0,
            warm_starting: true,
        }
    }

    fn resting_setup<V: SolverVec>(
        lateral: Vec3,
    ) -> (ContactConstraint, Vec<SolverBody<V>>) {
        let ground = RigidBody::new_static(Transform::default());
        let mut crate_body = RigidBody::default()
            .with_mass_properties(MassProperties::solid_box(Vec3::splat(0.5), 1.0))
            .expect("valid mass")
            .with_transform(Transform::from_position(Vec3::new(0.0, 0.49, 0.0)));
        crate_body.velocity.linear = Vec3::new(lateral.x, -2.0, lateral.z);

        let mut owner = ContactConstraint::new(
            EntityId::from_index(0),
            EntityId::from_index(1),
            MaterialPairProperties {
                friction: 0.5,
                restitution: 0.0,
            },
        );
        let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
        let report = ContactReport {
            normal: Vec3::Y,
            points: corners
                .iter()
                .enumerate()
                .map(|(i, (x, z))| ReportedPoint {
                    world_a: Vec3::new(*x, 0.0, *z),
                    world_b: Vec3::new(*x, -0.01, *z),
                    penetration: 0.01,
                    feature_id: i as u64,
                })
                .collect(),
        };
        owner
            .manifold
            .refresh(&report, &ground.transform, &crate_body.transform);
        let bodies = vec![
            SolverBody::<V>::from_body(&ground),
            SolverBody::<V>::from_body(&crate_body),
        ];
        (owner, bodies)
    }

    fn run<V: SolverVec>(lateral: Vec3, iterations: usize) -> (LocalContactConstraint<V>, Vec<SolverBody<V>>) {
        let (owner, mut bodies) = resting_setup::<V>(lateral);
        let mut local = LocalContactConstraint::first_iteration(
            EntityId::from_index(2),
            &owner,
            0,
            1,
            &mut bodies,
            &settings(),
        )
        .expect("manifold has points");
        for _ in 0..iterations {
            local.solve(&mut bodies);
        }
        (local, bodies)
    }

    #[test]
    fn normal_sums_never_negative_and_stop_approach() {
        let (local, bodies) = run::<Vec3>(Vec3::ZERO, 20);
        assert!(local.normal_sums().iter().all(|s| *s >= 0.0));
        assert!(bodies[1].linear.y > -1e-3);
    }

    #[test]
    fn friction_stays_inside_cone() {
        let (local, _) = run::<Vec3>(Vec3::new(8.0, 0.0, -3.0), 10);
        for i in 0..local.count {
            let bound = local.friction.friction * local.contact.lambda_sum[i];
            assert!(local.friction_magnitude(i) <= bound + 1e-5);
        }
    }

    #[test]
    fn simd_rows_match_scalar_rows() {
        let (scalar, scalar_bodies) = run::<Vec3>(Vec3::new(1.0, 0.0, 0.5), 8);
        let (wide, wide_bodies) = run::<Vec3A>(Vec3::new(1.0, 0.0, 0.5), 8);
        for i in 0..scalar.count {
            assert!((scalar.contact.lambda_sum[i] - wide.contact.lambda_sum[i]).abs() < 1e-4);
        }
        let diff = scalar_bodies[1].linear - wide_bodies[1].linear.to_vec3();
        assert!(diff.length() < 1e-4);
    }

    #[test]
    fn static_pair_points_are_not_enforced() {
        let mut owner = ContactConstraint::new(
            EntityId::from_index(0),
            EntityId::from_index(1),
            MaterialPairProperties::default(),
        );
        let report = ContactReport {
            normal: Vec3::Y,
            points: vec![ReportedPoint {
                world_a: Vec3::ZERO,
                world_b: Vec3::ZERO,
                penetration: 0.1,
                feature_id: 0,
            }],
        };
        let identity = Transform::default();
        owner.manifold.refresh(&report, &identity, &identity);
        let ground = RigidBody::new_static(identity);
        let mut bodies = vec![
            SolverBody::<Vec3>::from_body(&ground),
            SolverBody::<Vec3>::from_body(&ground),
        ];
        let mut local = LocalContactConstraint::first_iteration(
            EntityId::from_index(2),
            &owner,
            0,
            1,
            &mut bodies,
            &settings(),
        )
        .expect("manifold has points");
        assert!(!local.contact.enforce[0]);
        assert_eq!(local.solve(&mut bodies), 0.0);
    }
}
