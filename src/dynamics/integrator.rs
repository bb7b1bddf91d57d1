use glam::Vec3;

use crate::core::rigidbody::RigidBody;
use crate::utils::allocator::Arena;
use crate::utils::math::angular_velocity_to_quat;

/// Semi-implicit Euler integrator: velocities are advanced before the
/// constraint solve and positions after it.
#[derive(Debug, Clone, Copy)]
pub struct Integrator {
    pub dt: f32,
}

impl Integrator {
    pub fn new(dt: f32) -> Self {
        Self { dt }
    }

    pub fn integrate_velocity(&self, body: &mut RigidBody, gravity: Vec3) {
        if body.is_static() {
            return;
        }

        body.velocity.linear += gravity * body.gravity_scale * self.dt;

        body.velocity.linear *= (1.0 - body.linear_velocity_damping * self.dt).max(0.0);
        body.velocity.angular *= (1.0 - body.angular_velocity_damping * self.dt).max(0.0);
    }

    pub fn integrate_position(&self, body: &mut RigidBody) {
        if body.is_static() {
            return;
        }

        body.transform.position += body.velocity.linear * self.dt;
        let delta = angular_velocity_to_quat(body.velocity.angular, self.dt);
        body.transform.rotation = (delta * body.transform.rotation).normalize();
    }

    pub fn integrate_velocities(&self, bodies: &mut Arena<RigidBody>, gravity: Vec3) {
        for body in bodies.values_mut() {
            self.integrate_velocity(body, gravity);
        }
    }

    pub fn integrate_positions(&self, bodies: &mut Arena<RigidBody>) {
        for body in bodies.values_mut() {
            self.integrate_position(body);
        }
    }
}
