use crate::error::{PhysicsError, PhysicsResult};
use crate::utils::allocator::EntityId;
use crate::utils::math::tensor_transform_rotated;

use super::collider::{Collider, ColliderFlags};
use super::types::{MassProperties, Transform, Velocity};
use glam::{Mat3, Vec3};

/// Core rigid body description storing kinematic state and properties.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub id: EntityId,
    pub transform: Transform,
    pub velocity: Velocity,
    pub mass_properties: MassProperties,
    pub collider: Option<Collider>,
    pub gravity_scale: f32,
    is_static: bool,
    pub linear_velocity_damping: f32,
    pub angular_velocity_damping: f32,
    inverse_mass: f32,
    inverse_inertia: Mat3,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            id: EntityId::default(),
            transform: Transform::default(),
            velocity: Velocity::default(),
            mass_properties: MassProperties::default(),
            collider: None,
            gravity_scale: 1.0,
            is_static: false,
            linear_velocity_damping: crate::config::DEFAULT_LINEAR_DAMPING,
            angular_velocity_damping: crate::config::DEFAULT_ANGULAR_DAMPING,
            inverse_mass: 1.0,
            inverse_inertia: Mat3::IDENTITY,
        };
        body.recompute_inverses();
        body
    }
}

impl RigidBody {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A body that never moves and contributes zero inverse mass to every
    /// constraint it takes part in.
    pub fn new_static(transform: Transform) -> Self {
        let mut body = Self {
            transform,
            is_static: true,
            mass_properties: MassProperties::STATIC,
            ..Self::default()
        };
        body.recompute_inverses();
        body
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider);
        self
    }

    /// Sets mass properties, rejecting non-finite or negative masses.
    pub fn with_mass_properties(mut self, props: MassProperties) -> PhysicsResult<Self> {
        self.set_mass_properties(props)?;
        Ok(self)
    }

    pub fn set_velocity(&mut self, linear: Vec3, angular: Vec3) {
        self.velocity.linear = linear;
        self.velocity.angular = angular;
    }

    pub fn apply_impulse(&mut self, impulse: Vec3, position: Vec3) {
        if self.is_static {
            return;
        }

        self.velocity.linear += impulse * self.inverse_mass;
        let torque = (position - self.transform.position).cross(impulse);
        self.velocity.angular += self.world_inverse_inertia() * torque;
    }

    /// Sets mass properties. A zero mass makes the body static.
    pub fn set_mass_properties(&mut self, props: MassProperties) -> PhysicsResult<()> {
        if !props.mass.is_finite() || props.mass < 0.0 {
            log::warn!("rejecting mass {} for body {:?}", props.mass, self.id);
            return Err(PhysicsError::InvalidMass { mass: props.mass });
        }
        self.mass_properties = props;
        if props.is_static() {
            self.make_static();
        }
        self.recompute_inverses();
        Ok(())
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Switches the body between static and dynamic. A dynamic body left
    /// with zero mass falls back to the default mass properties.
    pub fn set_static(&mut self, is_static: bool) {
        if is_static {
            self.make_static();
        } else {
            self.is_static = false;
            if self.mass_properties.is_static() {
                self.mass_properties = MassProperties::default();
            }
            if let Some(collider) = self.collider.as_mut() {
                collider.set_flag(ColliderFlags::STATIC, false);
            }
        }
        self.recompute_inverses();
    }

    fn make_static(&mut self) {
        self.is_static = true;
        self.velocity = Velocity::default();
        if let Some(collider) = self.collider.as_mut() {
            collider.set_flag(ColliderFlags::STATIC, true);
        }
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Inverse inertia in body space.
    pub fn local_inverse_inertia(&self) -> Mat3 {
        self.inverse_inertia
    }

    /// Inverse inertia rotated into world space: `R I⁻¹ Rᵀ`.
    pub fn world_inverse_inertia(&self) -> Mat3 {
        tensor_transform_rotated(self.inverse_inertia, Mat3::from_quat(self.transform.rotation))
    }

    /// Refreshes the collider's world transform and bounding box.
    pub fn update_collider(&mut self) {
        let transform = self.transform;
        if let Some(collider) = self.collider.as_mut() {
            collider.update_model_inst(&transform);
        }
    }

    fn recompute_inverses(&mut self) {
        if self.is_static || self.mass_properties.mass.abs() < f32::EPSILON {
            self.inverse_mass = 0.0;
            self.inverse_inertia = Mat3::ZERO;
            return;
        }
        self.inverse_mass = 1.0 / self.mass_properties.mass;
        let inertia = self.mass_properties.inertia;
        self.inverse_inertia = if inertia.determinant().abs() < f32::EPSILON {
            Mat3::ZERO
        } else {
            inertia.inverse()
        };
    }
}
