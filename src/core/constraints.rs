//! Persistent constraints. These own every piece of solver state that must
//! survive from one step to the next: manifolds, warm-start impulses and
//! inactivity timers.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::broadphase::BroadphaseHandle;
use crate::collision::contact::Manifold;
use crate::core::types::MaterialPairProperties;
use crate::error::{PhysicsError, PhysicsResult};
use crate::utils::allocator::EntityId;

/// Selects one side of a two-body constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintObj {
    A,
    B,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Constraint {
    Contact(ContactConstraint),
    Spherical(SphericalConstraint),
}

impl Constraint {
    pub fn bodies(&self) -> (EntityId, EntityId) {
        match self {
            Constraint::Contact(c) => (c.body_a, c.body_b),
            Constraint::Spherical(s) => (s.body_a, s.body_b),
        }
    }

    pub fn involves(&self, body: EntityId) -> bool {
        let (a, b) = self.bodies();
        a == body || b == body
    }

    pub fn as_contact(&self) -> Option<&ContactConstraint> {
        match self {
            Constraint::Contact(c) => Some(c),
            Constraint::Spherical(_) => None,
        }
    }

    pub fn as_contact_mut(&mut self) -> Option<&mut ContactConstraint> {
        match self {
            Constraint::Contact(c) => Some(c),
            Constraint::Spherical(_) => None,
        }
    }

    pub fn as_spherical(&self) -> Option<&SphericalConstraint> {
        match self {
            Constraint::Spherical(s) => Some(s),
            Constraint::Contact(_) => None,
        }
    }

    pub fn as_spherical_mut(&mut self) -> Option<&mut SphericalConstraint> {
        match self {
            Constraint::Spherical(s) => Some(s),
            Constraint::Contact(_) => None,
        }
    }
}

/// Contact between two colliding bodies, created when the pair first
/// reports overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConstraint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub manifold: Manifold,
    pub material: MaterialPairProperties,
    /// Broadphase handles of the collider pair this contact came from.
    #[serde(skip)]
    pub instance_a: Option<BroadphaseHandle>,
    #[serde(skip)]
    pub instance_b: Option<BroadphaseHandle>,
    inactive_time: f32,
    should_remove: bool,
}

impl ContactConstraint {
    pub fn new(body_a: EntityId, body_b: EntityId, material: MaterialPairProperties) -> Self {
        Self {
            body_a,
            body_b,
            manifold: Manifold::new(),
            material,
            instance_a: None,
            instance_b: None,
            inactive_time: 0.0,
            should_remove: false,
        }
    }

    pub fn with_instances(
        mut self,
        instance_a: Option<BroadphaseHandle>,
        instance_b: Option<BroadphaseHandle>,
    ) -> Self {
        self.instance_a = instance_a;
        self.instance_b = instance_b;
        self
    }

    pub fn inactive_time(&self) -> f32 {
        self.inactive_time
    }

    pub fn should_remove(&self) -> bool {
        self.should_remove
    }

    /// Advances the inactivity timer by `dt` when the manifold is empty and
    /// resets it otherwise. Flags the constraint once the timer exceeds
    /// `time_to_remove`.
    pub fn update_inactivity(&mut self, dt: f32, time_to_remove: f32) {
        if self.manifold.is_empty() {
            self.inactive_time += dt;
        } else {
            self.inactive_time = 0.0;
        }
        if self.inactive_time > time_to_remove {
            self.should_remove = true;
        }
    }
}

/// Ball-and-socket joint with an elliptical swing cone and a twist range.
///
/// The joint frame's Z axis is the twist axis; swing limits are half-angles
/// about the frame's X and Y axes. A negative limit disables that limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SphericalConstraint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    anchor_a: Vec3,
    anchor_b: Vec3,
    ref_a: Quat,
    ref_b: Quat,
    max_swing_x: f32,
    max_swing_y: f32,
    min_twist: f32,
    max_twist: f32,
    max_angular_impulse: f32,
    limit_friction: f32,
    pub(crate) linear_warm_start: Vec3,
    pub(crate) angular_warm_start: [f32; 3],
}

impl SphericalConstraint {
    pub fn new(body_a: EntityId, body_b: EntityId) -> Self {
        Self {
            body_a,
            body_b,
            anchor_a: Vec3::ZERO,
            anchor_b: Vec3::ZERO,
            ref_a: Quat::IDENTITY,
            ref_b: Quat::IDENTITY,
            max_swing_x: -1.0,
            max_swing_y: -1.0,
            min_twist: 1.0,
            max_twist: -1.0,
            max_angular_impulse: crate::config::DEFAULT_MAX_ANGULAR_IMPULSE,
            limit_friction: 0.0,
            linear_warm_start: Vec3::ZERO,
            angular_warm_start: [0.0; 3],
        }
    }

    pub fn with_anchors(mut self, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        self.anchor_a = anchor_a;
        self.anchor_b = anchor_b;
        self
    }

    pub fn set_local_anchor(&mut self, anchor: Vec3, obj: ConstraintObj) {
        match obj {
            ConstraintObj::A => self.anchor_a = anchor,
            ConstraintObj::B => self.anchor_b = anchor,
        }
    }

    pub fn local_anchor(&self, obj: ConstraintObj) -> Vec3 {
        match obj {
            ConstraintObj::A => self.anchor_a,
            ConstraintObj::B => self.anchor_b,
        }
    }

    /// Orients the joint frame. `frame` is given in A's local space; B's
    /// reference is derived so that the current relative pose is the
    /// neutral pose.
    pub fn set_swing_frame(&mut self, frame: Quat, rotation_a: Quat, rotation_b: Quat) {
        self.ref_a = frame.normalize();
        let world_frame = rotation_a * self.ref_a;
        self.ref_b = (rotation_b.conjugate() * world_frame).normalize();
    }

    pub fn angular_references(&self) -> (Quat, Quat) {
        (self.ref_a, self.ref_b)
    }

    pub fn swing_limits(&self) -> (f32, f32) {
        (self.max_swing_x, self.max_swing_y)
    }

    /// Half-angles in radians about the joint frame's X and Y axes.
    pub fn set_swing_limits(&mut self, max_x: f32, max_y: f32) {
        self.max_swing_x = max_x;
        self.max_swing_y = max_y;
    }

    pub fn twist_limits(&self) -> (f32, f32) {
        (self.min_twist, self.max_twist)
    }

    pub fn set_twist_limits(&mut self, min: f32, max: f32) -> PhysicsResult<()> {
        if min > max {
            log::warn!("rejecting twist limits [{min}, {max}]");
            return Err(PhysicsError::InvalidTwistLimits { min, max });
        }
        self.min_twist = min;
        self.max_twist = max;
        Ok(())
    }

    /// Removes the twist limit.
    pub fn disable_twist_limits(&mut self) {
        self.min_twist = 1.0;
        self.max_twist = -1.0;
    }

    pub fn swing_enabled(&self) -> bool {
        self.max_swing_x >= 0.0 && self.max_swing_y >= 0.0
    }

    pub fn twist_enabled(&self) -> bool {
        self.min_twist <= self.max_twist
    }

    pub fn max_angular_impulse(&self) -> f32 {
        self.max_angular_impulse
    }

    pub fn set_max_angular_impulse(&mut self, max: f32) {
        self.max_angular_impulse = max.max(0.0);
    }

    pub fn limit_friction(&self) -> f32 {
        self.limit_friction
    }

    pub fn set_limit_friction(&mut self, friction: f32) {
        self.limit_friction = friction.max(0.0);
    }

    pub fn linear_warm_start(&self) -> Vec3 {
        self.linear_warm_start
    }

    pub fn angular_warm_start(&self) -> [f32; 3] {
        self.angular_warm_start
    }
}
