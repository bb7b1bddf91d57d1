//! Boundary errors. The simulation itself never fails; these are only
//! returned when input handed to the world violates a precondition.

use crate::utils::allocator::EntityId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    /// Mass must be finite and non-negative (zero marks a static body).
    #[error("invalid mass {mass}: expected a finite, non-negative value")]
    InvalidMass { mass: f32 },

    /// The id does not name a live body.
    #[error("unknown body {0:?}")]
    UnknownBody(EntityId),

    /// The id does not name a live constraint.
    #[error("unknown constraint {0:?}")]
    UnknownConstraint(EntityId),

    /// A joint needs two distinct bodies.
    #[error("joint connects body {0:?} to itself")]
    SelfJoint(EntityId),

    /// Twist range is inverted.
    #[error("invalid twist limits: min {min} > max {max}")]
    InvalidTwistLimits { min: f32, max: f32 },

    /// A configuration field is out of range.
    #[error("invalid solver config: {field} = {value}")]
    InvalidConfig { field: &'static str, value: f32 },
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
