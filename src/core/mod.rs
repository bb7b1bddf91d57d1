//! Core types describing physics entities, components, and shared data.

pub mod types;
pub mod rigidbody;
pub mod collider;
pub mod constraints;

pub use types::{Aabb, MassProperties, Material, MaterialPairProperties, MixingMode, Transform, Velocity};
pub use rigidbody::RigidBody;
pub use collider::{Collider, ColliderFlags, ColliderShape, ShapeKind};
pub use constraints::{Constraint, ConstraintObj, ContactConstraint, SphericalConstraint};
