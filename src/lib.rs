//! Rigid Impulse – sequential-impulse rigid body solver for Rust.
//!
//! The crate is built around a [`PhysicsWorld`] that owns bodies, a
//! broadphase, and persistent constraints. Each step refreshes contact
//! manifolds, warm starts the contact and joint rows from the previous
//! step, iterates them, and retires contacts that stayed apart for too long.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use collision::{
    broadphase::{Broadphase, BroadphaseContext, GridBroadphase, NoBroadphase, SharedBroadphase},
    contact::{ContactReport, Manifold, ReportedPoint},
    queries::{Raycast, RaycastHit, RaycastQuery},
};
pub use config::{BroadphaseKind, SolveBackend, SolverConfig};
pub use crate::core::{
    collider::{Collider, ColliderFlags, ColliderShape},
    constraints::{ConstraintObj, ContactConstraint, SphericalConstraint},
    rigidbody::RigidBody,
    types::{Aabb, MassProperties, Material, Transform, Velocity},
};
pub use dynamics::solver::{ConstraintSolver, SolveReport};
pub use error::{PhysicsError, PhysicsResult};
pub use utils::allocator::{Arena, EntityId};
pub use world::{
    debug_draw::{DebugDraw, DebugRecorder},
    events::{ContactEvent, ContactState},
    PhysicsWorld,
};

/// High-level convenience wrapper that owns a [`PhysicsWorld`].
pub struct PhysicsEngine {
    world: PhysicsWorld,
}

impl PhysicsEngine {
    /// Creates an engine with the given configuration.
    pub fn new(config: SolverConfig) -> PhysicsResult<Self> {
        Ok(Self {
            world: PhysicsWorld::new(config)?,
        })
    }

    /// Adds a rigid body to the world and returns its generated [`EntityId`].
    pub fn add_body(&mut self, body: RigidBody) -> EntityId {
        self.world.add_body(body)
    }

    /// Advances the simulation by the provided delta time.
    pub fn step(&mut self, dt: f32) {
        self.world.step(dt);
    }

    /// Enables or disables parallel execution of the narrow phase.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.world.set_parallel_enabled(enabled);
    }

    /// Returns whether the engine is currently using parallel execution.
    pub fn parallel_enabled(&self) -> bool {
        self.world.parallel_enabled()
    }

    /// Immutable access to a rigid body by id.
    pub fn get_body(&self, id: EntityId) -> Option<&RigidBody> {
        self.world.body(id)
    }

    /// Mutable access to a rigid body by id.
    pub fn get_body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody> {
        self.world.body_mut(id)
    }

    /// Immutable access to the wrapped world.
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Mutable access to the wrapped world.
    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }
}
