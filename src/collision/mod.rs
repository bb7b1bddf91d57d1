//! Collision detection modules: broad-phase, narrow-phase, contact manifolds, queries.

pub mod broadphase;
pub mod narrowphase;
pub mod contact;
pub mod queries;

pub use broadphase::{
    Broadphase, BroadphaseContext, BroadphaseHandle, BroadphasePair, BroadphaseResult, GridBroadphase,
    NoBroadphase, SharedBroadphase,
};
pub use contact::{ContactPoint, ContactReport, Manifold, ReportedPoint};
pub use narrowphase::NarrowPhase;
pub use queries::{Raycast, RaycastHit, RaycastQuery};
