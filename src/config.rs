//! Numeric tunables for the solver. There is no global state: a
//! [`SolverConfig`] is handed to the world explicitly and may be swapped at
//! any time between steps.

use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Number of velocity iterations performed per step.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 10;

/// Penetration that is tolerated without correction (meters).
pub const DEFAULT_POSITION_SLOP: f32 = 0.01;

/// Fraction of the remaining penetration corrected per second-normalized step.
pub const DEFAULT_BAUMGARTE: f32 = 0.2;

/// Seconds a contact pair may report zero points before it is retired.
pub const DEFAULT_TIME_TO_REMOVE: f32 = 0.5;

/// Approach speed below which restitution is ignored (m/s).
pub const DEFAULT_RESTITUTION_THRESHOLD: f32 = 1.0;

/// Total impulse change per iteration below which iterating stops.
pub const DEFAULT_EARLY_OUT_THRESHOLD: f32 = 1e-6;

/// Upper bound for any angular-limit impulse sum on a joint.
pub const DEFAULT_MAX_ANGULAR_IMPULSE: f32 = f32::MAX;

/// Default damping applied to linear velocity.
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.0;

/// Default damping applied to angular velocity.
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.0;

/// Default cell size for the broad-phase uniform grid.
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 4.0;

/// Budget used for the slow-step warning (milliseconds).
pub const DEFAULT_FRAME_BUDGET_MS: f32 = 4.0;

/// Selects the implementation of the velocity iteration kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolveBackend {
    #[default]
    Scalar,
    /// Same sequential rows evaluated on 16-byte aligned `glam` SIMD types,
    /// with per-manifold setup batched across four lanes.
    Simd,
}

/// Which broadphase the world builds on construction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum BroadphaseKind {
    /// Brute-force reference that proposes every pair.
    Brute,
    /// Uniform hash grid sized by `broadphase_cell_size`.
    #[default]
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub gravity: [f32; 3],
    pub time_step: f32,
    pub iterations: u32,
    pub position_slop: f32,
    pub baumgarte: f32,
    pub time_to_remove: f32,
    pub restitution_threshold: f32,
    pub early_out_threshold: f32,
    pub warm_starting: bool,
    pub backend: SolveBackend,
    pub broadphase: BroadphaseKind,
    pub broadphase_cell_size: f32,
    pub frame_budget_ms: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            time_step: DEFAULT_TIME_STEP,
            iterations: DEFAULT_SOLVER_ITERATIONS,
            position_slop: DEFAULT_POSITION_SLOP,
            baumgarte: DEFAULT_BAUMGARTE,
            time_to_remove: DEFAULT_TIME_TO_REMOVE,
            restitution_threshold: DEFAULT_RESTITUTION_THRESHOLD,
            early_out_threshold: DEFAULT_EARLY_OUT_THRESHOLD,
            warm_starting: true,
            backend: SolveBackend::Scalar,
            broadphase: BroadphaseKind::Grid,
            broadphase_cell_size: DEFAULT_BROADPHASE_CELL_SIZE,
            frame_budget_ms: DEFAULT_FRAME_BUDGET_MS,
        }
    }
}

impl SolverConfig {
    pub fn with_backend(mut self, backend: SolveBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_broadphase(mut self, kind: BroadphaseKind) -> Self {
        self.broadphase = kind;
        self
    }

    pub fn with_gravity(mut self, gravity: [f32; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    /// Rejects values the solver cannot run with.
    pub fn validate(&self) -> PhysicsResult<()> {
        let positive = [
            ("time_step", self.time_step),
            ("broadphase_cell_size", self.broadphase_cell_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PhysicsError::InvalidConfig { field: name, value });
            }
        }

        let non_negative = [
            ("position_slop", self.position_slop),
            ("baumgarte", self.baumgarte),
            ("time_to_remove", self.time_to_remove),
            ("restitution_threshold", self.restitution_threshold),
            ("early_out_threshold", self.early_out_threshold),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PhysicsError::InvalidConfig { field: name, value });
            }
        }
        Ok(())
    }
}
