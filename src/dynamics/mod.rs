//! Simulation dynamics: integration, solver bodies, constraint rows, and the solver loop.

pub mod contact;
pub mod integrator;
pub mod solver;
pub mod solver_body;
pub mod spherical;

pub use contact::{ContactSettings, LocalContactConstraint};
pub use integrator::Integrator;
pub use solver::{ConstraintSolver, SolveReport};
pub use solver_body::{SolverBody, SolverVec};
pub use spherical::{JointSettings, LocalSphericalConstraint, SwingError, SwingTwistBlock};
