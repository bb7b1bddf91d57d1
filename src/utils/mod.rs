//! Utility helpers including math extensions, the generational arena,
//! logging, profiling, and SIMD helpers.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;
pub mod simd;

pub use allocator::{Arena, EntityId};
pub use math::*;
pub use profiling::PhysicsProfiler;
