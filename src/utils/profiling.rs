use log::info;
use std::time::Duration;

/// Per-step timing and counters collected by the world.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicsProfiler {
    pub broad_phase_time: Duration,
    pub narrow_phase_time: Duration,
    pub solver_time: Duration,
    pub integrator_time: Duration,
    pub total_frame_time: Duration,

    pub body_count: usize,
    pub candidate_pair_count: usize,
    pub contact_constraint_count: usize,
    pub joint_count: usize,
    pub solver_iterations: u32,
    pub removed_contacts: usize,
}

impl PhysicsProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn share(part: Duration, total_us: f32) -> f32 {
        part.as_micros() as f32 / total_us * 100.0
    }

    /// Writes the profile through `log` at info level.
    pub fn report(&self) {
        let total_us = self.total_frame_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        info!(
            "physics profile: {} bodies, {} pairs, {} contacts, {} joints, {} iterations, {} retired",
            self.body_count,
            self.candidate_pair_count,
            self.contact_constraint_count,
            self.joint_count,
            self.solver_iterations,
            self.removed_contacts
        );
        info!(
            "  total {:.2} ms | broad {:.1}% | narrow {:.1}% | solver {:.1}% | integrate {:.1}%",
            self.total_frame_time.as_secs_f32() * 1000.0,
            Self::share(self.broad_phase_time, total_us),
            Self::share(self.narrow_phase_time, total_us),
            Self::share(self.solver_time, total_us),
            Self::share(self.integrator_time, total_us),
        );
    }
}
