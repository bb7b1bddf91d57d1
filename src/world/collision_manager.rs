use crate::collision::broadphase::{
    Broadphase, BroadphaseContext, BroadphaseHandle, GridBroadphase, NoBroadphase, SharedBroadphase,
};
use crate::collision::contact::ContactReport;
use crate::collision::narrowphase::NarrowPhase;
use crate::config::{BroadphaseKind, SolverConfig};
use crate::core::collider::ColliderFlags;
use crate::core::rigidbody::RigidBody;
use crate::utils::allocator::{Arena, EntityId};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Broadphase pair that survived the body and flag filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidatePair {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub handle_a: Option<BroadphaseHandle>,
    pub handle_b: Option<BroadphaseHandle>,
    pub is_trigger: bool,
}

/// Owns the broadphase and turns body colliders into candidate pairs and
/// narrow-phase reports.
pub struct CollisionManager {
    pub broadphase: SharedBroadphase,
    kind: BroadphaseKind,
    cell_size: f32,
    context: BroadphaseContext,
    candidates: Vec<CandidatePair>,
}

impl CollisionManager {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            broadphase: SharedBroadphase::new(Self::make_broadphase(config)),
            kind: config.broadphase,
            cell_size: config.broadphase_cell_size,
            context: BroadphaseContext::new(),
            candidates: Vec::new(),
        }
    }

    fn make_broadphase(config: &SolverConfig) -> Box<dyn Broadphase> {
        match config.broadphase {
            BroadphaseKind::Brute => Box::new(NoBroadphase::new()),
            BroadphaseKind::Grid => Box::new(GridBroadphase::new(config.broadphase_cell_size)),
        }
    }

    /// Whether `config` asks for a different broadphase than the current one.
    pub fn needs_rebuild(&self, config: &SolverConfig) -> bool {
        self.kind != config.broadphase || self.cell_size != config.broadphase_cell_size
    }

    /// Swaps in a fresh broadphase and re-inserts every collider.
    pub fn rebuild(&mut self, config: &SolverConfig, bodies: &mut Arena<RigidBody>) {
        {
            let mut old = self.broadphase.write();
            for body in bodies.values_mut() {
                if let Some(collider) = body.collider.as_mut() {
                    collider.uninitialize(&mut **old);
                }
            }
        }
        self.broadphase = SharedBroadphase::new(Self::make_broadphase(config));
        self.kind = config.broadphase;
        self.cell_size = config.broadphase_cell_size;
        for body in bodies.values_mut() {
            self.register(body);
        }
        log::debug!("broadphase rebuilt as {:?}", self.kind);
    }

    pub fn register(&self, body: &mut RigidBody) {
        let id = body.id;
        let is_static = body.is_static();
        if let Some(collider) = body.collider.as_mut() {
            collider.set_owner(id);
            collider.set_flag(ColliderFlags::STATIC, is_static);
        }
        body.update_collider();
        if let Some(collider) = body.collider.as_mut() {
            collider.initialize(&mut **self.broadphase.write());
        }
    }

    pub fn unregister(&self, body: &mut RigidBody) {
        if let Some(collider) = body.collider.as_mut() {
            collider.uninitialize(&mut **self.broadphase.write());
        }
    }

    /// Recomputes every collider's world pose and pushes the new volumes.
    pub fn sync(&self, bodies: &mut Arena<RigidBody>) {
        let mut broadphase = self.broadphase.write();
        for body in bodies.values_mut() {
            body.update_collider();
            if let Some(collider) = body.collider.as_mut() {
                collider.sync_broadphase(&mut **broadphase);
            }
        }
    }

    /// Queries the broadphase and filters the pairs that can never produce
    /// a contact. The result is sorted by body pair.
    pub fn find_candidates(&mut self, bodies: &Arena<RigidBody>) -> &[CandidatePair] {
        self.broadphase.query_pairs(&mut self.context);
        self.candidates.clear();

        for pair in &self.context.pairs {
            let (first, second) = (pair.a.userdata, pair.b.userdata);
            if first == second {
                continue;
            }
            let (Some(body_first), Some(body_second)) = (bodies.get(first), bodies.get(second)) else {
                continue;
            };
            if body_first.is_static() && body_second.is_static() {
                continue;
            }
            let (Some(collider_first), Some(collider_second)) =
                (body_first.collider.as_ref(), body_second.collider.as_ref())
            else {
                continue;
            };
            if collider_first.get_flag(ColliderFlags::DISABLED) || collider_second.get_flag(ColliderFlags::DISABLED) {
                continue;
            }

            let is_trigger =
                collider_first.get_flag(ColliderFlags::TRIGGER) || collider_second.get_flag(ColliderFlags::TRIGGER);
            let (body_a, body_b) = EntityId::ordered_pair(first, second);
            let (handle_a, handle_b) = if body_a == first {
                (Some(pair.a.handle), Some(pair.b.handle))
            } else {
                (Some(pair.b.handle), Some(pair.a.handle))
            };
            self.candidates.push(CandidatePair {
                body_a,
                body_b,
                handle_a,
                handle_b,
                is_trigger,
            });
        }

        self.candidates.sort();
        self.candidates.dedup_by_key(|c| (c.body_a, c.body_b));
        &self.candidates
    }

    pub fn candidates(&self) -> &[CandidatePair] {
        &self.candidates
    }

    /// Runs the pair tests for the current candidates. Reports come back in
    /// candidate order regardless of how they were computed.
    pub fn narrow_phase(&self, bodies: &Arena<RigidBody>, parallel: bool) -> Vec<Option<ContactReport>> {
        #[cfg(feature = "parallel")]
        if parallel {
            return self
                .candidates
                .par_iter()
                .map(|candidate| Self::collide(bodies, candidate))
                .collect();
        }
        #[cfg(not(feature = "parallel"))]
        let _ = parallel;

        self.candidates
            .iter()
            .map(|candidate| Self::collide(bodies, candidate))
            .collect()
    }

    fn collide(bodies: &Arena<RigidBody>, candidate: &CandidatePair) -> Option<ContactReport> {
        let a = bodies.get(candidate.body_a)?.collider.as_ref()?;
        let b = bodies.get(candidate.body_b)?.collider.as_ref()?;
        NarrowPhase::collide(a, b).filter(|report| !report.points.is_empty())
    }
}
