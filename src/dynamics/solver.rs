use std::collections::HashMap;

use glam::{Vec3, Vec3A};
use log::{debug, trace};

use crate::{
    collision::broadphase::BroadphaseHandle,
    config::{SolveBackend, SolverConfig},
    core::{
        constraints::{Constraint, ContactConstraint, SphericalConstraint},
        rigidbody::RigidBody,
        types::MaterialPairProperties,
    },
    utils::allocator::{Arena, EntityId},
};

use super::{
    contact::{ContactSettings, LocalContactConstraint},
    solver_body::{SolverBody, SolverVec},
    spherical::{JointSettings, LocalSphericalConstraint},
};

/// Outcome of one [`ConstraintSolver::solve`] call.
#[derive(Debug, Default, Clone)]
pub struct SolveReport {
    pub iterations: u32,
    pub contacts_solved: usize,
    pub joints_solved: usize,
    /// Summed impulse change of the final iteration.
    pub residual: f32,
    pub normal_impulse_sum: f32,
    /// Body pairs of the contact constraints retired this step.
    pub removed: Vec<(EntityId, EntityId)>,
}

/// Owns every persistent constraint and runs the sequential impulse
/// iterations over them.
#[derive(Debug, Default, Clone)]
pub struct ConstraintSolver {
    constraints: Arena<Constraint>,
    pairs: HashMap<(EntityId, EntityId), EntityId>,
}

impl ConstraintSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the contact for the body pair, creating it when absent.
    pub fn get_or_create_contact(
        &mut self,
        body_a: EntityId,
        body_b: EntityId,
        material: MaterialPairProperties,
        instance_a: Option<BroadphaseHandle>,
        instance_b: Option<BroadphaseHandle>,
    ) -> EntityId {
        let key = EntityId::ordered_pair(body_a, body_b);
        if let Some(id) = self.pairs.get(&key) {
            return *id;
        }
        let contact = ContactConstraint::new(body_a, body_b, material).with_instances(instance_a, instance_b);
        let id = self.constraints.insert(Constraint::Contact(contact));
        self.pairs.insert(key, id);
        debug!("contact created between {:?} and {:?}", body_a, body_b);
        id
    }

    pub fn contact_id(&self, body_a: EntityId, body_b: EntityId) -> Option<EntityId> {
        self.pairs.get(&EntityId::ordered_pair(body_a, body_b)).copied()
    }

    pub fn contact(&self, body_a: EntityId, body_b: EntityId) -> Option<&ContactConstraint> {
        let id = self.contact_id(body_a, body_b)?;
        self.constraints.get(id)?.as_contact()
    }

    pub fn contact_by_id_mut(&mut self, id: EntityId) -> Option<&mut ContactConstraint> {
        self.constraints.get_mut(id)?.as_contact_mut()
    }

    pub fn contacts(&self) -> impl Iterator<Item = (EntityId, &ContactConstraint)> + '_ {
        self.constraints
            .iter()
            .filter_map(|(id, constraint)| constraint.as_contact().map(|c| (id, c)))
    }

    pub fn contacts_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut ContactConstraint)> + '_ {
        self.constraints
            .iter_mut()
            .filter_map(|(id, constraint)| constraint.as_contact_mut().map(|c| (id, c)))
    }

    pub fn add_joint(&mut self, joint: SphericalConstraint) -> EntityId {
        debug!("joint created between {:?} and {:?}", joint.body_a, joint.body_b);
        self.constraints.insert(Constraint::Spherical(joint))
    }

    pub fn joint(&self, id: EntityId) -> Option<&SphericalConstraint> {
        self.constraints.get(id)?.as_spherical()
    }

    pub fn joint_mut(&mut self, id: EntityId) -> Option<&mut SphericalConstraint> {
        self.constraints.get_mut(id)?.as_spherical_mut()
    }

    pub fn joints(&self) -> impl Iterator<Item = (EntityId, &SphericalConstraint)> + '_ {
        self.constraints
            .iter()
            .filter_map(|(id, constraint)| constraint.as_spherical().map(|j| (id, j)))
    }

    /// Removes a constraint by id. Contacts are also dropped from the pair index.
    pub fn remove(&mut self, id: EntityId) -> Option<Constraint> {
        let removed = self.constraints.remove(id)?;
        if let Constraint::Contact(contact) = &removed {
            self.pairs
                .remove(&EntityId::ordered_pair(contact.body_a, contact.body_b));
        }
        Some(removed)
    }

    /// Removes every constraint that references `body`.
    pub fn remove_body(&mut self, body: EntityId) -> Vec<Constraint> {
        let doomed: Vec<EntityId> = self
            .constraints
            .iter()
            .filter(|(_, constraint)| constraint.involves(body))
            .map(|(id, _)| id)
            .collect();
        doomed.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn contact_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn joint_count(&self) -> usize {
        self.constraints.len() - self.pairs.len()
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
        self.pairs.clear();
    }

    /// Runs one step of the velocity solve: inactivity bookkeeping, local
    /// constraint construction with warm start, the iterations, write-back,
    /// and retirement of contacts that stayed empty for too long.
    pub fn solve(&mut self, bodies: &mut Arena<RigidBody>, config: &SolverConfig) -> SolveReport {
        for (_, contact) in self.contacts_mut() {
            contact.update_inactivity(config.time_step, config.time_to_remove);
        }

        let mut report = SolveReport::default();
        match config.backend {
            SolveBackend::Scalar => self.run::<Vec3>(bodies, config, &mut report),
            SolveBackend::Simd => self.run::<Vec3A>(bodies, config, &mut report),
        }

        let retired: Vec<EntityId> = self
            .contacts()
            .filter(|(_, contact)| contact.should_remove())
            .map(|(id, _)| id)
            .collect();
        for id in retired {
            if let Some(Constraint::Contact(contact)) = self.remove(id) {
                debug!(
                    "contact between {:?} and {:?} retired after {:.3}s inactive",
                    contact.body_a,
                    contact.body_b,
                    contact.inactive_time()
                );
                report.removed.push((contact.body_a, contact.body_b));
            }
        }
        report
    }

    fn run<V: SolverVec>(&mut self, bodies: &mut Arena<RigidBody>, config: &SolverConfig, report: &mut SolveReport) {
        let contact_settings = ContactSettings {
            dt: config.time_step,
            baumgarte: config.baumgarte,
            position_slop: config.position_slop,
            restitution_threshold: config.restitution_threshold,
            warm_starting: config.warm_starting,
        };
        let joint_settings = JointSettings {
            dt: config.time_step,
            baumgarte: config.baumgarte,
            warm_starting: config.warm_starting,
        };

        let mut dense = DenseBodies::<V>::default();
        let mut contacts: Vec<LocalContactConstraint<V>> = Vec::new();
        let mut joints: Vec<LocalSphericalConstraint<V>> = Vec::new();

        for (id, constraint) in self.constraints.iter() {
            let (id_a, id_b) = constraint.bodies();
            let (Some(slot_a), Some(slot_b)) = (dense.slot(bodies, id_a), dense.slot(bodies, id_b)) else {
                continue;
            };
            match constraint {
                Constraint::Contact(contact) => {
                    if let Some(local) = LocalContactConstraint::first_iteration(
                        id,
                        contact,
                        slot_a,
                        slot_b,
                        &mut dense.bodies,
                        &contact_settings,
                    ) {
                        contacts.push(local);
                    }
                }
                Constraint::Spherical(joint) => {
                    if let Some(local) = LocalSphericalConstraint::first_iteration(
                        id,
                        joint,
                        slot_a,
                        slot_b,
                        &mut dense.bodies,
                        &joint_settings,
                    ) {
                        joints.push(local);
                    }
                }
            }
        }

        report.contacts_solved = contacts.len();
        report.joints_solved = joints.len();

        for iteration in 0..config.iterations {
            let mut change = 0.0;
            for joint in joints.iter_mut() {
                change += joint.solve(&mut dense.bodies);
            }
            for contact in contacts.iter_mut() {
                change += contact.solve(&mut dense.bodies);
            }
            report.iterations = iteration + 1;
            report.residual = change;
            if change < config.early_out_threshold {
                trace!("solver converged after {} iterations", iteration + 1);
                break;
            }
        }

        for local in &contacts {
            report.normal_impulse_sum += local.normal_sums().iter().sum::<f32>();
            if let Some(owner) = self.contact_by_id_mut(local.owner) {
                local.last_iteration(owner);
            }
        }
        for local in &joints {
            if let Some(owner) = self.joint_mut(local.owner) {
                local.last_iteration(owner);
            }
        }

        dense.write_back(bodies);
    }
}

/// Bodies referenced by at least one constraint, copied into a contiguous
/// buffer for the iterations.
struct DenseBodies<V: SolverVec> {
    bodies: Vec<SolverBody<V>>,
    ids: Vec<EntityId>,
    slots: HashMap<EntityId, usize>,
}

impl<V: SolverVec> Default for DenseBodies<V> {
    fn default() -> Self {
        Self {
            bodies: Vec::new(),
            ids: Vec::new(),
            slots: HashMap::new(),
        }
    }
}

impl<V: SolverVec> DenseBodies<V> {
    fn slot(&mut self, arena: &Arena<RigidBody>, id: EntityId) -> Option<usize> {
        if let Some(slot) = self.slots.get(&id) {
            return Some(*slot);
        }
        let body = arena.get(id)?;
        let slot = self.bodies.len();
        self.bodies.push(SolverBody::from_body(body));
        self.ids.push(id);
        self.slots.insert(id, slot);
        Some(slot)
    }

    fn write_back(&self, arena: &mut Arena<RigidBody>) {
        for (id, state) in self.ids.iter().zip(&self.bodies) {
            if let Some(body) = arena.get_mut(*id) {
                state.write_back(body);
            }
        }
    }
}
