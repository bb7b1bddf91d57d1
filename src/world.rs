use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use crate::{
    collision::{
        broadphase::{BroadphaseContext, SharedBroadphase},
        contact::ContactReport,
        queries::{Raycast, RaycastHit, RaycastQuery},
    },
    config::SolverConfig,
    core::{
        collider::ColliderFlags,
        constraints::{Constraint, ConstraintObj, ContactConstraint, SphericalConstraint},
        rigidbody::RigidBody,
        types::{Aabb, Transform},
    },
    dynamics::{integrator::Integrator, solver::ConstraintSolver},
    error::{PhysicsError, PhysicsResult},
    utils::{
        allocator::{Arena, EntityId},
        logging::{warn_if_frame_budget_exceeded, ScopedTimer},
        profiling::PhysicsProfiler,
    },
};
use glam::{Quat, Vec3};
use log::debug;

pub mod collision_manager;
pub mod debug_draw;
pub mod events;

use collision_manager::CollisionManager;
use debug_draw::{DebugDraw, AABB_COLOR, CONTACT_COLOR, JOINT_COLOR, NORMAL_COLOR, NORMAL_LENGTH};
use events::{ContactEvent, ContactState, EventTracker};

/// Central simulation container orchestrating all subsystems.
pub struct PhysicsWorld {
    bodies: Arena<RigidBody>,
    solver: ConstraintSolver,
    collision: CollisionManager,
    integrator: Integrator,
    config: SolverConfig,
    time_accumulated: f32,
    events: EventTracker,
    profiler: PhysicsProfiler,
    parallel_enabled: bool,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        let config = SolverConfig::default();
        Self {
            bodies: Arena::new(),
            solver: ConstraintSolver::new(),
            collision: CollisionManager::new(&config),
            integrator: Integrator::new(config.time_step),
            config,
            time_accumulated: 0.0,
            events: EventTracker::default(),
            profiler: PhysicsProfiler::default(),
            parallel_enabled: false,
        }
    }
}

impl PhysicsWorld {
    pub fn new(config: SolverConfig) -> PhysicsResult<Self> {
        config.validate()?;
        let mut world = Self::default();
        world.collision = CollisionManager::new(&config);
        world.integrator = Integrator::new(config.time_step);
        world.config = config;
        Ok(world)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replaces the configuration. A change of broadphase kind or cell size
    /// rebuilds the broadphase with every collider re-inserted.
    pub fn set_config(&mut self, config: SolverConfig) -> PhysicsResult<()> {
        config.validate()?;
        if self.collision.needs_rebuild(&config) {
            self.collision.rebuild(&config, &mut self.bodies);
        }
        self.integrator = Integrator::new(config.time_step);
        self.config = config;
        Ok(())
    }

    /// Enables rayon for the narrow phase. Has no effect without the
    /// `parallel` feature.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel_enabled = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    pub fn profiler(&self) -> &PhysicsProfiler {
        &self.profiler
    }

    pub fn broadphase(&self) -> &SharedBroadphase {
        &self.collision.broadphase
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contact_count(&self) -> usize {
        self.solver.contact_count()
    }

    pub fn joint_count(&self) -> usize {
        self.solver.joint_count()
    }

    pub fn bodies(&self) -> impl Iterator<Item = (EntityId, &RigidBody)> + '_ {
        self.bodies.iter()
    }

    /// Inserts a body, assigns its id, and registers its collider with the
    /// broadphase.
    pub fn add_body(&mut self, body: RigidBody) -> EntityId {
        let id = self.bodies.insert_with(|id| {
            let mut body = body;
            body.id = id;
            body
        });
        if let Some(stored) = self.bodies.get_mut(id) {
            self.collision.register(stored);
        }
        debug!("body {:?} added", id);
        id
    }

    /// Removes a body together with its broadphase entry and every
    /// constraint that references it. Touching pairs report `Ended`.
    pub fn remove_body(&mut self, id: EntityId) -> Option<RigidBody> {
        let mut body = self.bodies.remove(id)?;
        self.collision.unregister(&mut body);
        let retired = self.solver.remove_body(id);
        self.events.retire_body(id);
        debug!("body {:?} removed with {} constraints", id, retired.len());
        Some(body)
    }

    pub fn body(&self, id: EntityId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    /// Mutable access to a body. Transform edits reach the broadphase at the
    /// start of the next step; use [`set_transform`](Self::set_transform) to
    /// apply them immediately.
    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    pub fn set_transform(&mut self, id: EntityId, transform: Transform) -> bool {
        let Some(body) = self.bodies.get_mut(id) else {
            return false;
        };
        body.transform = transform;
        body.update_collider();
        if let Some(collider) = body.collider.as_mut() {
            collider.sync_broadphase(&mut **self.collision.broadphase.write());
        }
        true
    }

    pub fn add_spherical_joint(&mut self, joint: SphericalConstraint) -> PhysicsResult<EntityId> {
        if joint.body_a == joint.body_b {
            log::warn!("rejecting joint from {:?} to itself", joint.body_a);
            return Err(PhysicsError::SelfJoint(joint.body_a));
        }
        for body in [joint.body_a, joint.body_b] {
            if !self.bodies.contains(body) {
                log::warn!("rejecting joint on unknown body {:?}", body);
                return Err(PhysicsError::UnknownBody(body));
            }
        }
        Ok(self.solver.add_joint(joint))
    }

    pub fn joint(&self, id: EntityId) -> Option<&SphericalConstraint> {
        self.solver.joint(id)
    }

    pub fn joint_mut(&mut self, id: EntityId) -> Option<&mut SphericalConstraint> {
        self.solver.joint_mut(id)
    }

    /// Orients a joint's frame, given in body A's local space, so that the
    /// bodies' current relative pose becomes the neutral pose.
    pub fn set_joint_frame(&mut self, id: EntityId, frame: Quat) -> PhysicsResult<()> {
        let (body_a, body_b) = self
            .solver
            .joint(id)
            .map(|joint| (joint.body_a, joint.body_b))
            .ok_or(PhysicsError::UnknownConstraint(id))?;
        let rotation_a = self.bodies.get(body_a).ok_or(PhysicsError::UnknownBody(body_a))?.transform.rotation;
        let rotation_b = self.bodies.get(body_b).ok_or(PhysicsError::UnknownBody(body_b))?.transform.rotation;
        if let Some(joint) = self.solver.joint_mut(id) {
            joint.set_swing_frame(frame, rotation_a, rotation_b);
        }
        Ok(())
    }

    pub fn remove_joint(&mut self, id: EntityId) -> Option<SphericalConstraint> {
        self.solver.joint(id)?;
        match self.solver.remove(id)? {
            Constraint::Spherical(joint) => Some(joint),
            Constraint::Contact(_) => None,
        }
    }

    pub fn contact(&self, body_a: EntityId, body_b: EntityId) -> Option<&ContactConstraint> {
        self.solver.contact(body_a, body_b)
    }

    pub fn contact_states(&self) -> Vec<ContactState> {
        self.solver
            .contacts()
            .map(|(_, contact)| ContactState {
                body_a: contact.body_a,
                body_b: contact.body_b,
                point_count: contact.manifold.len(),
                normal_impulse: contact.manifold.total_normal_impulse(),
                inactive_time: contact.inactive_time(),
            })
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<ContactEvent> {
        self.events.drain()
    }

    /// Advances the simulation using a fixed timestep accumulator.
    pub fn step(&mut self, dt: f32) {
        self.time_accumulated += dt;

        while self.time_accumulated >= self.config.time_step {
            self.time_accumulated -= self.config.time_step;
            self.tick();
        }
    }

    /// Runs exactly one fixed step.
    pub fn tick(&mut self) {
        let frame_start = Instant::now();
        self.profiler.reset();
        let gravity = Vec3::from_array(self.config.gravity);

        {
            let _timer = ScopedTimer::accumulate("integrator", &mut self.profiler.integrator_time);
            self.integrator.integrate_velocities(&mut self.bodies, gravity);
        }

        {
            let _timer = ScopedTimer::accumulate("broadphase::pairs", &mut self.profiler.broad_phase_time);
            self.collision.sync(&mut self.bodies);
            self.profiler.candidate_pair_count = self.collision.find_candidates(&self.bodies).len();
        }

        let reports = {
            let _timer = ScopedTimer::accumulate("narrowphase", &mut self.profiler.narrow_phase_time);
            self.collision.narrow_phase(&self.bodies, self.parallel_enabled)
        };
        self.update_manifolds(reports);

        let report = {
            let _timer = ScopedTimer::accumulate("solver::solve", &mut self.profiler.solver_time);
            self.solver.solve(&mut self.bodies, &self.config)
        };

        {
            let _timer = ScopedTimer::accumulate("integrator", &mut self.profiler.integrator_time);
            self.integrator.integrate_positions(&mut self.bodies);
            self.collision.sync(&mut self.bodies);
        }

        self.profiler.body_count = self.bodies.len();
        self.profiler.contact_constraint_count = self.solver.contact_count();
        self.profiler.joint_count = self.solver.joint_count();
        self.profiler.solver_iterations = report.iterations;
        self.profiler.removed_contacts = report.removed.len();
        self.profiler.total_frame_time = frame_start.elapsed();
        if warn_if_frame_budget_exceeded(self.profiler.total_frame_time, self.config.frame_budget_ms) {
            self.profiler.report();
        }
    }

    /// Applies narrow-phase reports in candidate order, clears the manifolds
    /// of pairs that were not reported, and queues begin/end events.
    fn update_manifolds(&mut self, reports: Vec<Option<ContactReport>>) {
        let mut touching = BTreeSet::new();
        let mut reported = HashSet::new();

        for (candidate, report) in self.collision.candidates().iter().zip(reports) {
            let Some(report) = report else {
                continue;
            };
            if candidate.is_trigger {
                touching.insert((candidate.body_a, candidate.body_b));
                continue;
            }
            let (Some(body_a), Some(body_b)) = (self.bodies.get(candidate.body_a), self.bodies.get(candidate.body_b))
            else {
                continue;
            };
            let (Some(collider_a), Some(collider_b)) = (body_a.collider.as_ref(), body_b.collider.as_ref()) else {
                continue;
            };
            let material = collider_a.material().combine_with(collider_b.material());
            let (transform_a, transform_b) = (body_a.transform, body_b.transform);

            let id = self.solver.get_or_create_contact(
                candidate.body_a,
                candidate.body_b,
                material,
                candidate.handle_a,
                candidate.handle_b,
            );
            if let Some(contact) = self.solver.contact_by_id_mut(id) {
                contact.material = material;
                contact.manifold.refresh(&report, &transform_a, &transform_b);
            }
            reported.insert(id);
        }

        for (id, contact) in self.solver.contacts_mut() {
            if !reported.contains(&id) {
                contact.manifold.clear();
            }
            if !contact.manifold.is_empty() {
                touching.insert(EntityId::ordered_pair(contact.body_a, contact.body_b));
            }
        }

        self.events.update(touching);
    }

    /// Closest hit along the ray among enabled colliders.
    pub fn raycast(&self, query: &RaycastQuery) -> Option<RaycastHit> {
        self.raycast_all(query).into_iter().next()
    }

    /// Every hit along the ray, nearest first.
    pub fn raycast_all(&self, query: &RaycastQuery) -> Vec<RaycastHit> {
        let mut context = BroadphaseContext::new();
        self.collision
            .broadphase
            .query_raycast(query.origin, query.direction, &mut context);

        let mut hits: Vec<RaycastHit> = context
            .results
            .iter()
            .filter_map(|result| {
                let collider = self.bodies.get(result.userdata)?.collider.as_ref()?;
                if collider.get_flag(ColliderFlags::DISABLED) {
                    return None;
                }
                Raycast::ray_collider(query, collider)
            })
            .filter(|hit| hit.distance <= query.max_distance)
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Bodies whose collider bounds overlap `volume`, in id order.
    pub fn query_volume(&self, volume: &Aabb) -> Vec<EntityId> {
        let mut context = BroadphaseContext::new();
        self.collision.broadphase.query_volume(volume, &mut context);

        let mut ids: Vec<EntityId> = context
            .results
            .iter()
            .filter(|result| {
                self.bodies
                    .get(result.userdata)
                    .and_then(|body| body.collider.as_ref())
                    .is_some_and(|collider| collider.aabb().overlaps(volume))
            })
            .map(|result| result.userdata)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Emits collider bounds, contact points with normals, and joint anchors.
    pub fn debug_draw(&self, draw: &mut dyn DebugDraw) {
        for body in self.bodies.values() {
            if let Some(collider) = body.collider.as_ref() {
                draw.draw_aabb(collider.aabb(), AABB_COLOR);
            }
        }

        for (_, contact) in self.solver.contacts() {
            let normal = contact.manifold.normal();
            for point in contact.manifold.points() {
                draw.draw_point(point.world_b, 0.05, CONTACT_COLOR);
                draw.draw_line(point.world_b, point.world_b + normal * NORMAL_LENGTH, NORMAL_COLOR);
            }
        }

        for (_, joint) in self.solver.joints() {
            let (Some(a), Some(b)) = (self.bodies.get(joint.body_a), self.bodies.get(joint.body_b)) else {
                continue;
            };
            let anchor_a = a.transform.transform_point(joint.local_anchor(ConstraintObj::A));
            let anchor_b = b.transform.transform_point(joint.local_anchor(ConstraintObj::B));
            draw.draw_line(a.transform.position, anchor_a, JOINT_COLOR);
            draw.draw_line(b.transform.position, anchor_b, JOINT_COLOR);
            draw.draw_point(anchor_a, 0.05, JOINT_COLOR);
        }
    }

    /// Removes every body and constraint.
    pub fn clear(&mut self) {
        let ids: Vec<EntityId> = self.bodies.ids().collect();
        for id in ids {
            self.remove_body(id);
        }
        self.solver.clear();
        self.events.clear();
        self.time_accumulated = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::Collider;
    use crate::core::types::MassProperties;
    use approx::assert_abs_diff_eq;

    fn ground() -> RigidBody {
        RigidBody::new_static(Transform::default()).with_collider(Collider::cuboid(Vec3::new(10.0, 0.5, 10.0)))
    }

    fn ball(height: f32) -> RigidBody {
        RigidBody::default()
            .with_mass_properties(MassProperties::solid_sphere(0.5, 1.0))
            .expect("valid mass")
            .with_transform(Transform::from_position(Vec3::new(0.0, height, 0.0)))
            .with_collider(Collider::sphere(0.5))
    }

    #[test]
    fn add_body_registers_collider() {
        let mut world = PhysicsWorld::default();
        let id = world.add_body(ball(3.0));
        let body = world.body(id).expect("body");
        assert_eq!(body.id, id);
        let collider = body.collider.as_ref().expect("collider");
        assert_eq!(collider.owner(), id);
        assert!(collider.broadphase_handle().is_some());
        assert_eq!(world.broadphase().len(), 1);
    }

    #[test]
    fn remove_body_retires_broadphase_entry_and_constraints() {
        let mut world = PhysicsWorld::default();
        let floor = world.add_body(ground());
        let id = world.add_body(ball(0.98));
        world.tick();
        assert!(world.contact(floor, id).is_some());
        world.drain_events();

        let removed = world.remove_body(id).expect("removed");
        assert!(removed.collider.as_ref().and_then(|c| c.broadphase_handle()).is_none());
        assert!(world.contact(floor, id).is_none());
        assert_eq!(world.broadphase().len(), 1);
        assert!(matches!(world.drain_events().as_slice(), [ContactEvent::Ended { .. }]));
    }

    #[test]
    fn ball_comes_to_rest_on_ground() {
        let mut world = PhysicsWorld::default();
        world.add_body(ground());
        let id = world.add_body(ball(2.0));
        for _ in 0..240 {
            world.tick();
        }
        let body = world.body(id).expect("ball");
        assert_abs_diff_eq!(body.transform.position.y, 1.0, epsilon = 0.05);
        assert!(body.velocity.linear.length() < 0.1);
    }

    #[test]
    fn joint_validation() {
        let mut world = PhysicsWorld::default();
        let a = world.add_body(ball(1.0));
        assert!(matches!(
            world.add_spherical_joint(SphericalConstraint::new(a, a)),
            Err(PhysicsError::SelfJoint(_))
        ));
        assert!(matches!(
            world.add_spherical_joint(SphericalConstraint::new(a, EntityId::from_index(42))),
            Err(PhysicsError::UnknownBody(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SolverConfig {
            time_step: 0.0,
            ..SolverConfig::default()
        };
        assert!(PhysicsWorld::new(config).is_err());
    }
}
