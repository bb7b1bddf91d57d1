use approx::assert_abs_diff_eq;
use rigid_impulse::*;

fn ground() -> RigidBody {
    RigidBody::new_static(Transform::default()).with_collider(Collider::cuboid(Vec3::new(10.0, 0.5, 10.0)))
}

fn ball(position: Vec3) -> RigidBody {
    RigidBody::default()
        .with_mass_properties(MassProperties::solid_sphere(0.5, 1.0))
        .expect("valid mass")
        .with_transform(Transform::from_position(position))
        .with_collider(Collider::sphere(0.5))
}

#[test]
fn bodies_fall_under_gravity() {
    let mut world = PhysicsWorld::default();
    let body_id = world.add_body(ball(Vec3::new(0.0, 10.0, 0.0)));

    world.step(1.0 / 60.0);

    let position_y = world.body(body_id).expect("body should exist").transform.position.y;
    assert!(position_y < 10.0, "body should start falling, y = {}", position_y);
}

#[test]
fn step_accumulates_fixed_ticks() {
    let mut world = PhysicsWorld::default();
    let id = world.add_body(ball(Vec3::new(0.0, 10.0, 0.0)));
    let dt = world.config().time_step;

    world.step(dt * 0.5);
    assert_eq!(world.body(id).expect("ball").transform.position.y, 10.0);

    world.step(dt * 0.6);
    let after_one = world.body(id).expect("ball").velocity.linear.y;
    assert_abs_diff_eq!(after_one, -9.81 * dt, epsilon = 1e-4);

    world.step(dt * 2.0);
    let after_three = world.body(id).expect("ball").velocity.linear.y;
    assert_abs_diff_eq!(after_three, -9.81 * dt * 3.0, epsilon = 1e-4);
}

#[test]
fn static_bodies_never_move() {
    let mut world = PhysicsWorld::default();
    let floor = world.add_body(ground());
    world.add_body(ball(Vec3::new(0.0, 0.99, 0.0)));
    for _ in 0..60 {
        world.tick();
    }
    let body = world.body(floor).expect("floor");
    assert_eq!(body.transform.position, Vec3::ZERO);
    assert_eq!(body.velocity.linear, Vec3::ZERO);
}

#[test]
fn zero_mass_bodies_stay_put() {
    let mut world = PhysicsWorld::default();
    let id = world.add_body(
        RigidBody::default()
            .with_mass_properties(MassProperties::STATIC)
            .expect("zero mass is valid")
            .with_transform(Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))
            .with_collider(Collider::sphere(0.5)),
    );
    world.add_body(
        RigidBody::new_static(Transform::from_position(Vec3::new(0.0, 5.5, 0.0)))
            .with_collider(Collider::sphere(0.5)),
    );
    for _ in 0..60 {
        world.tick();
    }
    let body = world.body(id).expect("body");
    assert!(body.is_static());
    assert_eq!(body.transform.position, Vec3::new(0.0, 5.0, 0.0));
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn landing_and_leaving_emit_events() {
    let mut world = PhysicsWorld::default();
    let floor = world.add_body(ground());
    let id = world.add_body(ball(Vec3::new(0.0, 1.5, 0.0)));

    let mut began = false;
    for _ in 0..60 {
        world.tick();
        began |= world
            .drain_events()
            .contains(&ContactEvent::Began { body_a: floor, body_b: id });
    }
    assert!(began, "ball should land");

    world.set_transform(id, Transform::from_position(Vec3::new(0.0, 30.0, 0.0)));
    world.tick();
    assert_eq!(world.drain_events(), vec![ContactEvent::Ended { body_a: floor, body_b: id }]);
}

#[test]
fn triggers_report_overlap_without_pushing() {
    let mut world = PhysicsWorld::default();
    let sensor = world.add_body(
        RigidBody::new_static(Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))
            .with_collider(Collider::builder().box_shape(Vec3::splat(1.0)).is_trigger(true).build()),
    );
    let id = world.add_body(ball(Vec3::new(0.0, 7.0, 0.0)));

    let mut events = Vec::new();
    for _ in 0..90 {
        world.tick();
        events.extend(world.drain_events());
    }

    assert!(events.contains(&ContactEvent::Began { body_a: sensor, body_b: id }));
    assert!(events.contains(&ContactEvent::Ended { body_a: sensor, body_b: id }));
    assert!(world.body(id).expect("ball").transform.position.y < 3.5);
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn removing_a_body_retires_its_contacts() {
    let mut world = PhysicsWorld::default();
    let floor = world.add_body(ground());
    let id = world.add_body(ball(Vec3::new(0.0, 0.99, 0.0)));
    world.tick();
    assert_eq!(world.contact_count(), 1);
    world.drain_events();

    let removed = world.remove_body(id).expect("live body");
    assert!(removed.collider.as_ref().and_then(|c| c.broadphase_handle()).is_none());
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.body_count(), 1);
    assert_eq!(world.drain_events(), vec![ContactEvent::Ended { body_a: floor, body_b: id }]);
    assert!(world.remove_body(id).is_none());

    world.tick();
    assert_eq!(world.broadphase().len(), 1);
}

#[test]
fn contact_states_describe_resting_pairs() {
    let mut world = PhysicsWorld::default();
    let floor = world.add_body(ground());
    let id = world.add_body(ball(Vec3::new(0.0, 0.995, 0.0)));
    for _ in 0..30 {
        world.tick();
    }
    let states = world.contact_states();
    assert_eq!(states.len(), 1);
    let state = states[0];
    assert_eq!((state.body_a, state.body_b), (floor, id));
    assert!(state.point_count >= 1);
    assert!(state.normal_impulse > 0.0);
    assert_eq!(state.inactive_time, 0.0);
}

#[test]
fn debug_draw_emits_bounds_contacts_and_joints() {
    let mut world = PhysicsWorld::default();
    let floor = world.add_body(ground());
    let id = world.add_body(ball(Vec3::new(0.0, 0.99, 0.0)));
    world
        .add_spherical_joint(SphericalConstraint::new(floor, id).with_anchors(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO))
        .expect("valid joint");
    world.tick();

    let mut recorder = DebugRecorder::default();
    world.debug_draw(&mut recorder);

    let contact_points = world.contact_states()[0].point_count;
    // Two boxes of 12 edges, one normal per contact point, two joint arms.
    assert_eq!(recorder.lines.len(), 24 + contact_points + 2);
    assert_eq!(recorder.points.len(), contact_points + 1);
}

#[test]
fn switching_broadphase_keeps_the_simulation_going() {
    let mut world = PhysicsWorld::new(SolverConfig::default().with_broadphase(BroadphaseKind::Brute))
        .expect("valid config");
    world.add_body(ground());
    let id = world.add_body(ball(Vec3::new(0.0, 0.995, 0.0)));
    for _ in 0..30 {
        world.tick();
    }
    let contacts = world.contact_count();

    let config = world.config().with_broadphase(BroadphaseKind::Grid);
    world.set_config(config).expect("valid config");
    assert_eq!(world.broadphase().len(), 2);
    for _ in 0..30 {
        world.tick();
    }
    assert_eq!(world.contact_count(), contacts);
    assert_abs_diff_eq!(world.body(id).expect("ball").transform.position.y, 1.0, epsilon = 0.05);
}

#[test]
fn invalid_inputs_are_rejected() {
    assert!(matches!(
        RigidBody::default().with_mass_properties(MassProperties::solid_sphere(1.0, -2.0)),
        Err(PhysicsError::InvalidMass { .. })
    ));
    let config = SolverConfig {
        broadphase_cell_size: 0.0,
        ..SolverConfig::default()
    };
    assert!(PhysicsWorld::new(config).is_err());

    let mut world = PhysicsWorld::default();
    assert!(!world.set_transform(EntityId::from_index(3), Transform::default()));
    assert!(world.set_config(config).is_err());
    assert_eq!(world.config().broadphase_cell_size, SolverConfig::default().broadphase_cell_size);
}

#[test]
fn clear_resets_the_world() {
    let mut world = PhysicsWorld::default();
    let floor = world.add_body(ground());
    let id = world.add_body(ball(Vec3::new(0.0, 0.99, 0.0)));
    world.add_spherical_joint(SphericalConstraint::new(floor, id)).expect("valid joint");
    world.tick();

    world.clear();
    assert_eq!(world.body_count(), 0);
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.joint_count(), 0);
    assert!(world.broadphase().is_empty());
    assert!(world.drain_events().is_empty());
}

#[test]
fn engine_wraps_the_world() {
    let mut engine = PhysicsEngine::new(SolverConfig::default()).expect("valid config");
    let id = engine.add_body(ball(Vec3::new(0.0, 5.0, 0.0)));
    engine.set_parallel_enabled(true);
    assert!(engine.parallel_enabled());

    if let Some(body) = engine.get_body_mut(id) {
        body.apply_impulse(Vec3::new(2.0, 0.0, 0.0), body.transform.position);
    }
    engine.step(1.0 / 30.0);

    let body = engine.get_body(id).expect("ball");
    assert!(body.transform.position.x > 0.0);
    assert!(body.transform.position.y < 5.0);
    assert_eq!(engine.world().body_count(), 1);
    assert!(engine.world_mut().remove_body(id).is_some());
}
