use approx::assert_abs_diff_eq;
use rigid_impulse::*;

fn base() -> RigidBody {
    RigidBody::new_static(Transform::default())
}

fn bob(position: Vec3) -> RigidBody {
    RigidBody::default()
        .with_mass_properties(MassProperties::solid_sphere(0.1, 1.0))
        .expect("valid mass")
        .with_transform(Transform::from_position(position))
}

fn anchor_gap(world: &PhysicsWorld, joint_id: EntityId) -> f32 {
    let joint = world.joint(joint_id).expect("joint");
    let a = world.body(joint.body_a).expect("body a");
    let b = world.body(joint.body_b).expect("body b");
    let anchor_a = a.transform.transform_point(joint.local_anchor(ConstraintObj::A));
    let anchor_b = b.transform.transform_point(joint.local_anchor(ConstraintObj::B));
    (anchor_a - anchor_b).length()
}

fn pendulum(backend: SolveBackend) -> (PhysicsWorld, EntityId, EntityId) {
    let mut world = PhysicsWorld::new(SolverConfig::default().with_backend(backend)).expect("valid config");
    let pivot = world.add_body(base());
    let weight = world.add_body(bob(Vec3::new(1.0, 0.0, 0.0)));
    let joint = SphericalConstraint::new(pivot, weight).with_anchors(Vec3::ZERO, Vec3::new(-1.0, 0.0, 0.0));
    let joint_id = world.add_spherical_joint(joint).expect("valid joint");
    (world, weight, joint_id)
}

#[test]
fn pendulum_keeps_anchors_together() {
    let (mut world, weight, joint_id) = pendulum(SolveBackend::Scalar);
    for _ in 0..180 {
        world.tick();
        assert!(anchor_gap(&world, joint_id) < 0.05);
    }
    let radius = world.body(weight).expect("bob").transform.position.length();
    assert_abs_diff_eq!(radius, 1.0, epsilon = 0.05);
}

#[test]
fn pendulum_backends_agree() {
    let (mut scalar, weight, _) = pendulum(SolveBackend::Scalar);
    let (mut simd, _, _) = pendulum(SolveBackend::Simd);
    for _ in 0..60 {
        scalar.tick();
        simd.tick();
    }
    let p = scalar.body(weight).expect("bob").transform.position;
    let q = simd.body(weight).expect("bob").transform.position;
    assert!((p - q).length() < 1e-3, "{p} vs {q}");
}

#[test]
fn swing_limit_holds_the_arm_up() {
    let mut world = PhysicsWorld::default();
    let pivot = world.add_body(base());
    let arm = world.add_body(bob(Vec3::new(0.0, 0.0, -1.0)));
    let mut joint = SphericalConstraint::new(pivot, arm).with_anchors(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
    joint.set_swing_limits(0.3, 0.3);
    let joint_id = world.add_spherical_joint(joint).expect("valid joint");

    for _ in 0..180 {
        world.tick();
    }

    let rotation = world.body(arm).expect("arm").transform.rotation;
    let angle = 2.0 * rotation.w.abs().min(1.0).acos();
    assert!(angle < 0.3 + 0.1, "swing {angle}");
    assert!(anchor_gap(&world, joint_id) < 0.05);
}

#[test]
fn twist_limit_stops_spin_about_the_axis() {
    let config = SolverConfig::default().with_gravity([0.0; 3]);
    let mut world = PhysicsWorld::new(config).expect("valid config");
    let pivot = world.add_body(base());
    let spinner = world.add_body(bob(Vec3::ZERO));
    let mut joint = SphericalConstraint::new(pivot, spinner);
    joint.set_twist_limits(-0.5, 0.5).expect("valid range");
    world.add_spherical_joint(joint).expect("valid joint");
    if let Some(body) = world.body_mut(spinner) {
        body.velocity.angular = Vec3::new(0.0, 0.0, 4.0);
    }

    for _ in 0..120 {
        world.tick();
        let rotation = world.body(spinner).expect("spinner").transform.rotation;
        let twist = 2.0 * rotation.z.atan2(rotation.w);
        assert!(twist.abs() < 0.5 + 0.15, "twist {twist}");
    }
}

#[test]
fn unlimited_joint_lets_body_spin() {
    let config = SolverConfig::default().with_gravity([0.0; 3]);
    let mut world = PhysicsWorld::new(config).expect("valid config");
    let pivot = world.add_body(base());
    let spinner = world.add_body(bob(Vec3::ZERO));
    world
        .add_spherical_joint(SphericalConstraint::new(pivot, spinner))
        .expect("valid joint");
    if let Some(body) = world.body_mut(spinner) {
        body.velocity.angular = Vec3::new(0.0, 0.0, 2.0);
    }
    world.tick();
    assert_abs_diff_eq!(world.body(spinner).expect("spinner").velocity.angular.z, 2.0, epsilon = 1e-3);
}

#[test]
fn joint_warm_start_persists() {
    let (mut world, _, joint_id) = pendulum(SolveBackend::Scalar);
    for _ in 0..10 {
        world.tick();
    }
    let joint = world.joint(joint_id).expect("joint");
    assert!(joint.linear_warm_start().length() > 0.0);
    assert_eq!(joint.angular_warm_start(), [0.0; 3]);
}

#[test]
fn joint_errors_are_reported() {
    let mut world = PhysicsWorld::default();
    let a = world.add_body(base());
    let b = world.add_body(bob(Vec3::X));
    let joint_id = world.add_spherical_joint(SphericalConstraint::new(a, b)).expect("valid joint");

    assert_eq!(
        world.add_spherical_joint(SphericalConstraint::new(b, b)),
        Err(PhysicsError::SelfJoint(b))
    );
    let mut inverted = SphericalConstraint::new(a, b);
    assert!(matches!(
        inverted.set_twist_limits(1.0, -1.0),
        Err(PhysicsError::InvalidTwistLimits { .. })
    ));

    world.set_joint_frame(joint_id, Quat::IDENTITY).expect("live joint");
    let removed = world.remove_joint(joint_id).expect("removed");
    assert_eq!(removed.body_b, b);
    assert!(world.remove_joint(joint_id).is_none());
    assert_eq!(
        world.set_joint_frame(joint_id, Quat::IDENTITY),
        Err(PhysicsError::UnknownConstraint(joint_id))
    );
}

#[test]
fn swing_frame_sets_neutral_pose() {
    let mut world = PhysicsWorld::default();
    let a = world.add_body(base());
    let b = world.add_body(bob(Vec3::ZERO));
    world.set_transform(b, Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_x(0.8)));
    let mut joint = SphericalConstraint::new(a, b);
    joint.set_swing_limits(0.1, 0.1);
    let joint_id = world.add_spherical_joint(joint).expect("valid joint");
    world.set_joint_frame(joint_id, Quat::IDENTITY).expect("live joint");

    let config = world.config().with_gravity([0.0; 3]);
    world.set_config(config).expect("valid config");
    world.tick();
    // The tilted pose is neutral now, so the tight cone applies no impulse.
    assert_eq!(world.joint(joint_id).expect("joint").angular_warm_start(), [0.0; 3]);
}
