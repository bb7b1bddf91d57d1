use rigid_impulse::*;
use std::sync::{Arc, Mutex};
use std::thread;

fn pile(world: &mut PhysicsWorld) -> Vec<EntityId> {
    world.add_body(
        RigidBody::new_static(Transform::default()).with_collider(Collider::cuboid(Vec3::new(10.0, 0.5, 10.0))),
    );
    (0..12)
        .map(|i| {
            let x = (i % 4) as f32 * 1.1 - 1.65;
            let y = 1.0 + (i / 4) as f32 * 1.05;
            world.add_body(
                RigidBody::default()
                    .with_mass_properties(MassProperties::solid_sphere(0.5, 1.0))
                    .expect("valid mass")
                    .with_transform(Transform::from_position(Vec3::new(x, y, 0.0)))
                    .with_collider(Collider::sphere(0.5)),
            )
        })
        .collect()
}

#[test]
fn physics_world_is_sync_and_send() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<PhysicsWorld>();
    assert_sync_send::<SharedBroadphase>();
}

#[test]
fn shared_physics_world_across_threads() {
    let world = Arc::new(Mutex::new(PhysicsWorld::default()));
    {
        let mut guard = world.lock().expect("lock");
        pile(&mut guard);
    }

    let mut handles = vec![];
    for _ in 0..4 {
        let world_clone = Arc::clone(&world);
        let handle = thread::spawn(move || {
            let mut world = world_clone.lock().expect("lock");
            world.step(1.0 / 60.0);
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("stepping thread");
    }
    let world = world.lock().expect("lock");
    assert!(world.bodies().all(|(_, body)| body.transform.position.is_finite()));
}

#[test]
fn broadphase_answers_concurrent_queries() {
    let mut world = PhysicsWorld::default();
    let ids = pile(&mut world);
    let broadphase = world.broadphase().clone();
    let expected = broadphase.len();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let broadphase = broadphase.clone();
            thread::spawn(move || {
                let mut context = BroadphaseContext::new();
                broadphase.query_volume(&Aabb::new(Vec3::splat(-20.0), Vec3::splat(20.0)), &mut context);
                context.results.len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("query thread"), expected);
    }
    assert_eq!(expected, ids.len() + 1);
}

#[test]
fn parallel_narrow_phase_matches_sequential() {
    let mut sequential = PhysicsWorld::default();
    let ids = pile(&mut sequential);
    let mut parallel = PhysicsWorld::default();
    pile(&mut parallel);
    parallel.set_parallel_enabled(true);
    assert!(parallel.parallel_enabled());

    for _ in 0..60 {
        sequential.tick();
        parallel.tick();
    }

    for id in ids {
        let a = sequential.body(id).expect("body").transform.position;
        let b = parallel.body(id).expect("body").transform.position;
        assert_eq!(a, b, "{id:?}");
    }
    assert_eq!(sequential.contact_count(), parallel.contact_count());
}
