use glam::Vec3;

use crate::{
    core::collider::{Collider, ColliderShape},
    utils::allocator::EntityId,
};

/// Result of a ray cast against colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub body_id: EntityId,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RaycastQuery {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
}

impl RaycastQuery {
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
        }
    }
}

pub struct Raycast;

impl Raycast {
    /// Exact ray test against one collider in its current world pose.
    pub fn ray_collider(query: &RaycastQuery, collider: &Collider) -> Option<RaycastHit> {
        if query.direction == Vec3::ZERO {
            return None;
        }
        let transform = collider.world_transform();
        let hit = match collider.shape() {
            ColliderShape::Sphere { radius } => {
                Self::ray_sphere(query, transform.position, *radius).map(|(point, distance)| {
                    (point, (point - transform.position).normalize_or_zero(), distance)
                })
            }
            ColliderShape::Box { half_extents } => {
                let inverse = transform.rotation.conjugate();
                let local_query = RaycastQuery {
                    origin: inverse * (query.origin - transform.position),
                    direction: inverse * query.direction,
                    max_distance: query.max_distance,
                };
                Self::ray_box(&local_query, *half_extents).map(|(_, distance, normal)| {
                    (
                        query.origin + query.direction * distance,
                        transform.rotation * normal,
                        distance,
                    )
                })
            }
        };

        hit.map(|(point, normal, distance)| RaycastHit {
            body_id: collider.owner(),
            point,
            normal,
            distance,
        })
    }

    fn ray_sphere(query: &RaycastQuery, center: Vec3, radius: f32) -> Option<(Vec3, f32)> {
        let oc = query.origin - center;
        let b = oc.dot(query.direction);
        let c = oc.length_squared() - radius * radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt_disc = discriminant.sqrt();
        // Origin inside the sphere hits the far side.
        let t = if -b - sqrt_disc >= 0.0 {
            -b - sqrt_disc
        } else {
            -b + sqrt_disc
        };
        if t < 0.0 || t > query.max_distance {
            return None;
        }
        Some((query.origin + query.direction * t, t))
    }

    /// Slab test against a box centered at the origin.
    fn ray_box(query: &RaycastQuery, half_extents: Vec3) -> Option<(Vec3, f32, Vec3)> {
        let dir = query.direction;
        let mut t_min = 0.0;
        let mut t_max = query.max_distance;
        let mut normal = Vec3::ZERO;

        for i in 0..3 {
            let origin_component = query.origin[i];
            let dir_component = dir[i];
            let min = -half_extents[i];
            let max = half_extents[i];

            if dir_component.abs() < 1e-6 {
                if origin_component < min || origin_component > max {
                    return None;
                }
                continue;
            }

            let inv_dir = 1.0 / dir_component;
            let mut t1 = (min - origin_component) * inv_dir;
            let mut t2 = (max - origin_component) * inv_dir;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            if t1 > t_min {
                t_min = t1;
                normal = Vec3::ZERO;
                normal[i] = -dir_component.signum();
            }

            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        let point = query.origin + dir * t_min;
        Some((point, t_min, normal))
    }
}
