//! Minimal pair tests producing [`ContactReport`]s.
//!
//! Sphere pairs are exact. Box pairs use the separating axis test to pick
//! the normal and collect box vertices contained in the other box as the
//! contact points, which is enough for stacking and resting contact.

use glam::{Mat3, Vec3};

use crate::collision::contact::{ContactReport, ReportedPoint};
use crate::core::collider::{Collider, ColliderShape};
use crate::core::types::Transform;
use crate::utils::math::combine_hash;

/// Tolerance used when testing vertex containment.
const CONTAINMENT_MARGIN: f32 = 5e-3;

const SPHERE_FEATURE: u64 = 1;
const BOX_A_VERTEX: u64 = 0x10;
const BOX_B_VERTEX: u64 = 0x20;
const BOX_FALLBACK: u64 = 0x40;

pub struct NarrowPhase;

impl NarrowPhase {
    /// Tests two colliders in their current world pose. The normal of the
    /// returned report points from `a` to `b`.
    pub fn collide(a: &Collider, b: &Collider) -> Option<ContactReport> {
        let (ta, tb) = (a.world_transform(), b.world_transform());
        match (a.shape(), b.shape()) {
            (ColliderShape::Sphere { radius: ra }, ColliderShape::Sphere { radius: rb }) => {
                sphere_sphere(ta.position, *ra, tb.position, *rb)
            }
            (ColliderShape::Sphere { radius }, ColliderShape::Box { half_extents }) => {
                sphere_box(ta.position, *radius, *half_extents, tb)
            }
            (ColliderShape::Box { half_extents }, ColliderShape::Sphere { radius }) => {
                sphere_box(tb.position, *radius, *half_extents, ta).map(flip)
            }
            (ColliderShape::Box { half_extents: ha }, ColliderShape::Box { half_extents: hb }) => {
                box_box(*ha, ta, *hb, tb)
            }
        }
    }
}

fn flip(report: ContactReport) -> ContactReport {
    ContactReport {
        normal: -report.normal,
        points: report
            .points
            .into_iter()
            .map(|p| ReportedPoint {
                world_a: p.world_b,
                world_b: p.world_a,
                ..p
            })
            .collect(),
    }
}

fn single(normal: Vec3, world_a: Vec3, world_b: Vec3, depth: f32, feature_id: u64) -> ContactReport {
    ContactReport {
        normal,
        points: vec![ReportedPoint {
            world_a,
            world_b,
            penetration: depth,
            feature_id,
        }],
    }
}

fn sphere_sphere(ca: Vec3, ra: f32, cb: Vec3, rb: f32) -> Option<ContactReport> {
    let delta = cb - ca;
    let dist_sq = delta.length_squared();
    let radii = ra + rb;
    if dist_sq > radii * radii {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON { delta / dist } else { Vec3::Y };
    Some(single(
        normal,
        ca + normal * ra,
        cb - normal * rb,
        radii - dist,
        SPHERE_FEATURE,
    ))
}

/// Sphere as A, box as B.
fn sphere_box(center: Vec3, radius: f32, half_extents: Vec3, box_transform: &Transform) -> Option<ContactReport> {
    let local = box_transform.inverse_transform_point(center);
    let closest = local.clamp(-half_extents, half_extents);

    if closest != local {
        let closest_world = box_transform.transform_point(closest);
        let delta = closest_world - center;
        let dist = delta.length();
        if dist > radius || dist <= f32::EPSILON {
            return None;
        }
        let normal = delta / dist;
        return Some(single(
            normal,
            center + normal * radius,
            closest_world,
            radius - dist,
            SPHERE_FEATURE,
        ));
    }

    // Center inside the box: push out through the nearest face.
    let gaps = half_extents - local.abs();
    let axis = if gaps.x <= gaps.y && gaps.x <= gaps.z {
        0
    } else if gaps.y <= gaps.z {
        1
    } else {
        2
    };
    let mut outward_local = Vec3::ZERO;
    outward_local[axis] = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
    let outward = box_transform.rotation * outward_local;
    let gap = gaps[axis];
    Some(single(
        -outward,
        center - outward * radius,
        center + outward * gap,
        radius + gap,
        SPHERE_FEATURE,
    ))
}

struct BoxFrame {
    center: Vec3,
    axes: Mat3,
    half: Vec3,
}

impl BoxFrame {
    fn new(half: Vec3, transform: &Transform) -> Self {
        Self {
            center: transform.position,
            axes: Mat3::from_quat(transform.rotation),
            half,
        }
    }

    fn extent_along(&self, axis: Vec3) -> f32 {
        self.axes.x_axis.dot(axis).abs() * self.half.x
            + self.axes.y_axis.dot(axis).abs() * self.half.y
            + self.axes.z_axis.dot(axis).abs() * self.half.z
    }

    fn vertices(&self) -> [Vec3; 8] {
        let mut out = [Vec3::ZERO; 8];
        for (i, v) in out.iter_mut().enumerate() {
            let sign = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            );
            *v = self.center + self.axes * (sign * self.half);
        }
        out
    }

    fn contains(&self, point: Vec3, margin: f32) -> bool {
        let local = self.axes.transpose() * (point - self.center);
        local.abs().cmple(self.half + Vec3::splat(margin)).all()
    }

    fn support(&self, dir: Vec3) -> Vec3 {
        let local = self.axes.transpose() * dir;
        self.center + self.axes * (local.signum() * self.half)
    }
}

fn box_box(ha: Vec3, ta: &Transform, hb: Vec3, tb: &Transform) -> Option<ContactReport> {
    let a = BoxFrame::new(ha, ta);
    let b = BoxFrame::new(hb, tb);
    let relative = b.center - a.center;

    let face_axes = [
        a.axes.x_axis,
        a.axes.y_axis,
        a.axes.z_axis,
        b.axes.x_axis,
        b.axes.y_axis,
        b.axes.z_axis,
    ];
    let mut axes: Vec<Vec3> = face_axes.to_vec();
    for axis_a in &face_axes[..3] {
        for axis_b in &face_axes[3..] {
            let axis = axis_a.cross(*axis_b);
            if axis.length_squared() > 1e-6 {
                axes.push(axis.normalize());
            }
        }
    }

    let mut min_overlap = f32::MAX;
    let mut normal = Vec3::Y;
    let mut best_axis = 0usize;
    for (index, axis) in axes.iter().enumerate() {
        let projection = relative.dot(*axis);
        let overlap = a.extent_along(*axis) + b.extent_along(*axis) - projection.abs();
        if overlap <= 0.0 {
            return None;
        }
        // Prefer face axes over edge axes on near ties.
        let bias = if index < 6 { 0.0 } else { 1e-4 };
        if overlap + bias < min_overlap {
            min_overlap = overlap + bias;
            normal = if projection < 0.0 { -*axis } else { *axis };
            best_axis = index;
        }
    }

    let top_of_a = a.support(normal).dot(normal);
    let bottom_of_b = b.support(-normal).dot(normal);
    let mut points = Vec::with_capacity(8);

    for (i, v) in b.vertices().iter().enumerate() {
        if a.contains(*v, CONTAINMENT_MARGIN) {
            let depth = top_of_a - v.dot(normal);
            points.push(ReportedPoint {
                world_a: *v + normal * depth,
                world_b: *v,
                penetration: depth,
                feature_id: combine_hash(BOX_B_VERTEX, i as u64),
            });
        }
    }
    for (i, v) in a.vertices().iter().enumerate() {
        if b.contains(*v, CONTAINMENT_MARGIN) {
            let depth = v.dot(normal) - bottom_of_b;
            points.push(ReportedPoint {
                world_a: *v,
                world_b: *v - normal * depth,
                penetration: depth,
                feature_id: combine_hash(BOX_A_VERTEX, i as u64),
            });
        }
    }

    if points.is_empty() {
        // Edge-edge: one point between the two supports.
        let support_a = a.support(normal);
        let support_b = b.support(-normal);
        let mid = (support_a + support_b) * 0.5;
        let depth = top_of_a - bottom_of_b;
        points.push(ReportedPoint {
            world_a: mid + normal * (depth * 0.5),
            world_b: mid - normal * (depth * 0.5),
            penetration: depth,
            feature_id: combine_hash(BOX_FALLBACK, best_axis as u64),
        });
    }

    Some(ContactReport { normal, points })
}
