//! Persistent contact manifolds.
//!
//! A manifold holds at most four points for a colliding pair. Points are
//! matched across steps by the feature id the narrow phase assigns, which is
//! how warm-start impulses survive from one step to the next.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::types::Transform;
use crate::utils::math::{outward_tri_planes, triangle_normal};

pub const MAX_CONTACT_POINTS: usize = 4;

/// Minimum cosine between the previous and the new normal for warm-start
/// impulses to be carried over.
pub const NORMAL_ALIGNMENT: f32 = 0.95;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub local_a: Vec3,
    pub local_b: Vec3,
    pub world_a: Vec3,
    pub world_b: Vec3,
    pub penetration: f32,
    pub feature_id: u64,
    pub warm_contact: f32,
    pub warm_friction: [f32; 2],
}

/// One point reported by the narrow phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportedPoint {
    /// Deepest point of A inside B.
    pub world_a: Vec3,
    /// Deepest point of B inside A.
    pub world_b: Vec3,
    pub penetration: f32,
    pub feature_id: u64,
}

/// Narrow-phase output for a single pair. The normal points from A to B.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactReport {
    pub normal: Vec3,
    pub points: Vec<ReportedPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifold {
    normal: Vec3,
    tangents: [Vec3; 2],
    points: Vec<ContactPoint>,
}

impl Default for Manifold {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifold {
    pub fn new() -> Self {
        let (t0, t1) = Vec3::Y.any_orthonormal_pair();
        Self {
            normal: Vec3::Y,
            tangents: [t0, t1],
            points: Vec::with_capacity(MAX_CONTACT_POINTS),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn tangents(&self) -> [Vec3; 2] {
        self.tangents
    }

    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [ContactPoint] {
        &mut self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn total_normal_impulse(&self) -> f32 {
        self.points.iter().map(|p| p.warm_contact).sum()
    }

    /// Replaces the points with a new report, carrying warm-start impulses of
    /// points whose feature id survives while the normal stays aligned.
    pub fn refresh(&mut self, report: &ContactReport, transform_a: &Transform, transform_b: &Transform) {
        let normal = report.normal.normalize_or_zero();
        if normal == Vec3::ZERO || report.points.is_empty() {
            self.points.clear();
            return;
        }

        let aligned = !self.points.is_empty() && self.normal.dot(normal) >= NORMAL_ALIGNMENT;
        let (t0, t1) = normal.any_orthonormal_pair();
        let old_tangents = self.tangents;
        let previous = std::mem::take(&mut self.points);

        let mut fresh: Vec<ContactPoint> = report
            .points
            .iter()
            .map(|reported| {
                let mut point = ContactPoint {
                    local_a: transform_a.inverse_transform_point(reported.world_a),
                    local_b: transform_b.inverse_transform_point(reported.world_b),
                    world_a: reported.world_a,
                    world_b: reported.world_b,
                    penetration: reported.penetration,
                    feature_id: reported.feature_id,
                    ..ContactPoint::default()
                };
                if aligned {
                    if let Some(old) = previous.iter().find(|p| p.feature_id == reported.feature_id) {
                        point.warm_contact = old.warm_contact;
                        // Re-express the tangential impulse in the new basis.
                        let friction = old_tangents[0] * old.warm_friction[0]
                            + old_tangents[1] * old.warm_friction[1];
                        point.warm_friction = [friction.dot(t0), friction.dot(t1)];
                    }
                }
                point
            })
            .collect();

        if fresh.len() > MAX_CONTACT_POINTS {
            fresh = reduce(fresh, normal);
        }

        self.normal = normal;
        self.tangents = [t0, t1];
        self.points = fresh;
    }
}

/// Picks four points: the deepest, the one farthest from it, the one that
/// maximizes the triangle area, then the one that adds the most area to it.
fn reduce(points: Vec<ContactPoint>, normal: Vec3) -> Vec<ContactPoint> {
    let pick = |score: &dyn Fn(&ContactPoint) -> f32, taken: &[usize]| -> Option<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(i, _)| !taken.contains(i))
            .map(|(i, p)| (i, score(p)))
            .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
                Some((_, best_score)) if best_score >= s => best,
                _ => Some((i, s)),
            })
            .map(|(i, _)| i)
    };

    let mut taken = Vec::with_capacity(MAX_CONTACT_POINTS);
    let deepest = pick(&|p| p.penetration, &taken).unwrap_or(0);
    taken.push(deepest);
    let p0 = points[deepest].world_a;

    if let Some(far) = pick(&|p| (p.world_a - p0).length_squared(), &taken) {
        taken.push(far);
    }
    if taken.len() == 2 {
        let p1 = points[taken[1]].world_a;
        if let Some(third) = pick(&|p| (p1 - p0).cross(p.world_a - p0).length_squared(), &taken) {
            taken.push(third);
        }
    }
    if taken.len() == 3 {
        let (a, b, c) = (
            points[taken[0]].world_a,
            points[taken[1]].world_a,
            points[taken[2]].world_a,
        );
        // Planes point out of the triangle; order the winding along the normal.
        let (a, b, c) = if triangle_normal(a, b, c).dot(normal) >= 0.0 {
            (a, b, c)
        } else {
            (a, c, b)
        };
        let planes = outward_tri_planes(a, b, c, true);
        let edges = [(a, b), (b, c), (c, a)];
        let added_area = |p: &ContactPoint| -> f32 {
            planes
                .iter()
                .zip(edges.iter())
                .map(|(plane, (s, e))| {
                    let outside = plane.truncate().dot(p.world_a) + plane.w;
                    0.5 * outside.max(0.0) * (*e - *s).length()
                })
                .fold(0.0, f32::max)
        };
        if let Some(fourth) = pick(&added_area, &taken) {
            taken.push(fourth);
        }
    }

    taken.into_iter().map(|i| points[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn report(normal: Vec3, points: &[(Vec3, u64)]) -> ContactReport {
        ContactReport {
            normal,
            points: points
                .iter()
                .map(|&(p, id)| ReportedPoint {
                    world_a: p,
                    world_b: p - normal * 0.05,
                    penetration: 0.05,
                    feature_id: id,
                })
                .collect(),
        }
    }

    #[test]
    fn warm_start_carried_by_feature_id() {
        let identity = Transform::default();
        let mut manifold = Manifold::new();
        manifold.refresh(&report(Vec3::Y, &[(Vec3::ZERO, 7), (Vec3::X, 8)]), &identity, &identity);
        manifold.points_mut()[0].warm_contact = 3.0;
        manifold.points_mut()[1].warm_contact = 1.0;

        manifold.refresh(&report(Vec3::Y, &[(Vec3::X, 8), (Vec3::Z, 9)]), &identity, &identity);
        assert_eq!(manifold.len(), 2);
        assert_abs_diff_eq!(manifold.points()[0].warm_contact, 1.0);
        assert_abs_diff_eq!(manifold.points()[1].warm_contact, 0.0);
    }

    #[test]
    fn warm_start_dropped_when_normal_flips() {
        let identity = Transform::default();
        let mut manifold = Manifold::new();
        manifold.refresh(&report(Vec3::Y, &[(Vec3::ZERO, 1)]), &identity, &identity);
        manifold.points_mut()[0].warm_contact = 2.0;
        manifold.refresh(&report(Vec3::X, &[(Vec3::ZERO, 1)]), &identity, &identity);
        assert_abs_diff_eq!(manifold.points()[0].warm_contact, 0.0);
    }

    #[test]
    fn reduces_to_four_spread_points() {
        let identity = Transform::default();
        let mut manifold = Manifold::new();
        let mut pts = Vec::new();
        for (i, x) in [-1.0_f32, -0.5, 0.0, 0.5, 1.0].iter().enumerate() {
            for (j, z) in [-1.0_f32, 0.0, 1.0].iter().enumerate() {
                pts.push((Vec3::new(*x, 0.0, *z), (i * 3 + j) as u64));
            }
        }
        manifold.refresh(&report(Vec3::Y, &pts), &identity, &identity);
        assert_eq!(manifold.len(), MAX_CONTACT_POINTS);

        // Reduced set should keep the corners of the patch.
        let mut extent = Vec3::ZERO;
        for p in manifold.points() {
            extent = extent.max(p.world_a.abs());
        }
        assert_abs_diff_eq!(extent.x, 1.0);
        assert_abs_diff_eq!(extent.z, 1.0);
    }

    #[test]
    fn empty_report_clears_points() {
        let identity = Transform::default();
        let mut manifold = Manifold::new();
        manifold.refresh(&report(Vec3::Y, &[(Vec3::ZERO, 1)]), &identity, &identity);
        manifold.refresh(&report(Vec3::Y, &[]), &identity, &identity);
        assert!(manifold.is_empty());
    }
}
