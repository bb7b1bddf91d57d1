//! Geometry and numeric helpers layered on top of `glam`.
//!
//! Everything here is a pure function. Degenerate input (zero-area
//! triangles, collapsed ellipses, zero-length vectors) produces a defined
//! fallback value instead of NaN or infinity, because the solver hits those
//! cases routinely and must keep stepping.

use glam::{Mat3, Quat, Vec2, Vec3, Vec4};

/// Tolerance shared by the guarded geometric helpers.
pub const EPSILON: f32 = 1e-4;

/// Divides `numerator` by `denominator`, returning `0.0` when the
/// denominator's magnitude is below `epsilon`.
#[inline]
pub fn safe_divide(numerator: f32, denominator: f32, epsilon: f32) -> f32 {
    if denominator.abs() < epsilon {
        0.0
    } else {
        numerator / denominator
    }
}

/// Unnormalized normal of triangle `abc` following counter-clockwise winding.
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

/// Plane offset `d` such that `normal·p + d = 0` for every `p` on the plane.
pub fn half_plane_d(normal: Vec3, on_plane: Vec3) -> f32 {
    -normal.dot(on_plane)
}

pub fn half_plane_signed_distance(normal: Vec3, d: f32, point: Vec3) -> f32 {
    normal.dot(point) + d
}

pub fn half_plane_signed_distance_through(normal: Vec3, on_plane: Vec3, point: Vec3) -> f32 {
    half_plane_signed_distance(normal, half_plane_d(normal, on_plane), point)
}

pub fn barycentric_to_point(a: Vec3, b: Vec3, c: Vec3, bary: Vec3) -> Vec3 {
    a * bary.x + b * bary.y + c * bary.z
}

/// Barycentric coordinates of `a_to_p` relative to the edges `a_to_b` and
/// `a_to_c`. Returns [`Vec3::ZERO`] for a degenerate triangle.
pub fn point_to_barycentric_edges(a_to_b: Vec3, a_to_c: Vec3, a_to_p: Vec3) -> Vec3 {
    let d00 = a_to_b.dot(a_to_b);
    let d01 = a_to_b.dot(a_to_c);
    let d11 = a_to_c.dot(a_to_c);
    let d20 = a_to_p.dot(a_to_b);
    let d21 = a_to_p.dot(a_to_c);

    let denom = d00 * d11 - d01 * d01;
    if denom < EPSILON * EPSILON {
        return Vec3::ZERO;
    }
    let inv_denom = 1.0 / denom;

    let v = (d11 * d20 - d01 * d21) * inv_denom;
    let w = (d00 * d21 - d01 * d20) * inv_denom;
    Vec3::new(1.0 - v - w, v, w)
}

pub fn point_to_barycentric(a: Vec3, b: Vec3, c: Vec3, point: Vec3) -> Vec3 {
    point_to_barycentric_edges(b - a, c - a, point - a)
}

/// True when every coordinate is non-negative and they sum to one.
pub fn valid_barycentric(bary: Vec3) -> bool {
    // A coordinate above one forces another below zero, so only negatives need checking.
    if bary.min_element() < 0.0 {
        return false;
    }
    (1.0 - bary.element_sum()).abs() < EPSILON
}

/// Tests whether `point`, assumed to lie on the triangle's plane, is inside
/// the triangle's edges. `epsilon` widens the edges outward.
pub fn is_within_tri(a: Vec3, b: Vec3, c: Vec3, point: Vec3, epsilon: f32) -> bool {
    let a_to_b = b - a;
    let b_to_c = c - b;
    let c_to_a = a - c;
    let normal = a_to_b.cross(b_to_c);

    a_to_b.cross(normal).dot(point - a) <= epsilon
        && b_to_c.cross(normal).dot(point - b) <= epsilon
        && c_to_a.cross(normal).dot(point - c) <= epsilon
}

/// Planes through each edge of triangle `abc` facing away from its interior,
/// packed as `(normal, d)`. Edges are `ab`, `bc`, `ca` in that order.
pub fn outward_tri_planes(a: Vec3, b: Vec3, c: Vec3, normalized: bool) -> [Vec4; 3] {
    let normal = triangle_normal(a, b, c);
    let plane = |edge: Vec3, on_plane: Vec3| {
        let mut n = edge.cross(normal);
        if normalized {
            n = n.normalize_or_zero();
        }
        n.extend(half_plane_d(n, on_plane))
    };
    [plane(b - a, a), plane(c - b, b), plane(a - c, c)]
}

/// Mixes two hashes into one, order dependent.
pub fn combine_hash(lhs: u64, rhs: u64) -> u64 {
    lhs ^ rhs
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(lhs << 6)
        .wrapping_add(lhs >> 2)
}

/// Moves an inertia tensor away from the center of mass by `to_point`
/// using the parallel axis theorem.
pub fn tensor_transform_offset(tensor: Mat3, to_point: Vec3, mass: f32) -> Mat3 {
    let Vec3 { x, y, z } = to_point;
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let xy = -mass * x * y;
    let xz = -mass * x * z;
    let yz = -mass * y * z;
    tensor
        + Mat3::from_cols(
            Vec3::new(mass * (yy + zz), xy, xz),
            Vec3::new(xy, mass * (xx + zz), yz),
            Vec3::new(xz, yz, mass * (xx + yy)),
        )
}

/// Expresses a tensor given in a local frame in the frame `rotation` maps into.
pub fn tensor_transform_rotated(tensor: Mat3, rotation: Mat3) -> Mat3 {
    rotation * tensor * rotation.transpose()
}

/// Distance along the ray from the origin in direction `line` to the
/// boundary of the axis-aligned ellipse with semi-axes `ellipse_scale`.
///
/// For a unit `line` this is the ellipse radius in that direction.
pub fn ellipse_line_intersect(line: Vec2, ellipse_scale: Vec2) -> f32 {
    let (a, b) = (ellipse_scale.x, ellipse_scale.y);
    let denom = (a * a * line.y * line.y + b * b * line.x * line.x).sqrt();
    safe_divide(a * b, denom, EPSILON)
}

/// Exit parameter `t` of the line `start + t * dir` through the ellipse
/// boundary, i.e. the larger root of the quadratic. For a start inside the
/// ellipse this is the forward hit; for a start outside it is the far side.
/// Returns `0.0` when the line misses the ellipse or the system is degenerate.
pub fn ellipse_ray_intersect(start: Vec2, dir: Vec2, ellipse_scale: Vec2) -> f32 {
    let a2 = ellipse_scale.x * ellipse_scale.x;
    let b2 = ellipse_scale.y * ellipse_scale.y;

    let qa = b2 * dir.x * dir.x + a2 * dir.y * dir.y;
    let qb = b2 * start.x * dir.x + a2 * start.y * dir.y;
    let qc = b2 * start.x * start.x + a2 * start.y * start.y - a2 * b2;

    let discriminant = qb * qb - qa * qc;
    if discriminant < 0.0 {
        return 0.0;
    }
    safe_divide(discriminant.sqrt() - qb, qa, EPSILON)
}

/// Outward unit normal of the ellipse family through `point`, i.e. the
/// normalized gradient of `x²/a² + y²/b²`. `None` when the ellipse is
/// collapsed or the point sits at its center.
pub fn ellipse_point_to_normal(point: Vec2, ellipse_scale: Vec2) -> Option<Vec2> {
    let a2 = ellipse_scale.x * ellipse_scale.x;
    let b2 = ellipse_scale.y * ellipse_scale.y;
    if a2 < EPSILON * EPSILON || b2 < EPSILON * EPSILON {
        return None;
    }
    Vec2::new(point.x / a2, point.y / b2).try_normalize()
}

/// Skew-symmetric matrix `[v]×` such that `[v]× * u == v.cross(u)`.
pub fn cross_matrix(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// Converts angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    Quat::from_axis_angle(angular.normalize(), angle)
}

/// Wraps an angle in radians into `[-π, π]`.
pub fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped < -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}
