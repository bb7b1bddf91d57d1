use approx::assert_abs_diff_eq;
use rigid_impulse::utils::math::{
    angular_velocity_to_quat, barycentric_to_point, point_to_barycentric, safe_divide, triangle_normal,
    valid_barycentric,
};
use rigid_impulse::Vec3;

fn triangle() -> (Vec3, Vec3, Vec3) {
    (
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(4.0, 0.0, 1.0),
        Vec3::new(1.0, 3.0, -2.0),
    )
}

#[test]
fn barycentric_round_trip() {
    let (a, b, c) = triangle();
    for weights in [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.2, 0.3, 0.5),
        Vec3::new(0.6, 0.2, 0.2),
        Vec3::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0),
    ] {
        let point = barycentric_to_point(a, b, c, weights);
        let recovered = point_to_barycentric(a, b, c, point);
        assert_abs_diff_eq!(recovered.x, weights.x, epsilon = 1e-5);
        assert_abs_diff_eq!(recovered.y, weights.y, epsilon = 1e-5);
        assert_abs_diff_eq!(recovered.z, weights.z, epsilon = 1e-5);
        assert!(valid_barycentric(recovered));
    }
}

#[test]
fn outside_points_are_not_valid_barycentric() {
    let (a, b, c) = triangle();
    let outside = barycentric_to_point(a, b, c, Vec3::new(-0.5, 1.0, 0.5));
    assert!(!valid_barycentric(point_to_barycentric(a, b, c, outside)));
}

#[test]
fn degenerate_triangle_yields_zero() {
    let a = Vec3::new(1.0, 1.0, 1.0);
    let b = Vec3::new(2.0, 2.0, 2.0);
    let c = Vec3::new(3.0, 3.0, 3.0);
    let bary = point_to_barycentric(a, b, c, Vec3::new(1.5, 1.5, 1.5));
    assert_eq!(bary, Vec3::ZERO);
    assert!(bary.is_finite());
    assert_eq!(triangle_normal(a, b, c), Vec3::ZERO);
}

#[test]
fn safe_divide_never_produces_infinity() {
    assert_eq!(safe_divide(3.0, 0.0, 1e-6), 0.0);
    assert_eq!(safe_divide(3.0, 1e-9, 1e-6), 0.0);
    assert_abs_diff_eq!(safe_divide(3.0, 2.0, 1e-6), 1.5);
}

#[test]
fn angular_velocity_delta_rotates_by_speed_times_dt() {
    let delta = angular_velocity_to_quat(Vec3::new(0.0, 2.0, 0.0), 0.25);
    let (axis, angle) = delta.to_axis_angle();
    assert_abs_diff_eq!(angle, 0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(axis.y, 1.0, epsilon = 1e-5);
    assert_eq!(angular_velocity_to_quat(Vec3::ZERO, 1.0), rigid_impulse::Quat::IDENTITY);
}
