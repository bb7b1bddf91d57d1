//! Debug primitive hook. The world emits lines and points; drawing them is
//! up to the host.

use glam::Vec3;

use crate::core::types::Aabb;

pub const CONTACT_COLOR: Vec3 = Vec3::new(1.0, 0.2, 0.2);
pub const NORMAL_COLOR: Vec3 = Vec3::new(1.0, 1.0, 0.0);
pub const JOINT_COLOR: Vec3 = Vec3::new(0.2, 0.6, 1.0);
pub const AABB_COLOR: Vec3 = Vec3::new(0.3, 1.0, 0.3);

/// Length of drawn contact normals.
pub const NORMAL_LENGTH: f32 = 0.25;

pub trait DebugDraw {
    fn draw_line(&mut self, start: Vec3, end: Vec3, color: Vec3);

    fn draw_point(&mut self, point: Vec3, size: f32, color: Vec3);

    fn draw_aabb(&mut self, aabb: &Aabb, color: Vec3) {
        let (min, max) = (aabb.min, aabb.max);
        let corner = |i: usize| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        };
        for i in 0..8 {
            for bit in [1, 2, 4] {
                if i & bit == 0 {
                    self.draw_line(corner(i), corner(i | bit), color);
                }
            }
        }
    }
}

/// Records primitives instead of drawing them.
#[derive(Debug, Default, Clone)]
pub struct DebugRecorder {
    pub lines: Vec<(Vec3, Vec3, Vec3)>,
    pub points: Vec<(Vec3, f32, Vec3)>,
}

impl DebugDraw for DebugRecorder {
    fn draw_line(&mut self, start: Vec3, end: Vec3, color: Vec3) {
        self.lines.push((start, end, color));
    }

    fn draw_point(&mut self, point: Vec3, size: f32, color: Vec3) {
        self.points.push((point, size, color));
    }
}
