use bytemuck::{Pod, Zeroable};
use common::input::{Action, InputState};
use glam::{Mat4, Vec2};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex {
        position: [-0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [0.0, 0.5],
        color: [0.0, 0.0, 1.0],
    },
    Vertex {
        position: [0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
];

pub const TRIANGLE_INDICES: [u32; 3] = [0, 1, 2];

/// Units per second for every keyboard adjustment.
const SPEED: f32 = 1.0;

/// Placement of the triangle, edited by the keyboard and the debug panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    /// Radians around Z.
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform {
    /// Scale, then rotate about Z, then translate.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position.extend(0.0))
            * Mat4::from_rotation_z(self.rotation)
            * Mat4::from_scale(self.scale.extend(1.0))
    }

    /// Moves, scales and rotates by `dt` seconds worth of held actions.
    pub fn apply_input(&mut self, input: &InputState, dt: f32) {
        let step = SPEED * dt;

        self.position.x += input.axis(Action::MoveRight, Action::MoveLeft) * step;
        self.position.y += input.axis(Action::MoveUp, Action::MoveDown) * step;
        self.scale.x += input.axis(Action::ScaleRight, Action::ScaleLeft) * step;
        self.scale.y += input.axis(Action::ScaleUp, Action::ScaleDown) * step;
        self.rotation +=
            input.axis(Action::RotateCounterClockwise, Action::RotateClockwise) * step;
    }
}

/// Vertex shader constants, laid out for a `row_major` HLSL matrix that
/// multiplies row vectors.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Constants {
    pub world: [[f32; 4]; 4],
}

impl Constants {
    pub fn new(transform: &Transform) -> Self {
        // Column-major `T * R * S` has the same memory as the row-vector
        // matrix `S * R * T` stored row by row.
        Self {
            world: transform.world_matrix().to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};
    use pretty_assertions::assert_eq;

    use super::*;

    fn held(actions: &[Action]) -> InputState {
        let mut input = InputState::default();
        for &action in actions {
            input.press(action);
        }
        input
    }

    #[test]
    fn world_scales_then_rotates_then_translates() {
        let mut transform = Transform::default();
        let input = held(&[Action::MoveRight, Action::ScaleDown, Action::RotateCounterClockwise]);
        for dt in [0.0, 0.016, 0.1, 0.25, 0.033] {
            transform.apply_input(&input, dt);
        }

        let p = Vec3::new(0.3, -0.7, 0.0);
        let scaled = p * transform.scale.extend(1.0);
        let rotated = glam::Quat::from_rotation_z(transform.rotation) * scaled;
        let expected = rotated + transform.position.extend(0.0);

        let actual = transform.world_matrix().transform_point3(p);
        assert!(actual.abs_diff_eq(expected, 1e-5), "{actual} != {expected}");
    }

    #[test]
    fn moving_right_covers_the_same_distance_however_frames_split() {
        let input = held(&[Action::MoveRight]);

        let mut one_frame = Transform::default();
        one_frame.apply_input(&input, 1.5);

        let mut many_frames = Transform::default();
        for _ in 0..6 {
            many_frames.apply_input(&input, 0.25);
        }

        assert!((one_frame.position.x - 1.5).abs() < 1e-6);
        assert!((many_frames.position.x - 1.5).abs() < 1e-5);
        assert_eq!(many_frames.position.y, 0.0);
    }

    #[test]
    fn moving_up_for_two_seconds() {
        let mut transform = Transform::default();
        let input = held(&[Action::MoveUp]);
        for _ in 0..4 {
            transform.apply_input(&input, 0.5);
        }
        assert!((transform.position.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut transform = Transform::default();
        transform.apply_input(&held(&[Action::ScaleLeft, Action::ScaleRight]), 1.0);
        assert_eq!(transform, Transform::default());
    }

    #[test]
    fn triangle_is_drawn_from_three_indices_in_order() {
        assert_eq!(TRIANGLE_INDICES, [0, 1, 2]);
        assert!(TRIANGLE_INDICES
            .iter()
            .all(|&i| (i as usize) < TRIANGLE_VERTICES.len()));
    }

    #[test]
    fn constants_fill_one_aligned_register_block() {
        assert_eq!(std::mem::size_of::<Constants>(), 64);
        assert_eq!(std::mem::align_of::<Constants>(), 16);
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
    }

    #[test]
    fn translation_lands_in_last_row_for_row_vectors() {
        let transform = Transform {
            position: Vec2::new(0.25, -0.5),
            ..Default::default()
        };
        let constants = Constants::new(&transform);
        assert_eq!(constants.world[3], [0.25, -0.5, 0.0, 1.0]);

        // mul(float4(p, 0, 1), world) with the rows as stored.
        let row = |i: usize| Vec4::from_array(constants.world[i]);
        let p = Vec4::new(-0.5, 0.0, 0.0, 1.0);
        let out = row(0) * p.x + row(1) * p.y + row(2) * p.z + row(3) * p.w;
        assert!(out.abs_diff_eq(Vec4::new(-0.25, -0.5, 0.0, 1.0), 1e-6));
    }
}
