//! Actor state and the deterministic movement function
//!
//! `ActorState::apply_input` is the only place an input changes an actor. The
//! client runs it for prediction and replay, the server runs it for the
//! authoritative copy, so both must produce identical bits for identical input.

use crate::input::{button, Input};
use serde::{Deserialize, Serialize};

/// Simulated time covered by a single input sample
pub const INPUT_DT: f32 = 1.0 / 60.0;
/// Stance shuffle speed in metres per second
pub const MOVE_SPEED: f32 = 1.5;
/// Aim rotation speed in radians per second
pub const TURN_SPEED: f32 = 1.2;
/// Aim is clamped to half a turn either side of straight down the course
pub const MAX_AIM_ANGLE: f32 = std::f32::consts::PI;

const AXIS_MAX: f32 = 127.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorPhase {
    Idle,
    Flight,
    Holed,
}

/// Position, yaw and the server time the state was valid at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    pub position: [f32; 3],
    pub rotation: f32,
    pub timestamp: u32,
}

impl ActorState {
    pub fn new(position: [f32; 3], rotation: f32, timestamp: u32) -> Self {
        Self {
            position,
            rotation,
            timestamp,
        }
    }

    /// Integrates one controller sample
    pub fn apply_input(&mut self, input: &Input) {
        if input.is_neutral() {
            return;
        }

        let mut turn = input.axis_x as f32 / AXIS_MAX;
        if input.pressed(button::LEFT) {
            turn -= 1.0;
        }
        if input.pressed(button::RIGHT) {
            turn += 1.0;
        }

        let mut forward = input.axis_y as f32 / AXIS_MAX;
        if input.pressed(button::UP) {
            forward += 1.0;
        }
        if input.pressed(button::DOWN) {
            forward -= 1.0;
        }

        let turn = turn.clamp(-1.0, 1.0);
        let forward = forward.clamp(-1.0, 1.0);

        self.rotation =
            (self.rotation + turn * TURN_SPEED * INPUT_DT).clamp(-MAX_AIM_ANGLE, MAX_AIM_ANGLE);

        let step = forward * MOVE_SPEED * INPUT_DT;
        self.position[0] += self.rotation.sin() * step;
        self.position[2] -= self.rotation.cos() * step;
    }

    /// Distance to `point` across the ground plane
    pub fn ground_distance(&self, point: [f32; 3]) -> f32 {
        let dx = point[0] - self.position[0];
        let dz = point[2] - self.position[2];
        (dx * dx + dz * dz).sqrt()
    }

    /// Linear blend towards `other` by `alpha` in [0, 1]
    pub fn lerp(&self, other: &ActorState, alpha: f32) -> ActorState {
        let alpha = alpha.clamp(0.0, 1.0);
        let mut position = self.position;
        for (axis, target) in position.iter_mut().zip(other.position.iter()) {
            *axis += (target - *axis) * alpha;
        }

        ActorState {
            position,
            rotation: self.rotation + (other.rotation - self.rotation) * alpha,
            timestamp: self.timestamp
                + ((other.timestamp.saturating_sub(self.timestamp)) as f32 * alpha) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn input(buttons: u16) -> Input {
        Input {
            timestamp: 0,
            buttons,
            axis_x: 0,
            axis_y: 0,
        }
    }

    #[test]
    fn test_neutral_input_is_noop() {
        let mut state = ActorState::new([1.0, 0.0, -2.0], 0.3, 10);
        let before = state;
        state.apply_input(&Input::neutral(5));
        assert_eq!(state, before);
    }

    #[test]
    fn test_forward_moves_along_facing() {
        let mut state = ActorState::new([0.0, 0.0, 0.0], 0.0, 0);
        state.apply_input(&input(button::UP));

        assert_approx_eq!(state.position[0], 0.0, 1e-6);
        assert_approx_eq!(state.position[2], -MOVE_SPEED * INPUT_DT, 1e-6);
        assert_eq!(state.rotation, 0.0);
    }

    #[test]
    fn test_rotation_clamped_to_aim_limit() {
        let mut state = ActorState::new([0.0, 0.0, 0.0], 0.0, 0);
        for _ in 0..1000 {
            state.apply_input(&input(button::RIGHT));
        }
        assert_eq!(state.rotation, MAX_AIM_ANGLE);

        for _ in 0..2000 {
            state.apply_input(&input(button::LEFT));
        }
        assert_eq!(state.rotation, -MAX_AIM_ANGLE);
    }

    #[test]
    fn test_axis_and_buttons_saturate() {
        let mut from_axis = ActorState::new([0.0, 0.0, 0.0], 0.0, 0);
        from_axis.apply_input(&Input {
            timestamp: 0,
            buttons: button::RIGHT,
            axis_x: 127,
            axis_y: -128,
        });

        let mut from_buttons = ActorState::new([0.0, 0.0, 0.0], 0.0, 0);
        from_buttons.apply_input(&input(button::RIGHT | button::DOWN));

        assert_eq!(from_axis, from_buttons);
    }

    #[test]
    fn test_same_inputs_same_bits() {
        let inputs: Vec<Input> = (0..200)
            .map(|i| Input {
                timestamp: i,
                buttons: if i % 3 == 0 { button::UP } else { button::RIGHT },
                axis_x: (i % 17) as i8 - 8,
                axis_y: (i % 5) as i8,
            })
            .collect();

        let mut a = ActorState::new([3.0, 0.0, 4.0], 0.1, 0);
        let mut b = a;
        for input in &inputs {
            a.apply_input(input);
        }
        for input in &inputs {
            b.apply_input(input);
        }

        assert_eq!(a.position[0].to_bits(), b.position[0].to_bits());
        assert_eq!(a.position[2].to_bits(), b.position[2].to_bits());
        assert_eq!(a.rotation.to_bits(), b.rotation.to_bits());
    }

    #[test]
    fn test_ground_distance_ignores_height() {
        let state = ActorState::new([0.0, 5.0, 0.0], 0.0, 0);
        assert_approx_eq!(state.ground_distance([3.0, -2.0, 4.0]), 5.0, 1e-6);
    }

    #[test]
    fn test_lerp() {
        let a = ActorState::new([0.0, 0.0, 0.0], 0.0, 100);
        let b = ActorState::new([10.0, 2.0, -4.0], 1.0, 200);
        let mid = a.lerp(&b, 0.5);

        assert_approx_eq!(mid.position[0], 5.0, 1e-6);
        assert_approx_eq!(mid.position[1], 1.0, 1e-6);
        assert_approx_eq!(mid.position[2], -2.0, 1e-6);
        assert_approx_eq!(mid.rotation, 0.5, 1e-6);
        assert_eq!(mid.timestamp, 150);
        assert_eq!(a.lerp(&b, 3.0).position, b.position);
    }
}
