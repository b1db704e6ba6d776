//! Headless automatic player
//!
//! Drives a local actor through the same control events a person would: turn
//! to face the pin, let go of the stick, then take a shot sized for the
//! remaining distance.

use crate::input::ControlEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::actor::{INPUT_DT, TURN_SPEED};
use shared::{ActorState, ShotRequest, GRAVITY, ROLL_FRICTION};

/// Aim error small enough to shoot
pub const AIM_TOLERANCE: f32 = 0.02;
/// Beyond this distance the ball is lofted instead of rolled
pub const PUTT_RANGE: f32 = 15.0;
/// Share of a lofted shot's distance covered in the air
const CARRY_SHARE: f32 = 0.6;
const POWER_JITTER: f32 = 0.05;

pub const CLUB_PUTTER: u8 = 0;
pub const CLUB_IRON: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BotAction {
    Control(ControlEvent),
    Shoot(ShotRequest),
    Wait,
}

pub struct AutoPlayer {
    rng: StdRng,
    stick_held: bool,
}

impl AutoPlayer {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            stick_held: false,
        }
    }

    /// Forgets any half-finished aim, for a fresh turn
    pub fn reset(&mut self) {
        self.stick_held = false;
    }

    /// Yaw that faces `pin` from `from`
    pub fn aim_at(from: [f32; 3], pin: [f32; 3]) -> f32 {
        (pin[0] - from[0]).atan2(-(pin[2] - from[2]))
    }

    /// Next step towards a shot at `pin` for an actor in `state`
    pub fn next_action(&mut self, state: &ActorState, pin: [f32; 3]) -> BotAction {
        let error = Self::aim_at(state.position, pin) - state.rotation;

        if error.abs() > AIM_TOLERANCE {
            let full_step = TURN_SPEED * INPUT_DT;
            let x = (error / full_step * 127.0).round().clamp(-127.0, 127.0) as i8;
            if x != 0 {
                self.stick_held = true;
                return BotAction::Control(ControlEvent::Axis { x, y: 0 });
            }
        }

        if self.stick_held {
            self.stick_held = false;
            return BotAction::Control(ControlEvent::Axis { x: 0, y: 0 });
        }

        BotAction::Shoot(self.shot(state, pin))
    }

    fn shot(&mut self, state: &ActorState, pin: [f32; 3]) -> ShotRequest {
        let distance = state.ground_distance(pin);
        let power = self.rng.gen_range(1.0 - POWER_JITTER..1.0 + POWER_JITTER);
        let (sin, cos) = state.rotation.sin_cos();

        if distance <= PUTT_RANGE {
            let speed = (2.0 * ROLL_FRICTION * distance).sqrt() * power;
            ShotRequest {
                impulse: [sin * speed, 0.0, -cos * speed],
                spin: [0.0, 0.0],
                club: CLUB_PUTTER,
            }
        } else {
            // 45 degrees: carry = v^2 / g
            let speed = (GRAVITY * CARRY_SHARE * distance).sqrt() * power;
            let component = speed * std::f32::consts::FRAC_1_SQRT_2;
            ShotRequest {
                impulse: [sin * component, component, -cos * component],
                spin: [0.0, 0.0],
                club: CLUB_IRON,
            }
        }
    }
}
