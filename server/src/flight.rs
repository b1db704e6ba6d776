//! Resolution of a submitted shot into a resting position
//!
//! The turn protocol only needs "simulate one action and report its outcome";
//! `ActionSimulator` is that contract and `BallFlight` the simple deterministic
//! ball model the server ships with.

use shared::{ShotRequest, GRAVITY, ROLL_FRICTION};

/// Vertical speed kept after a bounce
pub const RESTITUTION: f32 = 0.35;
/// Horizontal speed kept after a bounce
pub const BOUNCE_FRICTION: f32 = 0.8;
/// Below this ground speed the ball is at rest
pub const SETTLE_SPEED: f32 = 0.05;
/// Smallest vertical speed that still bounces
const MIN_BOUNCE_SPEED: f32 = 0.5;
/// Sideways acceleration per unit of side spin
const SPIN_CURVE: f32 = 0.5;

const FAST_FORWARD_DT: f32 = 1.0 / 60.0;
const MAX_FAST_FORWARD_STEPS: u32 = 60 * 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightStatus {
    Moving,
    Settled,
}

pub trait ActionSimulator {
    fn launch(start: [f32; 3], shot: &ShotRequest) -> Self
    where
        Self: Sized;

    /// Advances the action; once `Settled` is returned it stays settled
    fn step(&mut self, dt: f32) -> FlightStatus;

    fn position(&self) -> [f32; 3];

    /// Runs the action to completion immediately
    fn fast_forward(&mut self);
}

#[derive(Debug, Clone)]
pub struct BallFlight {
    position: [f32; 3],
    velocity: [f32; 3],
    side_spin: f32,
    settled: bool,
}

impl BallFlight {
    pub fn velocity(&self) -> [f32; 3] {
        self.velocity
    }

    fn airborne(&self) -> bool {
        self.position[1] > 0.0 || self.velocity[1] > 0.0
    }

    fn step_air(&mut self, dt: f32) {
        self.velocity[1] -= GRAVITY * dt;

        // curve sideways relative to the direction of travel
        let (vx, vz) = (self.velocity[0], self.velocity[2]);
        let speed = (vx * vx + vz * vz).sqrt();
        if speed > 0.0 {
            let curve = self.side_spin * SPIN_CURVE * dt;
            self.velocity[0] += -vz / speed * curve;
            self.velocity[2] += vx / speed * curve;
        }

        for axis in 0..3 {
            self.position[axis] += self.velocity[axis] * dt;
        }

        if self.position[1] <= 0.0 {
            self.position[1] = 0.0;
            if -self.velocity[1] > MIN_BOUNCE_SPEED {
                self.velocity[1] = -self.velocity[1] * RESTITUTION;
                self.velocity[0] *= BOUNCE_FRICTION;
                self.velocity[2] *= BOUNCE_FRICTION;
            } else {
                self.velocity[1] = 0.0;
            }
        }
    }

    fn step_roll(&mut self, dt: f32) {
        let (vx, vz) = (self.velocity[0], self.velocity[2]);
        let speed = (vx * vx + vz * vz).sqrt();
        if speed < SETTLE_SPEED {
            self.velocity = [0.0; 3];
            self.settled = true;
            return;
        }

        let new_speed = (speed - ROLL_FRICTION * dt).max(0.0);
        let scale = new_speed / speed;
        self.velocity[0] *= scale;
        self.velocity[2] *= scale;

        self.position[0] += self.velocity[0] * dt;
        self.position[2] += self.velocity[2] * dt;
    }
}

impl ActionSimulator for BallFlight {
    fn launch(start: [f32; 3], shot: &ShotRequest) -> Self {
        Self {
            position: start,
            velocity: shot.impulse,
            side_spin: shot.spin[0],
            settled: false,
        }
    }

    fn step(&mut self, dt: f32) -> FlightStatus {
        if self.settled {
            return FlightStatus::Settled;
        }

        if self.airborne() {
            self.step_air(dt);
        } else {
            self.step_roll(dt);
        }

        if self.settled {
            FlightStatus::Settled
        } else {
            FlightStatus::Moving
        }
    }

    fn position(&self) -> [f32; 3] {
        self.position
    }

    fn fast_forward(&mut self) {
        for _ in 0..MAX_FAST_FORWARD_STEPS {
            if self.step(FAST_FORWARD_DT) == FlightStatus::Settled {
                return;
            }
        }
        self.velocity = [0.0; 3];
        self.position[1] = 0.0;
        self.settled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn shot(impulse: [f32; 3]) -> ShotRequest {
        ShotRequest {
            impulse,
            spin: [0.0, 0.0],
            club: 0,
        }
    }

    fn run_to_rest(flight: &mut BallFlight) -> u32 {
        let mut steps = 0;
        while flight.step(1.0 / 60.0) == FlightStatus::Moving {
            steps += 1;
            assert!(steps < 100_000, "flight never settled");
        }
        steps
    }

    #[test]
    fn test_putt_rolls_predicted_distance() {
        // v^2 / (2 * friction)
        let speed = 5.0;
        let mut flight = BallFlight::launch([0.0, 0.0, 0.0], &shot([0.0, 0.0, -speed]));
        run_to_rest(&mut flight);

        let expected = speed * speed / (2.0 * ROLL_FRICTION);
        assert_approx_eq!(-flight.position()[2], expected, 0.2);
        assert_eq!(flight.position()[1], 0.0);
    }

    #[test]
    fn test_lofted_shot_lands_and_settles() {
        let mut flight = BallFlight::launch([0.0, 0.0, 0.0], &shot([0.0, 12.0, -12.0]));
        assert_eq!(flight.step(1.0 / 60.0), FlightStatus::Moving);
        assert!(flight.position()[1] > 0.0);

        run_to_rest(&mut flight);
        assert_eq!(flight.position()[1], 0.0);
        assert!(flight.position()[2] < -12.0);
        assert_eq!(flight.velocity(), [0.0; 3]);
    }

    #[test]
    fn test_settled_stays_settled() {
        let mut flight = BallFlight::launch([1.0, 0.0, 1.0], &shot([0.0, 0.0, 0.0]));
        assert_eq!(flight.step(0.1), FlightStatus::Settled);
        assert_eq!(flight.step(0.1), FlightStatus::Settled);
        assert_eq!(flight.position(), [1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_fast_forward_matches_stepping() {
        let request = shot([2.0, 8.0, -15.0]);
        let mut stepped = BallFlight::launch([0.0, 0.0, 0.0], &request);
        run_to_rest(&mut stepped);

        let mut skipped = BallFlight::launch([0.0, 0.0, 0.0], &request);
        skipped.fast_forward();

        assert_eq!(stepped.position(), skipped.position());
        assert_eq!(skipped.step(0.1), FlightStatus::Settled);
    }

    #[test]
    fn test_side_spin_curves_ball() {
        let mut straight = BallFlight::launch([0.0, 0.0, 0.0], &shot([0.0, 10.0, -10.0]));
        let mut curved = BallFlight::launch(
            [0.0, 0.0, 0.0],
            &ShotRequest {
                impulse: [0.0, 10.0, -10.0],
                spin: [1.0, 0.0],
                club: 0,
            },
        );
        straight.fast_forward();
        curved.fast_forward();

        assert_approx_eq!(straight.position()[0], 0.0, 1e-4);
        assert!(curved.position()[0].abs() > 0.1);
    }
}
