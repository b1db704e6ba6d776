use crate::flight::{ActionSimulator, BallFlight, FlightStatus};
use log::{debug, info};
use shared::{
    ActivePlayer, ActorPhase, ActorState, Hole, Input, InputHistory, ShotRequest, COURSE,
    HOLE_RADIUS,
};
use std::collections::HashMap;

/// Spacing between actors standing on the same tee
const TEE_SPACING: f32 = 1.5;

/// Authoritative copy of one player's actor
#[derive(Debug, Clone)]
pub struct ServerActor {
    pub id: u32,
    pub owner: ActivePlayer,
    pub state: ActorState,
    pub phase: ActorPhase,
    pub history: InputHistory,
    /// Timestamp of the newest client input applied to `state`
    pub last_input_timestamp: Option<u32>,
}

/// Result of a shot coming to rest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    pub server_actor_id: u32,
    pub position: [f32; 3],
    pub holed: bool,
}

pub struct GameState<S: ActionSimulator = BallFlight> {
    pub tick: u32,
    actors: HashMap<u32, ServerActor>,
    next_actor_id: u32,
    flight: Option<(u32, S)>,
    hole: Hole,
}

impl<S: ActionSimulator> GameState<S> {
    pub fn new() -> Self {
        Self {
            tick: 0,
            actors: HashMap::new(),
            next_actor_id: 1,
            flight: None,
            hole: COURSE[0],
        }
    }

    pub fn hole(&self) -> &Hole {
        &self.hole
    }

    pub fn actor(&self, server_actor_id: u32) -> Option<&ServerActor> {
        self.actors.get(&server_actor_id)
    }

    pub fn actor_for(&self, owner: ActivePlayer) -> Option<&ServerActor> {
        self.actors.values().find(|actor| actor.owner == owner)
    }

    /// Actors ordered by id
    pub fn actors(&self) -> Vec<&ServerActor> {
        let mut actors: Vec<&ServerActor> = self.actors.values().collect();
        actors.sort_by_key(|actor| actor.id);
        actors
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn in_flight(&self) -> Option<u32> {
        self.flight.as_ref().map(|(id, _)| *id)
    }

    fn tee_position(&self, slot: usize) -> [f32; 3] {
        let mut position = self.hole.tee;
        position[0] += slot as f32 * TEE_SPACING;
        position
    }

    pub fn spawn_actor(&mut self, owner: ActivePlayer, timestamp: u32) -> u32 {
        let id = self.next_actor_id;
        self.next_actor_id += 1;

        let position = self.tee_position(self.actors.len());
        self.actors.insert(
            id,
            ServerActor {
                id,
                owner,
                state: ActorState::new(position, 0.0, timestamp),
                phase: ActorPhase::Idle,
                history: InputHistory::new(),
                last_input_timestamp: None,
            },
        );

        info!(
            "Spawned actor {} for {}:{} at {:?}",
            id, owner.client_id, owner.player_id, position
        );
        id
    }

    /// Removes every actor a client owns and returns their ids
    pub fn remove_actors_for(&mut self, client_id: u32) -> Vec<u32> {
        let mut removed: Vec<u32> = self
            .actors
            .values()
            .filter(|actor| actor.owner.client_id == client_id)
            .map(|actor| actor.id)
            .collect();
        removed.sort_unstable();

        for id in &removed {
            self.actors.remove(id);
            if self.in_flight() == Some(*id) {
                self.flight = None;
            }
            info!("Removed actor {}", id);
        }
        removed
    }

    /// Queues an input for the owner's actor. Inputs not newer than the last
    /// one received are dropped.
    pub fn add_input(&mut self, owner: ActivePlayer, input: Input) -> bool {
        let Some(actor) = self.actors.values_mut().find(|actor| actor.owner == owner) else {
            return false;
        };
        if actor.phase != ActorPhase::Idle {
            return false;
        }

        let newest = actor.history.newest().map(|i| i.timestamp);
        let accepted = actor.history.record_if_newer(input);
        if !accepted {
            debug!(
                "Dropping input {} for actor {} (newest {:?})",
                input.timestamp, actor.id, newest
            );
        }
        accepted
    }

    /// Applies every queued input and returns the ids of actors that changed
    pub fn process_inputs(&mut self, timestamp: u32) -> Vec<u32> {
        let mut changed = Vec::new();

        for actor in self.actors.values_mut() {
            if actor.history.unconsumed_len() == 0 {
                continue;
            }

            for input in actor.history.unconsumed() {
                actor.state.apply_input(input);
                actor.last_input_timestamp = Some(input.timestamp);
            }
            actor.history.consume_all();
            actor.state.timestamp = timestamp;
            changed.push(actor.id);
        }

        changed.sort_unstable();
        changed
    }

    /// Starts resolving a shot for `server_actor_id`
    pub fn launch(&mut self, server_actor_id: u32, shot: &ShotRequest, timestamp: u32) -> bool {
        if let Some((current, _)) = &self.flight {
            debug!("Actor {} is already in flight", current);
            return false;
        }
        let Some(actor) = self.actors.get_mut(&server_actor_id) else {
            return false;
        };

        actor.phase = ActorPhase::Flight;
        actor.state.timestamp = timestamp;
        self.flight = Some((server_actor_id, S::launch(actor.state.position, shot)));
        true
    }

    /// Advances the shot in flight, if any. Returns the outcome once it rests.
    pub fn step_flight(&mut self, dt: f32, timestamp: u32) -> Option<Settled> {
        let (id, flight) = self.flight.as_mut()?;
        let id = *id;
        let status = flight.step(dt);
        let position = flight.position();

        let actor = self.actors.get_mut(&id)?;
        actor.state.position = position;
        actor.state.timestamp = timestamp;

        if status == FlightStatus::Moving {
            return None;
        }

        self.flight = None;
        let holed = actor.state.ground_distance(self.hole.pin) <= HOLE_RADIUS;
        actor.phase = if holed {
            actor.state.position = self.hole.pin;
            ActorPhase::Holed
        } else {
            ActorPhase::Idle
        };

        Some(Settled {
            server_actor_id: id,
            position: actor.state.position,
            holed,
        })
    }

    /// Resolves the shot immediately; the next `step_flight` reports it
    pub fn fast_forward(&mut self, server_actor_id: u32) {
        if let Some((id, flight)) = self.flight.as_mut() {
            if *id == server_actor_id {
                flight.fast_forward();
            }
        }
    }

    /// Resolves the shot at once without reporting an outcome
    pub fn abort_flight(&mut self, server_actor_id: u32) {
        if self.in_flight() != Some(server_actor_id) {
            return;
        }
        if let Some((_, mut flight)) = self.flight.take() {
            flight.fast_forward();
            if let Some(actor) = self.actors.get_mut(&server_actor_id) {
                actor.state.position = flight.position();
                actor.phase = ActorPhase::Idle;
            }
        }
    }

    pub fn mark_holed(&mut self, server_actor_id: u32) {
        if let Some(actor) = self.actors.get_mut(&server_actor_id) {
            actor.phase = ActorPhase::Holed;
        }
    }

    /// Moves every actor back to the tee of `hole`
    pub fn reset_for_hole(&mut self, hole: u8, timestamp: u32) {
        self.hole = COURSE[(hole as usize).min(COURSE.len() - 1)];
        self.flight = None;

        let ids: Vec<u32> = self.actors().iter().map(|actor| actor.id).collect();
        for (slot, id) in ids.into_iter().enumerate() {
            let position = self.tee_position(slot);
            if let Some(actor) = self.actors.get_mut(&id) {
                actor.state = ActorState::new(position, 0.0, timestamp);
                actor.phase = ActorPhase::Idle;
            }
        }
        info!("Actors reset for hole {}", hole + 1);
    }
}

impl<S: ActionSimulator> Default for GameState<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::button;

    fn owner(client_id: u32) -> ActivePlayer {
        ActivePlayer {
            client_id,
            player_id: 0,
        }
    }

    fn forward(timestamp: u32) -> Input {
        Input {
            timestamp,
            buttons: button::UP,
            axis_x: 0,
            axis_y: 0,
        }
    }

    /// Rolls straight to the pin of the first hole
    fn putt_to(distance: f32) -> ShotRequest {
        ShotRequest {
            impulse: [0.0, 0.0, -(2.0 * shared::ROLL_FRICTION * distance).sqrt()],
            spin: [0.0, 0.0],
            club: 0,
        }
    }

    #[test]
    fn test_spawn_and_remove() {
        let mut game: GameState = GameState::new();
        let a = game.spawn_actor(owner(1), 0);
        let b = game.spawn_actor(owner(2), 0);
        let c = game.spawn_actor(
            ActivePlayer {
                client_id: 1,
                player_id: 1,
            },
            0,
        );

        assert_eq!((a, b, c), (1, 2, 3));
        assert_ne!(
            game.actor(a).unwrap().state.position,
            game.actor(b).unwrap().state.position
        );

        assert_eq!(game.remove_actors_for(1), vec![1, 3]);
        assert_eq!(game.len(), 1);
        assert!(game.actor_for(owner(2)).is_some());
    }

    #[test]
    fn test_inputs_applied_in_order() {
        let mut game: GameState = GameState::new();
        let id = game.spawn_actor(owner(1), 0);

        assert!(game.add_input(owner(1), forward(10)));
        assert!(game.add_input(owner(1), forward(20)));
        assert!(!game.add_input(owner(1), forward(15)));
        assert!(!game.add_input(owner(9), forward(30)));

        assert_eq!(game.process_inputs(500), vec![id]);

        let mut expected = ActorState::new([0.0, 0.0, 0.0], 0.0, 0);
        expected.apply_input(&forward(10));
        expected.apply_input(&forward(20));

        let actor = game.actor(id).unwrap();
        assert_eq!(actor.state.position, expected.position);
        assert_eq!(actor.state.timestamp, 500);
        assert_eq!(actor.last_input_timestamp, Some(20));

        assert!(game.process_inputs(510).is_empty());
    }

    #[test]
    fn test_putt_into_hole() {
        let mut game: GameState = GameState::new();
        let id = game.spawn_actor(owner(1), 0);

        assert!(game.launch(id, &putt_to(40.0), 0));
        assert_eq!(game.actor(id).unwrap().phase, ActorPhase::Flight);
        assert!(!game.add_input(owner(1), forward(10)));

        let mut settled = None;
        for step in 0..10_000 {
            if let Some(result) = game.step_flight(1.0 / 60.0, step) {
                settled = Some(result);
                break;
            }
        }

        let settled = settled.unwrap();
        assert!(settled.holed);
        assert_eq!(settled.position, COURSE[0].pin);
        assert_eq!(game.actor(id).unwrap().phase, ActorPhase::Holed);
        assert!(game.in_flight().is_none());
    }

    #[test]
    fn test_short_putt_stays_idle() {
        let mut game: GameState = GameState::new();
        let id = game.spawn_actor(owner(1), 0);
        game.launch(id, &putt_to(10.0), 0);
        game.fast_forward(id);

        let settled = game.step_flight(1.0 / 60.0, 1).unwrap();
        assert!(!settled.holed);
        assert!(settled.position[2] < -9.0);
        assert_eq!(game.actor(id).unwrap().phase, ActorPhase::Idle);
    }

    #[test]
    fn test_only_one_flight() {
        let mut game: GameState = GameState::new();
        let a = game.spawn_actor(owner(1), 0);
        let b = game.spawn_actor(owner(2), 0);

        assert!(game.launch(a, &putt_to(5.0), 0));
        assert!(!game.launch(b, &putt_to(5.0), 0));
        assert_eq!(game.in_flight(), Some(a));
    }

    #[test]
    fn test_abort_flight_reports_nothing() {
        let mut game: GameState = GameState::new();
        let id = game.spawn_actor(owner(1), 0);
        game.launch(id, &putt_to(10.0), 0);
        game.abort_flight(id);

        assert!(game.step_flight(1.0 / 60.0, 1).is_none());
        let actor = game.actor(id).unwrap();
        assert_eq!(actor.phase, ActorPhase::Idle);
        assert!(actor.state.position[2] < -9.0);
    }

    #[test]
    fn test_reset_for_hole() {
        let mut game: GameState = GameState::new();
        let id = game.spawn_actor(owner(1), 0);
        game.launch(id, &putt_to(40.0), 0);
        game.fast_forward(id);
        game.step_flight(1.0 / 60.0, 1);

        game.reset_for_hole(1, 100);
        let actor = game.actor(id).unwrap();
        assert_eq!(actor.phase, ActorPhase::Idle);
        assert_eq!(actor.state.position, COURSE[1].tee);
        assert_eq!(actor.state.timestamp, 100);
        assert_eq!(game.hole().pin, COURSE[1].pin);
    }
}
