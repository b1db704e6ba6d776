//! Outgoing authoritative actor snapshots
//!
//! Every tick the broadcaster sends an `ActorUpdate` for each actor whose
//! visible state changed since it was last sent. Every `keyframe_ticks` it
//! sends all of them regardless, so clients that dropped a datagram converge.

use crate::flight::ActionSimulator;
use crate::game::{GameState, ServerActor};
use shared::{ActorPhase, Packet};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SentState {
    position: [f32; 3],
    rotation: f32,
    phase: ActorPhase,
    input_timestamp: Option<u32>,
}

impl SentState {
    fn of(actor: &ServerActor) -> Self {
        Self {
            position: actor.state.position,
            rotation: actor.state.rotation,
            phase: actor.phase,
            input_timestamp: actor.last_input_timestamp,
        }
    }
}

pub struct ActionBroadcaster {
    keyframe_ticks: u32,
    ticks: u32,
    last_sent: HashMap<u32, SentState>,
}

impl ActionBroadcaster {
    pub fn new(keyframe_ticks: u32) -> Self {
        Self {
            keyframe_ticks: keyframe_ticks.max(1),
            ticks: 0,
            last_sent: HashMap::new(),
        }
    }

    pub fn actor_update(actor: &ServerActor) -> Packet {
        Packet::ActorUpdate {
            server_actor_id: actor.id,
            client_id: actor.owner.client_id,
            player_id: actor.owner.player_id,
            position: actor.state.position,
            rotation: actor.state.rotation,
            timestamp: actor.state.timestamp,
            input_timestamp: actor.last_input_timestamp,
            phase: actor.phase,
        }
    }

    pub fn actor_spawn(actor: &ServerActor) -> Packet {
        Packet::ActorSpawn {
            owner_client_id: actor.owner.client_id,
            owner_player_id: actor.owner.player_id,
            server_actor_id: actor.id,
            position: actor.state.position,
            rotation: actor.state.rotation,
            timestamp: actor.state.timestamp,
        }
    }

    /// Snapshots to broadcast this tick, ordered by actor id
    pub fn collect<S: ActionSimulator>(&mut self, game: &GameState<S>) -> Vec<Packet> {
        self.ticks = self.ticks.wrapping_add(1);
        let keyframe = self.ticks % self.keyframe_ticks == 0;

        let actors = game.actors();
        self.last_sent
            .retain(|id, _| actors.iter().any(|actor| actor.id == *id));

        let mut packets = Vec::new();
        for actor in actors {
            let current = SentState::of(actor);
            if keyframe || self.last_sent.get(&actor.id) != Some(&current) {
                self.last_sent.insert(actor.id, current);
                packets.push(Self::actor_update(actor));
            }
        }
        packets
    }

    /// Forces every actor into the next `collect`
    pub fn invalidate(&mut self) {
        self.last_sent.clear();
    }
}
