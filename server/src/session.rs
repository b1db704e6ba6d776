//! One match, independent of sockets
//!
//! `MatchSession` owns the authoritative actors, the turn protocol and the
//! snapshot broadcaster. The network layer feeds it validated packets by
//! client id and delivers the `Outgoing` packets it returns.

use crate::broadcast::ActionBroadcaster;
use crate::flight::{ActionSimulator, BallFlight};
use crate::game::GameState;
use crate::turn::{TurnCommand, TurnConfig, TurnEvent, TurnProtocol};
use log::{debug, info, warn};
use shared::{ActivePlayer, Packet, SyncError};
use std::time::Instant;

/// Ticks between full snapshot keyframes
pub const KEYFRAME_TICKS: u32 = 30;
/// Ticks between repeats of the current turn state
pub const TURN_RESEND_TICKS: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Broadcast(Packet),
    Send { client_id: u32, packet: Packet },
}

pub struct MatchSession<S: ActionSimulator = BallFlight> {
    game: GameState<S>,
    turn: TurnProtocol,
    broadcaster: ActionBroadcaster,
    epoch: Instant,
    finished: bool,
}

impl<S: ActionSimulator> MatchSession<S> {
    pub fn new(config: TurnConfig, now: Instant) -> Self {
        Self {
            game: GameState::new(),
            turn: TurnProtocol::new(config, now),
            broadcaster: ActionBroadcaster::new(KEYFRAME_TICKS),
            epoch: now,
            finished: false,
        }
    }

    pub fn game(&self) -> &GameState<S> {
        &self.game
    }

    pub fn turn(&self) -> &TurnProtocol {
        &self.turn
    }

    pub fn is_started(&self) -> bool {
        self.turn.is_started()
    }

    /// True once the round is over and the final packets are queued
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Server clock in milliseconds since the session began
    pub fn timestamp(&self, now: Instant) -> u32 {
        now.saturating_duration_since(self.epoch).as_millis() as u32
    }

    /// Creates actors for a newly connected client
    pub fn add_client(&mut self, client_id: u32, player_count: u8, now: Instant) -> Vec<Outgoing> {
        let timestamp = self.timestamp(now);
        let mut out = Vec::new();

        for player_id in 0..player_count {
            let owner = ActivePlayer {
                client_id,
                player_id,
            };
            let server_actor_id = self.game.spawn_actor(owner, timestamp);
            let commands = self.turn.handle(
                TurnEvent::PlayerJoined {
                    client_id,
                    player_id,
                    server_actor_id,
                },
                now,
            );
            self.execute(commands, now, &mut out);
        }

        out
    }

    /// Drops a client's actors and tells everyone else
    pub fn remove_client(&mut self, client_id: u32, now: Instant) -> Vec<Outgoing> {
        let mut out = Vec::new();

        for server_actor_id in self.game.remove_actors_for(client_id) {
            out.push(Outgoing::Broadcast(Packet::EntityRemoved { server_actor_id }));
        }
        out.push(Outgoing::Broadcast(Packet::ClientDisconnected { client_id }));

        let commands = self
            .turn
            .handle(TurnEvent::ClientDisconnected { client_id }, now);
        self.execute(commands, now, &mut out);
        out
    }

    /// Handles a packet from a connected client
    pub fn handle_packet(&mut self, client_id: u32, packet: Packet, now: Instant) -> Vec<Outgoing> {
        let mut out = Vec::new();

        match packet {
            Packet::ClientReady { .. } => {
                // answered every time so a lost reply is repaired by the retry
                for actor in self.game.actors() {
                    out.push(Outgoing::Send {
                        client_id,
                        packet: ActionBroadcaster::actor_spawn(actor),
                    });
                }
                out.push(Outgoing::Send {
                    client_id,
                    packet: Packet::SetHole {
                        hole: self.turn.hole(),
                    },
                });
                out.push(Outgoing::Send {
                    client_id,
                    packet: Packet::SetPlayer {
                        turn: *self.turn.state(),
                    },
                });

                let commands = self.turn.handle(TurnEvent::ClientReady { client_id }, now);
                self.execute(commands, now, &mut out);
            }
            Packet::PlayerInput {
                player_id, input, ..
            } => {
                if !self.turn.state().may_act(client_id, player_id) {
                    debug!(
                        "{}",
                        SyncError::StaleInput {
                            client_id,
                            player_id
                        }
                    );
                    return out;
                }
                self.game.add_input(
                    ActivePlayer {
                        client_id,
                        player_id,
                    },
                    input,
                );
            }
            Packet::InputUpdate {
                player_id, shot, ..
            } => {
                // inputs that arrived with the shot must land before launch
                self.game.process_inputs(self.timestamp(now));
                let commands = self.turn.handle(
                    TurnEvent::ActionSubmitted {
                        client_id,
                        player_id,
                        shot,
                    },
                    now,
                );
                self.execute(commands, now, &mut out);
            }
            Packet::SkipTurn { .. } => {
                let commands = self.turn.handle(TurnEvent::SkipTurn { client_id }, now);
                self.execute(commands, now, &mut out);
            }
            Packet::Heartbeat { .. } => {}
            other => warn!("Unexpected packet from client {}: {:?}", client_id, other),
        }

        out
    }

    /// Advances the match by one server tick
    pub fn tick(&mut self, dt: f32, now: Instant) -> Vec<Outgoing> {
        let timestamp = self.timestamp(now);
        let mut out = Vec::new();

        self.game.process_inputs(timestamp);

        if let Some(settled) = self.game.step_flight(dt, timestamp) {
            let commands = self.turn.handle(
                TurnEvent::ActionSettled {
                    server_actor_id: settled.server_actor_id,
                    position: settled.position,
                    holed: settled.holed,
                },
                now,
            );
            self.execute(commands, now, &mut out);
        }

        let commands = self.turn.handle(TurnEvent::Tick, now);
        self.execute(commands, now, &mut out);

        out.extend(
            self.broadcaster
                .collect(&self.game)
                .into_iter()
                .map(Outgoing::Broadcast),
        );

        self.game.tick = self.game.tick.wrapping_add(1);
        if self.is_started() && !self.finished && self.game.tick % TURN_RESEND_TICKS == 0 {
            out.push(Outgoing::Broadcast(Packet::SetPlayer {
                turn: *self.turn.state(),
            }));
        }

        out
    }

    fn execute(&mut self, commands: Vec<TurnCommand>, now: Instant, out: &mut Vec<Outgoing>) {
        let timestamp = self.timestamp(now);

        for command in commands {
            match command {
                TurnCommand::Broadcast(packet) => out.push(Outgoing::Broadcast(packet)),
                TurnCommand::LaunchAction(action) => {
                    if !self
                        .game
                        .launch(action.server_actor_id, &action.shot, timestamp)
                    {
                        warn!("Could not launch actor {}", action.server_actor_id);
                    }
                }
                TurnCommand::FastForward { server_actor_id } => {
                    self.game.fast_forward(server_actor_id)
                }
                TurnCommand::AbortAction { server_actor_id } => {
                    self.game.abort_flight(server_actor_id)
                }
                TurnCommand::Forfeit { server_actor_id } => self.game.mark_holed(server_actor_id),
                TurnCommand::ResetActors { hole } => {
                    self.game.reset_for_hole(hole, timestamp);
                    self.broadcaster.invalidate();
                }
                TurnCommand::EndMatch => {
                    info!("Match finished after {} ticks", self.game.tick);
                    self.finished = true;
                }
            }
        }
    }
}
