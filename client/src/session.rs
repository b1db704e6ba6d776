//! Client protocol state, independent of sockets
//!
//! `ClientSession` applies every server packet to the local game view and the
//! turn mirror, and reports what happened as `ClientEvent`s for the driver.

use crate::game::ClientGameState;
use crate::turn::TurnMirror;
use log::{debug, info, warn};
use shared::{ActivePlayer, ActorState, Packet, SyncError, TurnState, COURSE};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected {
        client_id: u32,
    },
    TurnChanged(TurnState),
    HoleChanged(u8),
    Score {
        client_id: u32,
        player_id: u8,
        hole: u8,
        strokes: u8,
        total: u32,
    },
    WarnTime(u8),
    TurnTimedOut(ActivePlayer),
    MaxStrokes(ActivePlayer),
    PlayerLeft(u32),
    GameOver,
}

#[derive(Debug, Default)]
pub struct ClientSession {
    client_id: Option<u32>,
    game: ClientGameState,
    turn: TurnMirror,
    acknowledged: bool,
    game_over: bool,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn game(&self) -> &ClientGameState {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut ClientGameState {
        &mut self.game
    }

    pub fn turn(&self) -> &TurnMirror {
        &self.turn
    }

    /// True once the server has answered our ready announcement
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Pin of the hole being played
    pub fn pin(&self) -> [f32; 3] {
        let hole = (self.game.hole as usize).min(COURSE.len() - 1);
        COURSE[hole].pin
    }

    /// Local player that holds the turn and may act right now
    pub fn acting_player(&self) -> Option<u8> {
        let client_id = self.client_id?;
        let active = self.turn.state()?.active?;
        if active.client_id == client_id && self.turn.may_act(client_id, active.player_id) {
            Some(active.player_id)
        } else {
            None
        }
    }

    /// True while a shot sent at turn `sequence` has not been taken up yet:
    /// the server still shows `player_id` aiming at that same sequence
    pub fn awaiting_acceptance(&self, sequence: u32, player_id: u8) -> bool {
        self.turn.sequence() == Some(sequence) && self.acting_player() == Some(player_id)
    }

    /// Applies one server packet
    ///
    /// Only a lost connection is returned as an error; stale or out-of-order
    /// updates are logged and dropped here.
    pub fn handle_packet(&mut self, packet: Packet) -> Result<Vec<ClientEvent>, SyncError> {
        let mut events = Vec::new();

        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.game.set_client_id(client_id);
                events.push(ClientEvent::Connected { client_id });
            }
            Packet::Disconnected { reason } => {
                return Err(SyncError::ConnectionLost(reason));
            }
            Packet::ActorSpawn {
                owner_client_id,
                owner_player_id,
                server_actor_id,
                position,
                rotation,
                timestamp,
            } => {
                self.acknowledged = true;
                self.game.apply_spawn(
                    server_actor_id,
                    ActivePlayer {
                        client_id: owner_client_id,
                        player_id: owner_player_id,
                    },
                    ActorState::new(position, rotation, timestamp),
                );
            }
            Packet::ActorUpdate {
                server_actor_id,
                client_id,
                player_id,
                position,
                rotation,
                timestamp,
                input_timestamp,
                phase,
            } => {
                let result = self.game.apply_actor_update(
                    server_actor_id,
                    ActivePlayer {
                        client_id,
                        player_id,
                    },
                    ActorState::new(position, rotation, timestamp),
                    input_timestamp,
                    phase,
                );
                match result {
                    Ok(replayed) if replayed > 0 => {
                        debug!("Actor {} replayed {} inputs", server_actor_id, replayed)
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Actor {}: {}", server_actor_id, e),
                }
            }
            Packet::SetPlayer { turn } => {
                self.acknowledged = true;
                match self.turn.apply(turn) {
                    Ok(()) => events.push(ClientEvent::TurnChanged(turn)),
                    Err(e) => debug!("{}", e),
                }
            }
            Packet::EntityRemoved { server_actor_id } => {
                self.game.remove_actor(server_actor_id);
            }
            Packet::ClientDisconnected { client_id } => {
                info!("Client {} left the match", client_id);
                events.push(ClientEvent::PlayerLeft(client_id));
            }
            Packet::WarnTime { seconds } => events.push(ClientEvent::WarnTime(seconds)),
            Packet::TurnTimedOut {
                client_id,
                player_id,
            } => events.push(ClientEvent::TurnTimedOut(ActivePlayer {
                client_id,
                player_id,
            })),
            Packet::MaxStrokes {
                client_id,
                player_id,
            } => events.push(ClientEvent::MaxStrokes(ActivePlayer {
                client_id,
                player_id,
            })),
            Packet::ScoreUpdate {
                client_id,
                player_id,
                hole,
                strokes,
                total,
            } => events.push(ClientEvent::Score {
                client_id,
                player_id,
                hole,
                strokes,
                total,
            }),
            Packet::SetHole { hole } => {
                if hole != self.game.hole {
                    info!("Hole {}", hole + 1);
                }
                self.game.hole = hole;
                events.push(ClientEvent::HoleChanged(hole));
            }
            Packet::GameEnd => {
                self.game_over = true;
                events.push(ClientEvent::GameOver);
            }
            other => warn!("Unexpected packet from server: {:?}", other),
        }

        Ok(events)
    }
}
