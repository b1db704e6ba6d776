//! Server-side turn protocol
//!
//! `TurnProtocol` is a pure state machine: every input is a `TurnEvent` plus
//! the current time, every output a list of `TurnCommand`s for the session to
//! carry out. It owns the roster, the turn order, the per-hole stroke counts
//! and both watchdogs (the turn timer while a player aims, the settle timer
//! while a shot resolves). Each transition bumps the turn sequence and
//! broadcasts the new `TurnState`.

use log::{debug, info, warn};
use shared::{
    ActivePlayer, Packet, ShotRequest, SyncError, TurnPhase, TurnState, COURSE, MAX_STROKES,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub turn_time: Duration,
    pub warn_time: Duration,
    pub settle_timeout: Duration,
    pub advance_delay: Duration,
    pub hole_transition_delay: Duration,
    pub hole_count: u8,
    pub min_players: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_time: Duration::from_secs(90),
            warn_time: Duration::from_secs(10),
            settle_timeout: Duration::from_secs(20),
            advance_delay: Duration::from_secs(1),
            hole_transition_delay: Duration::from_secs(3),
            hole_count: COURSE.len() as u8,
            min_players: 1,
        }
    }
}

/// One participant in the rotation
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub client_id: u32,
    pub player_id: u8,
    pub server_actor_id: u32,
    pub strokes: Vec<u8>,
    pub holed: bool,
}

impl PlayerSlot {
    pub fn player(&self) -> ActivePlayer {
        ActivePlayer {
            client_id: self.client_id,
            player_id: self.player_id,
        }
    }

    pub fn total(&self) -> u32 {
        self.strokes.iter().map(|&s| s as u32).sum()
    }
}

/// The single action the server is currently resolving
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub client_id: u32,
    pub player_id: u8,
    pub server_actor_id: u32,
    pub shot: ShotRequest,
    pub submitted_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    PlayerJoined {
        client_id: u32,
        player_id: u8,
        server_actor_id: u32,
    },
    ClientReady {
        client_id: u32,
    },
    ActionSubmitted {
        client_id: u32,
        player_id: u8,
        shot: ShotRequest,
    },
    ActionSettled {
        server_actor_id: u32,
        position: [f32; 3],
        holed: bool,
    },
    SkipTurn {
        client_id: u32,
    },
    ClientDisconnected {
        client_id: u32,
    },
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnCommand {
    Broadcast(Packet),
    LaunchAction(PendingAction),
    /// Resolve the action now; its settle event still follows
    FastForward { server_actor_id: u32 },
    /// Drop the action where it is; no settle event follows
    AbortAction { server_actor_id: u32 },
    /// Mark the actor out of the current hole
    Forfeit { server_actor_id: u32 },
    ResetActors { hole: u8 },
    EndMatch,
}

pub struct TurnProtocol {
    config: TurnConfig,
    state: TurnState,
    roster: Vec<PlayerSlot>,
    ready: HashSet<u32>,
    pending: Option<PendingAction>,
    hole: u8,
    started: bool,
    phase_started: Instant,
    awaiting_delay: Duration,
    warned: bool,
    /// Where the rotation resumes when the last active player left the roster
    resume_index: usize,
}

impl TurnProtocol {
    pub fn new(mut config: TurnConfig, now: Instant) -> Self {
        config.hole_count = config.hole_count.max(1);
        let awaiting_delay = config.advance_delay;
        Self {
            config,
            state: TurnState::new(),
            roster: Vec::new(),
            ready: HashSet::new(),
            pending: None,
            hole: 0,
            started: false,
            phase_started: now,
            awaiting_delay,
            warned: false,
            resume_index: 0,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn roster(&self) -> &[PlayerSlot] {
        &self.roster
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn hole(&self) -> u8 {
        self.hole
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase == TurnPhase::RoundComplete
    }

    pub fn handle(&mut self, event: TurnEvent, now: Instant) -> Vec<TurnCommand> {
        let mut out = Vec::new();

        match event {
            TurnEvent::PlayerJoined {
                client_id,
                player_id,
                server_actor_id,
            } => {
                if self.roster.iter().any(|slot| {
                    slot.client_id == client_id && slot.player_id == player_id
                }) {
                    debug!("Player {}:{} already on the roster", client_id, player_id);
                } else {
                    self.roster.push(PlayerSlot {
                        client_id,
                        player_id,
                        server_actor_id,
                        strokes: vec![0; self.config.hole_count as usize],
                        holed: false,
                    });
                    info!(
                        "Player {}:{} joined ({} on roster)",
                        client_id,
                        player_id,
                        self.roster.len()
                    );
                }
            }
            TurnEvent::ClientReady { client_id } => {
                if self.roster.iter().any(|slot| slot.client_id == client_id) {
                    self.ready.insert(client_id);
                    self.try_start(now, &mut out);
                } else {
                    debug!("Ready from client {} with no players", client_id);
                }
            }
            TurnEvent::ActionSubmitted {
                client_id,
                player_id,
                shot,
            } => match self.accept_action(client_id, player_id, shot, now) {
                Ok(action) => {
                    let hole = self.hole as usize;
                    if let Some(slot) = self.active_slot_mut() {
                        slot.strokes[hole] = slot.strokes[hole].saturating_add(1);
                    }
                    info!(
                        "Player {}:{} takes a shot (actor {})",
                        client_id, player_id, action.server_actor_id
                    );
                    self.pending = Some(action.clone());
                    self.transition(TurnPhase::ActionResolving, self.state.active, now, &mut out);
                    out.push(TurnCommand::LaunchAction(action));
                }
                Err(e) => debug!("Discarding action: {}", e),
            },
            TurnEvent::ActionSettled {
                server_actor_id,
                position,
                holed,
            } => {
                let matches = self
                    .pending
                    .as_ref()
                    .map_or(false, |action| action.server_actor_id == server_actor_id);
                if self.state.phase == TurnPhase::ActionResolving && matches {
                    debug!(
                        "Actor {} settled at {:?}{}",
                        server_actor_id,
                        position,
                        if holed { " (holed)" } else { "" }
                    );
                    self.complete_turn(holed, now, &mut out);
                } else {
                    debug!("Ignoring settle of actor {} outside its turn", server_actor_id);
                }
            }
            TurnEvent::SkipTurn { client_id } => {
                match &self.pending {
                    Some(action)
                        if action.client_id == client_id
                            && self.state.phase == TurnPhase::ActionResolving =>
                    {
                        out.push(TurnCommand::FastForward {
                            server_actor_id: action.server_actor_id,
                        });
                    }
                    _ => debug!("Skip from client {} with nothing to skip", client_id),
                }
            }
            TurnEvent::ClientDisconnected { client_id } => {
                self.remove_client(client_id, now, &mut out);
            }
            TurnEvent::Tick => self.check_timers(now, &mut out),
        }

        out
    }

    fn accept_action(
        &self,
        client_id: u32,
        player_id: u8,
        shot: ShotRequest,
        now: Instant,
    ) -> Result<PendingAction, SyncError> {
        if self.pending.is_some() || !self.state.may_act(client_id, player_id) {
            return Err(SyncError::StaleInput {
                client_id,
                player_id,
            });
        }

        let server_actor_id = self
            .active_slot()
            .map(|slot| slot.server_actor_id)
            .ok_or(SyncError::StaleInput {
                client_id,
                player_id,
            })?;

        Ok(PendingAction {
            client_id,
            player_id,
            server_actor_id,
            shot,
            submitted_at: now,
        })
    }

    fn try_start(&mut self, now: Instant, out: &mut Vec<TurnCommand>) {
        if self.started
            || self.roster.is_empty()
            || self.roster.len() < self.config.min_players
        {
            return;
        }
        if !self
            .roster
            .iter()
            .all(|slot| self.ready.contains(&slot.client_id))
        {
            return;
        }

        self.started = true;
        info!("All {} players ready, starting match", self.roster.len());

        let first = self.roster[0].player();
        self.awaiting_delay = self.config.advance_delay;
        self.transition(TurnPhase::AwaitingReady, Some(first), now, out);
    }

    fn transition(
        &mut self,
        phase: TurnPhase,
        active: Option<ActivePlayer>,
        now: Instant,
        out: &mut Vec<TurnCommand>,
    ) {
        self.state.phase = phase;
        self.state.active = active;
        self.state.sequence += 1;
        self.phase_started = now;
        self.warned = false;

        debug!(
            "Turn {} -> {:?} ({:?})",
            self.state.sequence, self.state.phase, self.state.active
        );
        out.push(TurnCommand::Broadcast(Packet::SetPlayer { turn: self.state }));
    }

    fn complete_turn(&mut self, holed: bool, now: Instant, out: &mut Vec<TurnCommand>) {
        self.pending = None;
        let hole = self.hole;

        if let Some(slot) = self.active_slot_mut() {
            if holed {
                slot.holed = true;
                info!(
                    "Player {}:{} holed out in {}",
                    slot.client_id, slot.player_id, slot.strokes[hole as usize]
                );
            } else if slot.strokes[hole as usize] >= MAX_STROKES {
                slot.holed = true;
                info!(
                    "Player {}:{} reached the stroke limit",
                    slot.client_id, slot.player_id
                );
                out.push(TurnCommand::Broadcast(Packet::MaxStrokes {
                    client_id: slot.client_id,
                    player_id: slot.player_id,
                }));
                out.push(TurnCommand::Forfeit {
                    server_actor_id: slot.server_actor_id,
                });
            }
        }

        self.push_score(out);
        self.transition(TurnPhase::TurnComplete, self.state.active, now, out);
        self.advance(now, out);
    }

    fn forfeit_turn(&mut self, now: Instant, out: &mut Vec<TurnCommand>) {
        let hole = self.hole as usize;
        if let Some(slot) = self.active_slot_mut() {
            slot.strokes[hole] = MAX_STROKES;
            slot.holed = true;

            warn!(
                "{}",
                SyncError::TurnWatchdogTimeout {
                    client_id: slot.client_id,
                    player_id: slot.player_id,
                }
            );
            out.push(TurnCommand::Broadcast(Packet::TurnTimedOut {
                client_id: slot.client_id,
                player_id: slot.player_id,
            }));
            out.push(TurnCommand::Forfeit {
                server_actor_id: slot.server_actor_id,
            });
        }

        self.push_score(out);
        self.transition(TurnPhase::TurnComplete, self.state.active, now, out);
        self.advance(now, out);
    }

    fn push_score(&self, out: &mut Vec<TurnCommand>) {
        if let Some(slot) = self.active_slot() {
            out.push(TurnCommand::Broadcast(Packet::ScoreUpdate {
                client_id: slot.client_id,
                player_id: slot.player_id,
                hole: self.hole,
                strokes: slot.strokes[self.hole as usize],
                total: slot.total(),
            }));
        }
    }

    /// Hands the turn to the next player still on the hole, or moves the
    /// match to the next hole when nobody is left
    fn advance(&mut self, now: Instant, out: &mut Vec<TurnCommand>) {
        if self.roster.is_empty() {
            self.end_match(now, out);
            return;
        }

        if let Some(next) = self.next_player() {
            self.awaiting_delay = self.config.advance_delay;
            self.transition(TurnPhase::AwaitingReady, Some(next), now, out);
            return;
        }

        let finished_hole = self.hole as usize;
        self.hole += 1;
        if self.hole >= self.config.hole_count {
            self.end_match(now, out);
            return;
        }

        info!("Hole {} complete, moving to hole {}", finished_hole + 1, self.hole + 1);
        for slot in &mut self.roster {
            slot.holed = false;
        }

        // best score on the previous hole tees off first
        let first = self
            .roster
            .iter()
            .enumerate()
            .min_by_key(|(index, slot)| (slot.strokes[finished_hole], *index))
            .map(|(_, slot)| slot.player());

        out.push(TurnCommand::ResetActors { hole: self.hole });
        out.push(TurnCommand::Broadcast(Packet::SetHole { hole: self.hole }));
        self.awaiting_delay = self.config.hole_transition_delay;
        self.transition(TurnPhase::AwaitingReady, first, now, out);
    }

    fn end_match(&mut self, now: Instant, out: &mut Vec<TurnCommand>) {
        info!("Round complete");
        for slot in &self.roster {
            info!(
                "  {}:{} finished on {}",
                slot.client_id,
                slot.player_id,
                slot.total()
            );
        }
        self.pending = None;
        self.transition(TurnPhase::RoundComplete, None, now, out);
        out.push(TurnCommand::Broadcast(Packet::GameEnd));
        out.push(TurnCommand::EndMatch);
    }

    /// Next player in roster order after the current one who has not holed out
    fn next_player(&self) -> Option<ActivePlayer> {
        let len = self.roster.len();
        if len == 0 {
            return None;
        }

        let start = self
            .state
            .active
            .and_then(|active| {
                self.roster
                    .iter()
                    .position(|slot| slot.player() == active)
            })
            .map(|index| index + 1)
            .unwrap_or(self.resume_index);

        (0..len)
            .map(|offset| &self.roster[(start + offset) % len])
            .find(|slot| !slot.holed)
            .map(PlayerSlot::player)
    }

    fn remove_client(&mut self, client_id: u32, now: Instant, out: &mut Vec<TurnCommand>) {
        self.ready.remove(&client_id);

        let Some(first_index) = self
            .roster
            .iter()
            .position(|slot| slot.client_id == client_id)
        else {
            return;
        };
        self.roster.retain(|slot| slot.client_id != client_id);
        self.resume_index = first_index;
        info!(
            "Client {} left the rotation ({} players remain)",
            client_id,
            self.roster.len()
        );

        if !self.started {
            self.try_start(now, out);
            return;
        }
        if self.is_finished() {
            return;
        }

        let was_active = self
            .state
            .active
            .map_or(false, |active| active.client_id == client_id);

        if self.roster.is_empty() {
            self.end_match(now, out);
        } else if was_active {
            if let Some(action) = self.pending.take() {
                out.push(TurnCommand::AbortAction {
                    server_actor_id: action.server_actor_id,
                });
            }
            self.state.active = None;
            self.advance(now, out);
        }
    }

    fn check_timers(&mut self, now: Instant, out: &mut Vec<TurnCommand>) {
        let elapsed = now.saturating_duration_since(self.phase_started);

        match self.state.phase {
            TurnPhase::AwaitingReady if self.started => {
                if elapsed >= self.awaiting_delay {
                    self.transition(TurnPhase::PlayerActing, self.state.active, now, out);
                }
            }
            TurnPhase::PlayerActing => {
                let warn_at = self.config.turn_time.saturating_sub(self.config.warn_time);
                if !self.warned && elapsed >= warn_at && elapsed < self.config.turn_time {
                    self.warned = true;
                    out.push(TurnCommand::Broadcast(Packet::WarnTime {
                        seconds: self.config.warn_time.as_secs().min(u8::MAX as u64) as u8,
                    }));
                }
                if elapsed >= self.config.turn_time {
                    self.forfeit_turn(now, out);
                }
            }
            TurnPhase::ActionResolving => {
                if elapsed >= self.config.settle_timeout {
                    if let Some(action) = &self.pending {
                        warn!(
                            "Action by {}:{} did not settle in {:?}, forcing turn end",
                            action.client_id, action.player_id, self.config.settle_timeout
                        );
                        out.push(TurnCommand::AbortAction {
                            server_actor_id: action.server_actor_id,
                        });
                        out.push(TurnCommand::Broadcast(Packet::TurnTimedOut {
                            client_id: action.client_id,
                            player_id: action.player_id,
                        }));
                    }
                    self.complete_turn(false, now, out);
                }
            }
            _ => {}
        }
    }

    fn active_slot(&self) -> Option<&PlayerSlot> {
        let active = self.state.active?;
        self.roster.iter().find(|slot| slot.player() == active)
    }

    fn active_slot_mut(&mut self) -> Option<&mut PlayerSlot> {
        let active = self.state.active?;
        self.roster.iter_mut().find(|slot| slot.player() == active)
    }
}
