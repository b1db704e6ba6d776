//! Client-side view of the match: predicted local actors and interpolated
//! remote ones
//!
//! An actor owned by one of this client's players is a `LocalActor`. Its
//! inputs are recorded into an `InputHistory`, applied immediately by
//! `predict_step`, and corrected by `reconcile` whenever the server's copy
//! arrives: snap to the authoritative state, rewind the history to the last
//! input the server had applied, replay everything newer.
//!
//! Every other actor is only ever seen through server snapshots, which are
//! buffered and blended for display a little behind real time.

use log::{debug, info, warn};
use shared::{ActivePlayer, ActorPhase, ActorState, Input, InputHistory, SyncError};
use std::collections::{HashMap, VecDeque};

/// How far behind the newest snapshot remote actors are displayed
pub const INTERPOLATION_DELAY_MS: u32 = 100;
/// Snapshots kept per remote actor
pub const INTERPOLATION_BUFFER_LEN: usize = 32;

/// An actor this client predicts
#[derive(Debug, Clone)]
pub struct LocalActor {
    pub server_actor_id: u32,
    pub player_id: u8,
    pub phase: ActorPhase,
    predicted: ActorState,
    history: InputHistory,
    last_authoritative: Option<u32>,
    desync_guard: bool,
}

impl LocalActor {
    pub fn new(server_actor_id: u32, player_id: u8, state: ActorState) -> Self {
        Self {
            server_actor_id,
            player_id,
            phase: ActorPhase::Idle,
            predicted: state,
            history: InputHistory::new(),
            last_authoritative: None,
            desync_guard: false,
        }
    }

    pub fn state(&self) -> &ActorState {
        &self.predicted
    }

    pub fn history(&self) -> &InputHistory {
        &self.history
    }

    /// True while replay is suspended after the history lost its anchor
    pub fn is_guarded(&self) -> bool {
        self.desync_guard
    }

    pub fn record(&mut self, input: Input) {
        self.history.record(input);
    }

    /// Applies every input recorded since the last step, oldest first
    ///
    /// While the desync guard is up, inputs are consumed without effect until
    /// a neutral one clears it.
    pub fn predict_step(&mut self) -> usize {
        let mut applied = 0;

        for input in self.history.unconsumed() {
            if self.desync_guard {
                if input.is_neutral() {
                    self.desync_guard = false;
                    info!("Actor {} back in sync", self.server_actor_id);
                }
                continue;
            }
            self.predicted.apply_input(input);
            applied += 1;
        }

        self.history.consume_all();
        applied
    }

    /// Corrects the prediction with the server's copy
    ///
    /// `at_timestamp` is the newest input of ours the server had applied when
    /// it took the snapshot, `None` if it had applied none. Returns how many
    /// inputs were replayed on top of the snapshot.
    pub fn reconcile(
        &mut self,
        authoritative: ActorState,
        at_timestamp: Option<u32>,
    ) -> Result<usize, SyncError> {
        if let Some(last) = self.last_authoritative {
            if authoritative.timestamp < last {
                return Err(SyncError::OutOfOrderAuthority {
                    incoming: authoritative.timestamp,
                    last,
                });
            }
        }
        self.last_authoritative = Some(authoritative.timestamp);
        self.predicted = authoritative;

        let Some(target) = at_timestamp else {
            self.history.consume_all();
            return Ok(0);
        };

        if self.desync_guard || self.history.is_empty() {
            self.history.consume_all();
            return Ok(0);
        }

        if !self.history.rewind_to(target) {
            let oldest = self.history.oldest().map_or(0, |input| input.timestamp);
            let err = SyncError::DesyncTooOld { target, oldest };
            warn!("Actor {}: {}, suspending replay", self.server_actor_id, err);
            self.desync_guard = true;
            self.history.consume_all();
            return Err(err);
        }

        let mut replayed = 0;
        for input in self.history.unconsumed() {
            self.predicted.apply_input(input);
            replayed += 1;
        }
        self.history.consume_all();

        Ok(replayed)
    }
}

/// Timestamp-ordered snapshots of one remote actor
#[derive(Debug, Clone)]
pub struct InterpolationBuffer {
    snapshots: VecDeque<ActorState>,
    capacity: usize,
}

impl InterpolationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&ActorState> {
        self.snapshots.back()
    }

    /// Adds a snapshot; one older than the newest buffered is rejected and a
    /// repeat of the newest timestamp replaces it
    pub fn push(&mut self, state: ActorState) -> Result<(), SyncError> {
        if let Some(last) = self.snapshots.back_mut() {
            if state.timestamp < last.timestamp {
                return Err(SyncError::OutOfOrderAuthority {
                    incoming: state.timestamp,
                    last: last.timestamp,
                });
            }
            if state.timestamp == last.timestamp {
                *last = state;
                return Ok(());
            }
        }

        self.snapshots.push_back(state);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        Ok(())
    }

    /// State at `render_time`, blended between the snapshots around it and
    /// held at the ends of the buffer
    pub fn interpolated(&self, render_time: u32) -> Option<ActorState> {
        let first = self.snapshots.front()?;
        if render_time <= first.timestamp {
            return Some(*first);
        }

        for (before, after) in self.snapshots.iter().zip(self.snapshots.iter().skip(1)) {
            if render_time < after.timestamp {
                let span = (after.timestamp - before.timestamp) as f32;
                let alpha = (render_time - before.timestamp) as f32 / span;
                return Some(before.lerp(after, alpha));
            }
        }

        self.snapshots.back().copied()
    }
}

/// An actor another client controls
#[derive(Debug, Clone)]
pub struct RemoteActor {
    pub owner: ActivePlayer,
    pub phase: ActorPhase,
    pub buffer: InterpolationBuffer,
}

/// Everything the client knows about the actors in the match
#[derive(Debug, Default)]
pub struct ClientGameState {
    client_id: Option<u32>,
    local: HashMap<u32, LocalActor>,
    remote: HashMap<u32, RemoteActor>,
    pub hole: u8,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets our id and takes over any actor of ours that was seen before it
    /// was known
    pub fn set_client_id(&mut self, client_id: u32) {
        self.client_id = Some(client_id);

        let ours: Vec<u32> = self
            .remote
            .iter()
            .filter(|(_, actor)| actor.owner.client_id == client_id)
            .map(|(&id, _)| id)
            .collect();

        for server_actor_id in ours {
            let Some(remote) = self.remote.remove(&server_actor_id) else {
                continue;
            };
            let Some(state) = remote.buffer.latest().copied() else {
                continue;
            };
            debug!(
                "Actor {} belongs to player {}, now predicted",
                server_actor_id, remote.owner.player_id
            );
            let mut actor = LocalActor::new(server_actor_id, remote.owner.player_id, state);
            actor.phase = remote.phase;
            self.local.insert(server_actor_id, actor);
        }
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn local_actor(&self, server_actor_id: u32) -> Option<&LocalActor> {
        self.local.get(&server_actor_id)
    }

    pub fn local_actor_for(&self, player_id: u8) -> Option<&LocalActor> {
        self.local.values().find(|actor| actor.player_id == player_id)
    }

    pub fn remote_actor(&self, server_actor_id: u32) -> Option<&RemoteActor> {
        self.remote.get(&server_actor_id)
    }

    pub fn actor_count(&self) -> usize {
        self.local.len() + self.remote.len()
    }

    fn owns(&self, owner: ActivePlayer) -> bool {
        self.client_id == Some(owner.client_id)
    }

    /// Registers an actor; repeats for a known actor are ignored
    pub fn apply_spawn(&mut self, server_actor_id: u32, owner: ActivePlayer, state: ActorState) {
        if self.local.contains_key(&server_actor_id) || self.remote.contains_key(&server_actor_id) {
            return;
        }

        if self.owns(owner) {
            debug!(
                "Local actor {} for player {}",
                server_actor_id, owner.player_id
            );
            self.local.insert(
                server_actor_id,
                LocalActor::new(server_actor_id, owner.player_id, state),
            );
        } else {
            let mut buffer = InterpolationBuffer::new(INTERPOLATION_BUFFER_LEN);
            let _ = buffer.push(state);
            self.remote.insert(
                server_actor_id,
                RemoteActor {
                    owner,
                    phase: ActorPhase::Idle,
                    buffer,
                },
            );
        }
    }

    /// Routes an authoritative snapshot: our own actors reconcile, everyone
    /// else's feed the interpolation buffer
    pub fn apply_actor_update(
        &mut self,
        server_actor_id: u32,
        owner: ActivePlayer,
        state: ActorState,
        input_timestamp: Option<u32>,
        phase: ActorPhase,
    ) -> Result<usize, SyncError> {
        if !self.local.contains_key(&server_actor_id) && !self.remote.contains_key(&server_actor_id)
        {
            // the spawn was lost; the update carries everything needed
            self.apply_spawn(server_actor_id, owner, state);
        }

        if let Some(actor) = self.local.get_mut(&server_actor_id) {
            // nothing to replay while the server, not our input, moves it
            let at_timestamp = match phase {
                ActorPhase::Idle => input_timestamp,
                ActorPhase::Flight | ActorPhase::Holed => None,
            };
            let result = actor.reconcile(state, at_timestamp);
            // a desync still snapped to the snapshot
            if !matches!(result, Err(SyncError::OutOfOrderAuthority { .. })) {
                actor.phase = phase;
            }
            return result;
        }

        if let Some(actor) = self.remote.get_mut(&server_actor_id) {
            actor.buffer.push(state)?;
            actor.phase = phase;
        }
        Ok(0)
    }

    pub fn remove_actor(&mut self, server_actor_id: u32) -> bool {
        self.local.remove(&server_actor_id).is_some()
            || self.remote.remove(&server_actor_id).is_some()
    }

    /// Records an input for a local player's actor
    pub fn record_input(&mut self, player_id: u8, input: Input) -> bool {
        match self
            .local
            .values_mut()
            .find(|actor| actor.player_id == player_id)
        {
            Some(actor) => {
                actor.record(input);
                true
            }
            None => false,
        }
    }

    /// Runs prediction for every local actor
    pub fn predict_step(&mut self) {
        for actor in self.local.values_mut() {
            actor.predict_step();
        }
    }

    /// Where a remote actor should be drawn at `now` on the server clock
    pub fn remote_state(&self, server_actor_id: u32, now: u32) -> Option<ActorState> {
        self.remote
            .get(&server_actor_id)?
            .buffer
            .interpolated(now.saturating_sub(INTERPOLATION_DELAY_MS))
    }
}
