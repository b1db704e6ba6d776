//! Turn ownership as broadcast by the server

use serde::{Deserialize, Serialize};

/// The participant currently holding the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivePlayer {
    pub client_id: u32,
    pub player_id: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    AwaitingReady,
    PlayerActing,
    ActionResolving,
    TurnComplete,
    RoundComplete,
}

/// Authoritative turn state
///
/// `sequence` grows by one on every transition the server broadcasts and is
/// the only ordering clients trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub active: Option<ActivePlayer>,
    pub phase: TurnPhase,
    pub sequence: u32,
}

impl TurnState {
    pub fn new() -> Self {
        Self {
            active: None,
            phase: TurnPhase::AwaitingReady,
            sequence: 0,
        }
    }

    pub fn is_active(&self, client_id: u32, player_id: u8) -> bool {
        self.active
            == Some(ActivePlayer {
                client_id,
                player_id,
            })
    }

    /// True when this participant may submit an action-producing packet
    pub fn may_act(&self, client_id: u32, player_id: u8) -> bool {
        self.phase == TurnPhase::PlayerActing && self.is_active(client_id, player_id)
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters of a single shot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotRequest {
    pub impulse: [f32; 3],
    pub spin: [f32; 2],
    pub club: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_turn_state() {
        let turn = TurnState::new();
        assert_eq!(turn.phase, TurnPhase::AwaitingReady);
        assert_eq!(turn.sequence, 0);
        assert!(turn.active.is_none());
        assert!(!turn.may_act(1, 0));
    }

    #[test]
    fn test_may_act_requires_phase_and_identity() {
        let mut turn = TurnState {
            active: Some(ActivePlayer {
                client_id: 3,
                player_id: 1,
            }),
            phase: TurnPhase::AwaitingReady,
            sequence: 4,
        };

        assert!(turn.is_active(3, 1));
        assert!(!turn.may_act(3, 1));

        turn.phase = TurnPhase::PlayerActing;
        assert!(turn.may_act(3, 1));
        assert!(!turn.may_act(3, 0));
        assert!(!turn.may_act(2, 1));

        turn.phase = TurnPhase::ActionResolving;
        assert!(!turn.may_act(3, 1));
    }
}
