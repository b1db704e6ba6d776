//! Read-only client mirror of the server's turn state

use shared::{SyncError, TurnState};

/// Applies `SetPlayer` broadcasts in sequence order
///
/// Anything at or below the last applied sequence is a duplicate or arrived
/// late and is rejected, so applying the same broadcasts in any order or any
/// number of times leaves the mirror on the newest one.
#[derive(Debug, Clone, Default)]
pub struct TurnMirror {
    state: Option<TurnState>,
}

impl TurnMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, turn: TurnState) -> Result<(), SyncError> {
        if let Some(current) = &self.state {
            if turn.sequence <= current.sequence {
                return Err(SyncError::StaleTurn {
                    incoming: turn.sequence,
                    last: current.sequence,
                });
            }
        }
        self.state = Some(turn);
        Ok(())
    }

    pub fn state(&self) -> Option<&TurnState> {
        self.state.as_ref()
    }

    pub fn sequence(&self) -> Option<u32> {
        self.state.map(|turn| turn.sequence)
    }

    pub fn may_act(&self, client_id: u32, player_id: u8) -> bool {
        self.state
            .map_or(false, |turn| turn.may_act(client_id, player_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ActivePlayer, TurnPhase};

    fn turn(sequence: u32, client_id: u32) -> TurnState {
        TurnState {
            active: Some(ActivePlayer {
                client_id,
                player_id: 0,
            }),
            phase: TurnPhase::PlayerActing,
            sequence,
        }
    }

    #[test]
    fn test_applies_newer_only() {
        let mut mirror = TurnMirror::new();
        assert!(mirror.state().is_none());
        assert!(!mirror.may_act(1, 0));

        mirror.apply(turn(4, 1)).unwrap();
        assert!(mirror.may_act(1, 0));

        assert_eq!(
            mirror.apply(turn(4, 2)),
            Err(SyncError::StaleTurn {
                incoming: 4,
                last: 4
            })
        );
        assert!(mirror.apply(turn(2, 2)).is_err());
        assert_eq!(mirror.sequence(), Some(4));
        assert!(mirror.may_act(1, 0));

        mirror.apply(turn(5, 2)).unwrap();
        assert!(mirror.may_act(2, 0));
        assert!(!mirror.may_act(1, 0));
    }

    #[test]
    fn test_sequence_zero_accepted_first() {
        let mut mirror = TurnMirror::new();
        mirror.apply(TurnState::new()).unwrap();
        assert_eq!(mirror.sequence(), Some(0));
        assert!(mirror.apply(TurnState::new()).is_err());
    }
}
