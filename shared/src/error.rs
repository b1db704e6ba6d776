//! Synchronization-layer error taxonomy
//!
//! Every variant except [`SyncError::ConnectionLost`] is recovered locally by
//! the caller (discard, guard or forced advance) and only ever logged.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Action or input from a participant that does not hold the turn
    #[error("stale input from client {client_id} player {player_id}")]
    StaleInput { client_id: u32, player_id: u8 },

    /// Turn broadcast whose sequence number was already applied
    #[error("stale turn update: sequence {incoming} <= {last}")]
    StaleTurn { incoming: u32, last: u32 },

    #[error("reconciliation target {target}ms precedes oldest buffered input {oldest}ms")]
    DesyncTooOld { target: u32, oldest: u32 },

    #[error("authoritative snapshot at {incoming}ms is older than last applied {last}ms")]
    OutOfOrderAuthority { incoming: u32, last: u32 },

    #[error("turn watchdog expired for client {client_id} player {player_id}")]
    TurnWatchdogTimeout { client_id: u32, player_id: u8 },

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

impl SyncError {
    /// Only transport loss ends a match; everything else is handled in place.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::ConnectionLost(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_loss_is_fatal() {
        assert!(SyncError::ConnectionLost("timeout".to_string()).is_fatal());
        assert!(!SyncError::StaleInput {
            client_id: 2,
            player_id: 0
        }
        .is_fatal());
        assert!(!SyncError::DesyncTooOld {
            target: 10,
            oldest: 20
        }
        .is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = SyncError::OutOfOrderAuthority {
            incoming: 90,
            last: 120,
        };
        assert_eq!(
            err.to_string(),
            "authoritative snapshot at 90ms is older than last applied 120ms"
        );
    }
}
