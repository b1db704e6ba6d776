pub mod actor;
pub mod error;
pub mod input;
pub mod turn;

pub use actor::{ActorPhase, ActorState};
pub use error::SyncError;
pub use input::{button, Input, InputHistory, HISTORY_SIZE};
pub use turn::{ActivePlayer, ShotRequest, TurnPhase, TurnState};

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_LOCAL_PLAYERS: u8 = 4;
pub const MAX_STROKES: u8 = 12;
/// A ball settling this close to the pin is holed
pub const HOLE_RADIUS: f32 = 0.6;
/// Downward acceleration on a ball in flight, m/s^2
pub const GRAVITY: f32 = 9.8;
/// Deceleration of a rolling ball, m/s^2
pub const ROLL_FRICTION: f32 = 2.5;

/// Tee and pin of one hole, in metres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hole {
    pub tee: [f32; 3],
    pub pin: [f32; 3],
}

pub const COURSE: [Hole; 3] = [
    Hole {
        tee: [0.0, 0.0, 0.0],
        pin: [0.0, 0.0, -40.0],
    },
    Hole {
        tee: [0.0, 0.0, 0.0],
        pin: [12.0, 0.0, -65.0],
    },
    Hole {
        tee: [0.0, 0.0, 0.0],
        pin: [-20.0, 0.0, -90.0],
    },
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // client -> server
    Connect {
        client_version: u32,
        player_count: u8,
    },
    ClientReady {
        client_id: u32,
    },
    PlayerInput {
        client_id: u32,
        player_id: u8,
        input: Input,
    },
    InputUpdate {
        client_id: u32,
        player_id: u8,
        shot: ShotRequest,
    },
    SkipTurn {
        client_id: u32,
    },
    Heartbeat {
        timestamp: u32,
    },
    Disconnect,

    // server -> client
    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    ActorSpawn {
        owner_client_id: u32,
        owner_player_id: u8,
        server_actor_id: u32,
        position: [f32; 3],
        rotation: f32,
        timestamp: u32,
    },
    ActorUpdate {
        server_actor_id: u32,
        client_id: u32,
        player_id: u8,
        position: [f32; 3],
        rotation: f32,
        timestamp: u32,
        input_timestamp: Option<u32>,
        phase: ActorPhase,
    },
    SetPlayer {
        turn: TurnState,
    },
    EntityRemoved {
        server_actor_id: u32,
    },
    ClientDisconnected {
        client_id: u32,
    },
    WarnTime {
        seconds: u8,
    },
    TurnTimedOut {
        client_id: u32,
        player_id: u8,
    },
    MaxStrokes {
        client_id: u32,
        player_id: u8,
    },
    ScoreUpdate {
        client_id: u32,
        player_id: u8,
        hole: u8,
        strokes: u8,
        total: u32,
    },
    SetHole {
        hole: u8,
    },
    GameEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_holes_are_reachable() {
        for hole in COURSE.iter() {
            let tee = ActorState::new(hole.tee, 0.0, 0);
            assert!(tee.ground_distance(hole.pin) > HOLE_RADIUS);
        }
    }

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            player_count: 2,
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                player_count,
            } => {
                assert_eq!(client_version, PROTOCOL_VERSION);
                assert_eq!(player_count, 2);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_set_player() {
        let turn = TurnState {
            active: Some(ActivePlayer {
                client_id: 7,
                player_id: 1,
            }),
            phase: TurnPhase::PlayerActing,
            sequence: 42,
        };

        let serialized = bincode::serialize(&Packet::SetPlayer { turn }).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        assert_eq!(deserialized, Packet::SetPlayer { turn });
    }

    #[test]
    fn test_packet_serialization_actor_update() {
        let packet = Packet::ActorUpdate {
            server_actor_id: 3,
            client_id: 2,
            player_id: 0,
            position: [1.5, 0.25, -8.0],
            rotation: -0.4,
            timestamp: 123456,
            input_timestamp: Some(987),
            phase: ActorPhase::Flight,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::ActorUpdate {
                server_actor_id,
                position,
                input_timestamp,
                phase,
                ..
            } => {
                assert_eq!(server_actor_id, 3);
                assert_eq!(position, [1.5, 0.25, -8.0]);
                assert_eq!(input_timestamp, Some(987));
                assert_eq!(phase, ActorPhase::Flight);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
