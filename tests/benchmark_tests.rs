//! Performance benchmarks for the synchronization hot paths

use client::game::LocalActor;
use server::flight::{ActionSimulator, BallFlight, FlightStatus};
use server::game::GameState;
use shared::{button, ActivePlayer, ActorState, Input, InputHistory, Packet, ShotRequest};
use std::time::Instant;

fn input(timestamp: u32) -> Input {
    Input {
        timestamp,
        buttons: if timestamp % 3 == 0 {
            button::UP | button::LEFT
        } else {
            button::RIGHT
        },
        axis_x: (timestamp % 50) as i8,
        axis_y: 0,
    }
}

/// Benchmarks the deterministic movement function
#[test]
fn benchmark_apply_input() {
    let mut state = ActorState::new([0.0, 0.0, 0.0], 0.0, 0);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        state.apply_input(&input(i));
    }

    let duration = start.elapsed();
    println!(
        "Apply input: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(state.position[0].is_finite());
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks recording into a full input history
#[test]
fn benchmark_history_record() {
    let mut history = InputHistory::new();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        history.record(input(i));
        if i % 4 == 0 {
            history.consume_all();
        }
    }

    let duration = start.elapsed();
    println!(
        "History record: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(history.len(), history.capacity());
    assert_eq!(history.newest().unwrap().timestamp, iterations - 1);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks a worst-case reconciliation replaying a full history
#[test]
fn benchmark_reconciliation_performance() {
    let iterations = 2_000;
    let start = Instant::now();
    let mut total_replayed = 0;

    for round in 0..iterations {
        let base = round * 1000;
        let mut actor = LocalActor::new(1, 0, ActorState::new([0.0, 0.0, 0.0], 0.0, 0));
        for i in 0..64 {
            actor.record(input(base + i));
        }
        actor.predict_step();

        let authoritative = ActorState::new([1.0, 0.0, -1.0], 0.1, base);
        total_replayed += actor.reconcile(authoritative, Some(base)).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Reconciliation: {} full replays in {:?} ({:.2} μs/replay)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(total_replayed, iterations as usize * 63);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks resolving a lofted shot to rest
#[test]
fn benchmark_ball_flight() {
    let shot = ShotRequest {
        impulse: [3.0, 14.0, -14.0],
        spin: [0.4, 0.0],
        club: 1,
    };

    let iterations = 500;
    let start = Instant::now();
    let mut steps = 0u64;

    for _ in 0..iterations {
        let mut flight = BallFlight::launch([0.0, 0.0, 0.0], &shot);
        while flight.step(1.0 / 60.0) == FlightStatus::Moving {
            steps += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Ball flight: {} shots, {} steps in {:?}",
        iterations, steps, duration
    );

    assert!(steps > 0);
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks server input processing across a full lobby
#[test]
fn benchmark_server_input_processing() {
    let mut game: GameState = GameState::new();
    let owners: Vec<ActivePlayer> = (1..=8)
        .map(|client_id| ActivePlayer {
            client_id,
            player_id: 0,
        })
        .collect();
    for owner in &owners {
        game.spawn_actor(*owner, 0);
    }

    let ticks = 1_000;
    let start = Instant::now();

    for tick in 0..ticks {
        for owner in &owners {
            game.add_input(*owner, input(tick + 1));
        }
        game.process_inputs(tick * 16);
    }

    let duration = start.elapsed();
    println!(
        "Server input processing: {} ticks x {} actors in {:?}",
        ticks,
        owners.len(),
        duration
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks packet serialization for the per-tick snapshot packets
#[test]
fn benchmark_packet_serialization() {
    let packets: Vec<Packet> = (0..8)
        .map(|i| Packet::ActorUpdate {
            server_actor_id: i,
            client_id: i,
            player_id: 0,
            position: [i as f32, 0.0, -(i as f32)],
            rotation: 0.1 * i as f32,
            timestamp: 1000 + i,
            input_timestamp: Some(990 + i),
            phase: shared::ActorPhase::Idle,
        })
        .collect();

    let iterations = 10_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        for packet in &packets {
            let data = bincode::serialize(packet).unwrap();
            bytes += data.len();
            let _: Packet = bincode::deserialize(&data).unwrap();
        }
    }

    let duration = start.elapsed();
    println!(
        "Serialization: {} packets ({} bytes) in {:?}",
        iterations * packets.len(),
        bytes,
        duration
    );

    assert!(duration.as_millis() < 5000);
}
