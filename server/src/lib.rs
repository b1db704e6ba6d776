//! # Match Server Library
//!
//! The authoritative half of a turn-based multiplayer match. The server owns
//! the canonical state of every actor, decides whose turn it is, resolves
//! each submitted shot and broadcasts the results so every client converges
//! on the same picture.
//!
//! ## Core Responsibilities
//!
//! ### Turn Authority
//! Exactly one player may act at a time. The turn protocol hands control
//! around the roster in order, skips players who have holed out or left,
//! and broadcasts every change of turn with a strictly increasing sequence
//! number. Inputs and shots from anyone else are discarded on arrival.
//!
//! ### Authoritative Simulation
//! Aiming inputs from the active player are applied with the same movement
//! function clients use for prediction. Submitted shots are resolved by an
//! `ActionSimulator`, and only one shot is ever in flight.
//!
//! ### Liveness
//! Two watchdogs keep a match moving: the turn timer forfeits a player who
//! never shoots (with a warning shortly before), and the settle timer ends
//! a turn whose shot refuses to come to rest. Silent clients are dropped
//! after a timeout and the rotation carries on without them.
//!
//! ## Module Organization
//!
//! - `config`: command-line configuration
//! - `client_manager`: connection tracking, sender validation and timeouts
//! - `game`: authoritative actors and their input queues
//! - `flight`: the shot simulator contract and the ball model
//! - `turn`: the turn protocol state machine
//! - `broadcast`: authoritative snapshot emission
//! - `session`: one match tying the above together, free of sockets
//! - `network`: UDP transport and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::parse_from(["server", "--port", "9000", "--min-players", "2"]);
//!     let mut server = Server::new(&config).await?;
//!
//!     // Runs until the round is over
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The server loop is fed by internal async tasks:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Processes outgoing packet queue and broadcasts
//! - **Timeout Checker**: Monitors client health and removes inactive connections

pub mod broadcast;
pub mod client_manager;
pub mod config;
pub mod flight;
pub mod game;
pub mod network;
pub mod session;
pub mod turn;
