//! # Match Client Library
//!
//! Headless client for the turn-based match server. It connects over UDP,
//! announces itself ready, and plays its local players' turns with an
//! automatic player while keeping a predicted view of the match.
//!
//! ## Client-Side Prediction
//! Aim inputs for the local player holding the turn are applied to the local
//! actor as soon as they are sampled, using the same movement function the
//! server runs. Each input is also kept in a fixed-size history.
//!
//! ## Reconciliation
//! Every authoritative snapshot of a local actor carries the timestamp of the
//! newest input the server had applied. The client snaps to the snapshot,
//! rewinds its history to that input and replays everything newer. If the
//! history no longer reaches back that far, replay is suspended until the
//! player lets go of the controls.
//!
//! ## Turn Mirror
//! `SetPlayer` broadcasts are applied strictly by sequence number, so late and
//! duplicate turn updates are harmless.
//!
//! ## Modules
//! - `bot`: automatic player that aims and sizes shots
//! - `config`: command-line options
//! - `game`: predicted local actors and interpolated remote ones
//! - `input`: control event sampling
//! - `network`: socket loop tying the pieces together
//! - `session`: packet handling independent of the socket
//! - `turn`: read-only turn state mirror

pub mod bot;
pub mod config;
pub mod game;
pub mod input;
pub mod network;
pub mod session;
pub mod turn;
