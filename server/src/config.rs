//! Command-line configuration for the match server

use crate::turn::TurnConfig;
use clap::Parser;
use shared::COURSE;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    pub tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "8")]
    pub max_clients: usize,

    /// Players required before the match starts
    #[arg(long, default_value = "1")]
    pub min_players: usize,

    /// Number of holes to play
    #[arg(long, default_value_t = COURSE.len() as u8)]
    pub holes: u8,

    /// Seconds a player may take before forfeiting the hole
    #[arg(long, default_value = "90")]
    pub turn_time: u64,

    /// Seconds before the turn time runs out that the warning is sent
    #[arg(long, default_value = "10")]
    pub warn_time: u64,

    /// Seconds a shot may stay in flight before it is forced to settle
    #[arg(long, default_value = "20")]
    pub settle_timeout: u64,

    /// Milliseconds between announcing the next player and handing over control
    #[arg(long, default_value = "1000")]
    pub advance_delay_ms: u64,

    /// Milliseconds to wait between holes
    #[arg(long, default_value = "3000")]
    pub hole_delay_ms: u64,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    pub client_timeout: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            turn_time: Duration::from_secs(self.turn_time),
            warn_time: Duration::from_secs(self.warn_time.min(self.turn_time)),
            settle_timeout: Duration::from_secs(self.settle_timeout),
            advance_delay: Duration::from_millis(self.advance_delay_ms),
            hole_transition_delay: Duration::from_millis(self.hole_delay_ms),
            hole_count: self.holes.clamp(1, COURSE.len() as u8),
            min_players: self.min_players.max(1),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["server"])
    }
}
