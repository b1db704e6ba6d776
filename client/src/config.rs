//! Command-line configuration for the headless client

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientConfig {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    pub server: String,

    /// Local players sharing this connection
    #[arg(short = 'n', long, default_value = "1")]
    pub players: u8,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    pub fake_ping: u64,

    /// Input samples per second while a local player aims
    #[arg(long, default_value = "60")]
    pub input_rate: u32,

    /// Milliseconds between ready announcements until the server answers
    #[arg(long, default_value = "500")]
    pub ready_retry_ms: u64,

    /// Seconds without hearing from the server before giving up
    #[arg(long, default_value = "10")]
    pub connection_timeout: u64,

    /// Seed for the automatic player's shot variation
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ClientConfig {
    pub fn input_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.input_rate.max(1) as f64)
    }

    pub fn ready_retry(&self) -> Duration {
        Duration::from_millis(self.ready_retry_ms.max(1))
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::parse_from(["client"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server, "127.0.0.1:8080");
        assert_eq!(config.players, 1);
        assert_eq!(config.ready_retry(), Duration::from_millis(500));
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_flags() {
        let config =
            ClientConfig::parse_from(["client", "-n", "3", "-l", "120", "--seed", "7"]);
        assert_eq!(config.players, 3);
        assert_eq!(config.fake_ping, 120);
        assert_eq!(config.seed, Some(7));
    }
}
