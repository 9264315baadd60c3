use shared::MAX_PLAYERS;
use std::time::Duration;

/// Runtime settings for [`crate::network::Server`].
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Physics ticks per second.
    pub tick_rate: u32,
    /// Snapshots per second.
    pub broadcast_rate: u32,
    pub max_players: usize,
    pub client_timeout: Duration,
    /// Encounter started when the first player joins.
    pub encounter: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_rate: 60,
            broadcast_rate: 20,
            max_players: MAX_PLAYERS,
            client_timeout: Duration::from_secs(5),
            encounter: None,
        }
    }
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        rate_to_duration(self.tick_rate)
    }

    pub fn broadcast_duration(&self) -> Duration {
        rate_to_duration(self.broadcast_rate)
    }
}

fn rate_to_duration(rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / rate.max(1) as f64)
}
