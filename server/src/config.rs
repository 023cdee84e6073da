//! Tunables for the simulation and the server loop.

use shared::TICKS_PER_SECOND;
use std::time::Duration;

/// Parameters of the simulation itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameModelConfig {
    /// Spawn points closer than this to a visible living player are rejected.
    pub min_spawn_distance: f32,
    pub bullet_speed: f32,
    pub magazine_size: u32,
}

impl Default for GameModelConfig {
    fn default() -> Self {
        Self {
            min_spawn_distance: 5.0,
            bullet_speed: 25.0,
            magazine_size: 10,
        }
    }
}

/// Parameters of the network-facing loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: String,
    pub tick_duration: Duration,
    /// Number of ticks a single move message keeps steering its player.
    pub move_action_ttl: u32,
    pub max_clients: usize,
    pub bot_count: u32,
    /// Seeds the bot decision RNG. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl ServerConfig {
    pub fn tick_duration_for(tick_rate: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            tick_duration: Self::tick_duration_for(TICKS_PER_SECOND),
            move_action_ttl: 3,
            max_clients: 32,
            bot_count: 5,
            seed: None,
        }
    }
}
