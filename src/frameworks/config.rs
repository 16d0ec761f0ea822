use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
pub const DEFAULT_START_DELAY: Duration = Duration::from_secs(3);
// Default time limit (0 disables match end).
pub const DEFAULT_MATCH_TIME_LIMIT: Duration = Duration::from_secs(600);

pub const PEER_TIMEOUT: Duration = Duration::from_secs(5);

pub fn game_port() -> u16 {
    env::var("DOGFIGHT_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn discovery_port() -> u16 {
    env::var("DOGFIGHT_DISCOVERY_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3999)
}

pub fn server_name() -> String {
    env::var("DOGFIGHT_SERVER_NAME").unwrap_or_else(|_| "dogfight".to_string())
}
