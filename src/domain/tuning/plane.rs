/// Gameplay tuning for player-controlled planes.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer
/// sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct PlaneTuning {
    /// Maximum forward speed in world units per second.
    pub max_speed: f32,

    /// Rotation speed in radians per second.
    pub turn_rate: f32,

    /// How fast throttle changes per second.
    pub throttle_rate: f32,

    /// Hit points a plane spawns with.
    pub max_hp: i32,

    /// Seconds between destruction and respawn.
    pub respawn_seconds: f32,

    /// Seconds between gun shots.
    pub gun_cooldown: f32,

    /// Seconds between missile launches.
    pub missile_cooldown: f32,

    /// Seconds for a crashed plane's rotation to ease flat on the ground.
    pub crash_flatten_seconds: f32,

    /// Minimum spawn distance from any live plane.
    pub safe_spawn_distance: f32,

    /// Local-space distance from the cockpit point within which an impact
    /// counts as a headshot.
    pub cockpit_radius: f32,
}

impl Default for PlaneTuning {
    fn default() -> Self {
        Self {
            max_speed: 300.0,
            turn_rate: 2.4,
            throttle_rate: 1.5,
            max_hp: 100,
            respawn_seconds: 4.0,
            gun_cooldown: 0.12,
            missile_cooldown: 2.5,
            crash_flatten_seconds: 1.2,
            safe_spawn_distance: 600.0,
            cockpit_radius: 6.0,
        }
    }
}
