/// Gameplay tuning for bullets, missiles and decoys.

#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    /// Muzzle speed added to the firing plane's velocity, units per second.
    pub bullet_speed: f32,

    /// Bullet lifetime in seconds before despawn.
    pub bullet_ttl: f32,

    /// Damage applied by a direct bullet hit.
    pub bullet_damage: i32,

    /// Missile cruise speed in units per second.
    pub missile_speed: f32,

    /// Missile fuel in seconds; an out-of-fuel missile expires.
    pub missile_fuel: f32,

    /// Damage applied by a direct missile hit.
    pub missile_damage: i32,

    /// Decoy lifetime in seconds.
    pub decoy_ttl: f32,

    /// Headshot damage multiplier.
    pub headshot_multiplier: f32,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            bullet_speed: 900.0,
            bullet_ttl: 1.5,
            bullet_damage: 8,
            missile_speed: 450.0,
            missile_fuel: 6.0,
            missile_damage: 45,
            decoy_ttl: 3.0,
            headshot_multiplier: 2.0,
        }
    }
}
