/// Gameplay tuning for explosions and their blast effects.

#[derive(Debug, Clone, Copy)]
pub struct ExplosionTuning {
    /// Blast radius in world units. Pushable entities inside
    /// `radius * PUSH_RADIUS_SCALE` receive impulse.
    pub radius: f32,

    /// Seconds an explosion stays active.
    pub duration: f32,

    /// Peak radial impulse in units per second, applied per second.
    pub force: f32,

    /// Peak splash damage per frame for non-owner planes in the blast;
    /// scaled down by distance falloff before rounding.
    pub splash_per_frame: f32,
}

/// Impulse reaches slightly past the damage radius.
pub const PUSH_RADIUS_SCALE: f32 = 1.2;

impl Default for ExplosionTuning {
    fn default() -> Self {
        Self {
            radius: 160.0,
            duration: 0.6,
            force: 1400.0,
            splash_per_frame: 1.5,
        }
    }
}
