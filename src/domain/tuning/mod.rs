// Gameplay tuning, separate from runtime/server configuration.

pub mod explosion;
pub mod plane;
pub mod projectile;

pub use explosion::{ExplosionTuning, PUSH_RADIUS_SCALE};
pub use plane::PlaneTuning;
pub use projectile::ProjectileTuning;
