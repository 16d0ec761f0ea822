// Use-case layer: the authoritative frame loop and its event types.

pub mod game;
pub mod types;

pub use game::world_task;
pub use types::{
    GameEvent, PlaneSnapshot, ProjectileClass, ProjectileSnapshot, ServerState, WorldUpdate,
};
