// Domain layer: core simulation types and rules.

pub mod collision;
pub mod context;
pub mod entity;
pub mod geometry;
pub mod history;
pub mod interp;
pub mod registry;
pub mod spatial;
pub mod tuning;

pub use collision::{GroundImpact, GroundImpactLog, Impact, ImpactKind};
pub use context::{NetRole, SimContext, WorldBounds};
pub use entity::{Body, Caps, Entity, EntityId, EntityKey, EntityKind, PeerId, PlaneInput};
pub use history::HistoryBuffer;
pub use interp::InterpBuffer;
pub use registry::{Registry, Spawner};
pub use spatial::SpatialGrid;
