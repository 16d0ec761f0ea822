// Use-case level inputs/outputs for the game loop.

use crate::domain::{EntityId, Impact, PeerId, PlaneInput};
use glam::Vec2;

#[derive(Debug, Clone)]
pub enum GameEvent {
    Join { peer: PeerId },
    Leave { peer: PeerId },
    Input { peer: PeerId, input: PlaneInput },
    /// Accumulated one-way lag for a peer, measured by the sync handshake;
    /// applied to that peer's subsequently spawned projectiles.
    Lag { peer: PeerId, lag_ms: f64 },
}

#[derive(Debug, Clone)]
pub enum ServerState {
    Lobby,
    MatchStarting { in_seconds: u32 },
    MatchRunning,
    MatchEnded,
}

#[derive(Debug, Clone, Copy)]
pub struct PlaneSnapshot {
    pub id: EntityId,
    pub peer: PeerId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub rot: f32,
    pub hp: i32,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileClass {
    Bullet,
    Missile,
    Decoy,
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectileSnapshot {
    pub id: EntityId,
    pub owner: Option<EntityId>,
    pub class: ProjectileClass,
    pub pos: Vec2,
    pub vel: Vec2,
    pub rot: f32,
}

/// Snapshot of the world broadcast after each tick.
#[derive(Debug, Clone)]
pub struct WorldUpdate {
    pub tick: u64,
    /// Simulation timestamp the snapshot was taken at, ms.
    pub now_ms: f64,
    pub planes: Vec<PlaneSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub impacts: Vec<Impact>,
    /// Entity ids that left the world this tick.
    pub expired: Vec<EntityId>,
    /// Peer and world position of every plane spawned this tick.
    pub spawned: Vec<(PeerId, EntityId, Vec2)>,
}
