// Wire protocol: typed packet records, and the logical channel plus delivery
// mode each packet type maps onto. Encoding lives in `wire`.

use crate::domain::{EntityId, ImpactKind, PeerId};
use glam::Vec2;

/// Logical sub-stream of a connection. Unrelated traffic rides different
/// channels so it cannot head-of-line-block across types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Sync,
    Position,
    Status,
    Spawn,
    Expire,
    Impact,
    Misc,
}

/// How a packet is allowed to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued and flushed in order; survives backpressure.
    ReliableOrdered,
    /// Latency-sensitive; dropped rather than queued when the peer is slow.
    Instant,
}

/// Every message that crosses the wire, versioned by enum tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Clock handshake ping; carries the sender's timestamp.
    Sync { peer: PeerId, t_ms: f64 },
    /// Server -> client after join: assigned peer id, plane id and spawn.
    Identity {
        peer: PeerId,
        plane: EntityId,
        pos: Vec2,
    },
    PositionUpdate {
        id: EntityId,
        pos: Vec2,
        vel: Vec2,
        /// Heading in degrees, 0..360.
        rot_deg: f32,
        /// Control surface deflection, -1..=1.
        deflection: f32,
        /// Sender frame delta, ms.
        dt_ms: f32,
        /// Sender timestamp, ms.
        t_ms: f64,
    },
    StatusUpdate {
        id: EntityId,
        hp: i32,
        alive: bool,
    },
    SpawnBullet {
        id: EntityId,
        owner: EntityId,
        pos: Vec2,
        vel: Vec2,
    },
    SpawnMissile {
        id: EntityId,
        owner: EntityId,
        pos: Vec2,
        vel: Vec2,
        rot_deg: f32,
    },
    SpawnDecoy {
        id: EntityId,
        owner: EntityId,
        pos: Vec2,
        vel: Vec2,
    },
    Expire {
        id: EntityId,
    },
    Impact {
        target: EntityId,
        kind: ImpactKind,
        /// Impact point relative to the target, polygon-local units.
        offset: Vec2,
        angle_deg: f32,
        damage: i32,
        headshot: bool,
    },
    /// Catch-all channel traffic.
    Chat { peer: PeerId, text: String },
    /// Client -> server control input for the peer's plane.
    Input {
        thrust: f32,
        turn: f32,
        fire_gun: bool,
        fire_missile: bool,
        drop_decoy: bool,
    },
}

impl Packet {
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Sync { .. } => 0,
            Packet::Identity { .. } => 1,
            Packet::PositionUpdate { .. } => 2,
            Packet::StatusUpdate { .. } => 3,
            Packet::SpawnBullet { .. } => 4,
            Packet::SpawnMissile { .. } => 5,
            Packet::SpawnDecoy { .. } => 6,
            Packet::Expire { .. } => 7,
            Packet::Impact { .. } => 8,
            Packet::Chat { .. } => 9,
            Packet::Input { .. } => 10,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Packet::Sync { .. } => Channel::Sync,
            Packet::Identity { .. } => Channel::Sync,
            Packet::PositionUpdate { .. } => Channel::Position,
            Packet::StatusUpdate { .. } => Channel::Status,
            Packet::SpawnBullet { .. }
            | Packet::SpawnMissile { .. }
            | Packet::SpawnDecoy { .. } => Channel::Spawn,
            Packet::Expire { .. } => Channel::Expire,
            Packet::Impact { .. } => Channel::Impact,
            Packet::Chat { .. } => Channel::Misc,
            Packet::Input { .. } => Channel::Position,
        }
    }

    pub fn delivery(&self) -> Delivery {
        match self {
            // Handshake pings lose their value the moment a newer one exists.
            Packet::Sync { .. } => Delivery::Instant,
            _ => Delivery::ReliableOrdered,
        }
    }
}
