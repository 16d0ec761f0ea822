// Entity model: one record with a capability bitset and a tagged-union kind
// payload, dispatched with `match` instead of a virtual hierarchy.

use crate::domain::history::HistoryBuffer;
use glam::Vec2;
use slotmap::new_key_type;

new_key_type! {
    /// Generation-checked handle into the entity arena. A key held across a
    /// prune of its entity stops resolving instead of aliasing a reused slot.
    pub struct EntityKey;
}

/// Globally unique id for entities that participate in lookup and the wire
/// protocol. Cosmetic entities (particles) carry no id.
pub type EntityId = u64;

/// Server-assigned id for a connected player.
pub type PeerId = u32;

/// Capability bitset tested with bitwise ops; replaces marker-interface
/// type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caps(u8);

impl Caps {
    pub const NONE: Caps = Caps(0);
    /// Participates in the spatial index and collision tests.
    pub const COLLIDABLE: Caps = Caps(1);
    /// Receives radial impulse from explosions.
    pub const PUSHABLE: Caps = Caps(1 << 1);
    /// Takes splash damage while inside an active blast.
    pub const BLAST_DAMAGE: Caps = Caps(1 << 2);

    pub fn contains(self, other: Caps) -> bool {
        self.0 & other.0 == other.0
    }

    /// Entities tracked by the spatial index: collision participants plus
    /// anything explosions can push.
    pub fn spatially_indexed(self) -> bool {
        self.0 & (Caps::COLLIDABLE.0 | Caps::PUSHABLE.0) != 0
    }
}

impl std::ops::BitOr for Caps {
    type Output = Caps;
    fn bitor(self, rhs: Caps) -> Caps {
        Caps(self.0 | rhs.0)
    }
}

/// Kinematic state shared by every entity kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Heading in radians; 0 points along +X.
    pub rot: f32,
}

/// Control input applied to a plane each frame until replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneInput {
    /// Throttle change demand, -1..=1.
    pub thrust: f32,
    /// Turn demand, -1..=1.
    pub turn: f32,
    pub fire_gun: bool,
    pub fire_missile: bool,
    pub drop_decoy: bool,
}

#[derive(Debug)]
pub struct Plane {
    pub hp: i32,
    pub alive: bool,
    pub respawn_timer: f32,
    /// Grounded after a crash; eases flat instead of expiring.
    pub crashed: bool,
    /// 0..=1 progress of the crash rotation ease.
    pub crash_ease: f32,
    pub throttle: f32,
    pub input: PlaneInput,
    pub gun_cooldown: f32,
    pub missile_cooldown: f32,
    /// Server-side rewind ring for lag compensation.
    pub history: HistoryBuffer,
}

#[derive(Debug, Clone)]
pub struct Missile {
    /// Current pursuit target; may point at a decoy.
    pub target: Option<EntityId>,
    /// Remaining burn in seconds.
    pub fuel: f32,
    /// Accumulated network lag in ms, fed into the rewind window.
    pub lag_ms: f64,
    /// Position the missile visibly launched from; consumed by the
    /// fresh-spawn ray pre-check.
    pub launch_pos: Vec2,
    pub fresh: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Bullet {
    pub ttl: f32,
    pub lag_ms: f64,
    pub launch_pos: Vec2,
    pub fresh: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Decoy {
    pub ttl: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub ttl: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Explosion {
    pub radius: f32,
    /// Seconds of blast activity remaining.
    pub ttl: f32,
}

#[derive(Debug)]
pub enum EntityKind {
    Plane(Plane),
    Missile(Missile),
    Bullet(Bullet),
    Decoy(Decoy),
    Particle(Particle),
    Explosion(Explosion),
}

#[derive(Debug)]
pub struct Entity {
    /// `None` for cosmetic entities, which skip the id lookup map.
    pub id: Option<EntityId>,
    /// Connected player this entity belongs to, when any.
    pub peer: Option<PeerId>,
    /// Weak back-reference to the spawning entity (a bullet's plane);
    /// resolved through the registry, may dangle after the owner dies.
    pub owner: Option<EntityId>,
    pub body: Body,
    pub caps: Caps,
    pub expired: bool,
    pub kind: EntityKind,
}

impl Entity {
    pub fn plane(id: EntityId, peer: PeerId, pos: Vec2, max_hp: i32) -> Self {
        Self {
            id: Some(id),
            peer: Some(peer),
            owner: None,
            body: Body {
                pos,
                ..Body::default()
            },
            caps: Caps::COLLIDABLE | Caps::PUSHABLE | Caps::BLAST_DAMAGE,
            expired: false,
            kind: EntityKind::Plane(Plane {
                hp: max_hp,
                alive: true,
                respawn_timer: 0.0,
                crashed: false,
                crash_ease: 0.0,
                throttle: 0.0,
                input: PlaneInput::default(),
                gun_cooldown: 0.0,
                missile_cooldown: 0.0,
                history: HistoryBuffer::default(),
            }),
        }
    }

    pub fn bullet(id: EntityId, owner: EntityId, peer: PeerId, body: Body, ttl: f32) -> Self {
        Self {
            id: Some(id),
            peer: Some(peer),
            owner: Some(owner),
            body,
            caps: Caps::COLLIDABLE,
            expired: false,
            kind: EntityKind::Bullet(Bullet {
                ttl,
                lag_ms: 0.0,
                launch_pos: body.pos,
                fresh: true,
            }),
        }
    }

    pub fn missile(id: EntityId, owner: EntityId, peer: PeerId, body: Body, fuel: f32) -> Self {
        Self {
            id: Some(id),
            peer: Some(peer),
            owner: Some(owner),
            body,
            caps: Caps::COLLIDABLE | Caps::PUSHABLE,
            expired: false,
            kind: EntityKind::Missile(Missile {
                target: None,
                fuel,
                lag_ms: 0.0,
                launch_pos: body.pos,
                fresh: true,
            }),
        }
    }

    pub fn decoy(id: EntityId, owner: EntityId, peer: PeerId, body: Body, ttl: f32) -> Self {
        Self {
            id: Some(id),
            peer: Some(peer),
            owner: Some(owner),
            body,
            caps: Caps::COLLIDABLE | Caps::PUSHABLE,
            expired: false,
            kind: EntityKind::Decoy(Decoy { ttl }),
        }
    }

    /// Cosmetic; no id, never indexed for lookup or collision.
    pub fn particle(body: Body, ttl: f32) -> Self {
        Self {
            id: None,
            peer: None,
            owner: None,
            body,
            caps: Caps::PUSHABLE,
            expired: false,
            kind: EntityKind::Particle(Particle { ttl }),
        }
    }

    pub fn explosion(id: EntityId, owner: Option<EntityId>, pos: Vec2, radius: f32, duration: f32) -> Self {
        Self {
            id: Some(id),
            peer: None,
            owner,
            body: Body {
                pos,
                ..Body::default()
            },
            caps: Caps::NONE,
            expired: false,
            kind: EntityKind::Explosion(Explosion {
                radius,
                ttl: duration,
            }),
        }
    }

    pub fn is_plane(&self) -> bool {
        matches!(self.kind, EntityKind::Plane(_))
    }

    /// Projectiles are the entities swept against plane hulls.
    pub fn is_projectile(&self) -> bool {
        matches!(self.kind, EntityKind::Bullet(_) | EntityKind::Missile(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_bit_tests() {
        let caps = Caps::COLLIDABLE | Caps::PUSHABLE;
        assert!(caps.contains(Caps::COLLIDABLE));
        assert!(caps.contains(Caps::PUSHABLE));
        assert!(!caps.contains(Caps::BLAST_DAMAGE));
        assert!(caps.contains(Caps::NONE));
    }

    #[test]
    fn particle_has_no_id() {
        let p = Entity::particle(Body::default(), 0.5);
        assert!(p.id.is_none());
        assert!(!p.caps.contains(Caps::COLLIDABLE));
    }
}
