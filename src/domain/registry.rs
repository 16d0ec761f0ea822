// Entity registry: owns the live arena, id lookup, per-kind key lists, the
// spatial index, and the pending-insert queue drained once per frame.

use crate::domain::context::{NetRole, SimContext};
use crate::domain::entity::{Body, Entity, EntityId, EntityKey, EntityKind, PeerId};
use crate::domain::history::lerp_angle;
use crate::domain::spatial::SpatialGrid;
use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::Vec2;
use rand::Rng;
use rayon::prelude::*;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe entity factory handle. Cloned into update threads and network
/// tasks; everything it enqueues goes live at the next `sync()`.
#[derive(Debug, Clone)]
pub struct Spawner {
    tx: Sender<Entity>,
    next_id: Arc<AtomicU64>,
}

impl Spawner {
    pub fn alloc_id(&self) -> EntityId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn enqueue(&self, entity: Entity) {
        // Receiver lives as long as the registry; a send can only fail during
        // shutdown, where dropping the entity is correct.
        let _ = self.tx.send(entity);
    }

    pub fn enqueue_plane(&self, peer: PeerId, pos: Vec2, max_hp: i32) -> EntityId {
        let id = self.alloc_id();
        self.enqueue(Entity::plane(id, peer, pos, max_hp));
        id
    }

    pub fn enqueue_bullet(&self, owner: EntityId, peer: PeerId, body: Body, ttl: f32) -> EntityId {
        let id = self.alloc_id();
        self.enqueue(Entity::bullet(id, owner, peer, body, ttl));
        id
    }

    pub fn enqueue_missile(&self, owner: EntityId, peer: PeerId, body: Body, fuel: f32) -> EntityId {
        let id = self.alloc_id();
        self.enqueue(Entity::missile(id, owner, peer, body, fuel));
        id
    }

    pub fn enqueue_decoy(&self, owner: EntityId, peer: PeerId, body: Body, ttl: f32) -> EntityId {
        let id = self.alloc_id();
        self.enqueue(Entity::decoy(id, owner, peer, body, ttl));
        id
    }

    pub fn enqueue_particle(&self, body: Body, ttl: f32) {
        self.enqueue(Entity::particle(body, ttl));
    }

    pub fn enqueue_explosion(
        &self,
        owner: Option<EntityId>,
        pos: Vec2,
        radius: f32,
        duration: f32,
    ) -> EntityId {
        let id = self.alloc_id();
        self.enqueue(Entity::explosion(id, owner, pos, radius, duration));
        id
    }
}

/// Per-kind key lists so iteration never filters the whole arena.
#[derive(Debug, Default)]
pub struct KindLists {
    pub planes: Vec<EntityKey>,
    pub missiles: Vec<EntityKey>,
    pub bullets: Vec<EntityKey>,
    pub decoys: Vec<EntityKey>,
    pub particles: Vec<EntityKey>,
    pub explosions: Vec<EntityKey>,
}

impl KindLists {
    fn list_mut(&mut self, kind: &EntityKind) -> &mut Vec<EntityKey> {
        match kind {
            EntityKind::Plane(_) => &mut self.planes,
            EntityKind::Missile(_) => &mut self.missiles,
            EntityKind::Bullet(_) => &mut self.bullets,
            EntityKind::Decoy(_) => &mut self.decoys,
            EntityKind::Particle(_) => &mut self.particles,
            EntityKind::Explosion(_) => &mut self.explosions,
        }
    }
}

#[derive(Debug)]
pub struct Registry {
    pub(crate) arena: SlotMap<EntityKey, Entity>,
    by_id: HashMap<EntityId, EntityKey>,
    pub(crate) kinds: KindLists,
    pub(crate) grid: SpatialGrid,
    pending_tx: Sender<Entity>,
    pending_rx: Receiver<Entity>,
    next_id: Arc<AtomicU64>,
}

impl Registry {
    pub fn new(cell_shift: u32) -> Self {
        let (pending_tx, pending_rx) = unbounded();
        Self {
            arena: SlotMap::with_key(),
            by_id: HashMap::new(),
            kinds: KindLists::default(),
            grid: SpatialGrid::new(cell_shift),
            pending_tx,
            pending_rx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn spawner(&self) -> Spawner {
        Spawner {
            tx: self.pending_tx.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.by_id.get(&id).and_then(|k| self.arena.get(*k))
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.by_id.get(&id).and_then(|k| self.arena.get_mut(*k))
    }

    pub fn key_of(&self, id: EntityId) -> Option<EntityKey> {
        self.by_id.get(&id).copied()
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.arena.get(key)
    }

    pub fn entity_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.arena.get_mut(key)
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn plane_key_of_peer(&self, peer: PeerId) -> Option<EntityKey> {
        self.kinds
            .planes
            .iter()
            .copied()
            .find(|k| self.arena.get(*k).is_some_and(|e| e.peer == Some(peer)))
    }

    /// Promote everything enqueued since the last frame into the live
    /// collections and the spatial index. Single-threaded, once per frame.
    pub fn sync(&mut self) {
        while let Ok(entity) = self.pending_rx.try_recv() {
            let id = entity.id;
            let pos = entity.body.pos;
            let indexed = entity.caps.spatially_indexed();
            let key = self.arena.insert(entity);
            self.kinds.list_mut(&self.arena[key].kind).push(key);
            if let Some(id) = id {
                self.by_id.insert(id, key);
            }
            if indexed {
                self.grid.insert(key, pos);
            }
        }
    }

    /// Sweep expired entities. Missiles run their removal side effects first:
    /// an expired missile spawns an explosion at its final position, and a
    /// missile that died chasing a decoy retires the decoy with it, so the
    /// decoy sweeps in this same pass.
    pub fn prune(&mut self, ctx: &SimContext) {
        let spawner = self.spawner();
        let mut retired_decoys: Vec<EntityId> = Vec::new();

        for &key in &self.kinds.missiles {
            let Some(entity) = self.arena.get(key) else {
                continue;
            };
            if !entity.expired {
                continue;
            }
            spawner.enqueue_explosion(
                entity.owner,
                entity.body.pos,
                ctx.tuning.explosion.radius,
                ctx.tuning.explosion.duration,
            );
            if let EntityKind::Missile(m) = &entity.kind {
                if let Some(target) = m.target {
                    retired_decoys.push(target);
                }
            }
        }
        for id in retired_decoys {
            if let Some(target) = self.get_mut(id) {
                if matches!(target.kind, EntityKind::Decoy(_)) {
                    target.expired = true;
                }
            }
        }

        self.sweep_list(|k| &mut k.planes);
        self.sweep_list(|k| &mut k.bullets);
        self.sweep_list(|k| &mut k.missiles);
        self.sweep_list(|k| &mut k.decoys);
        self.sweep_list(|k| &mut k.particles);
        self.sweep_list(|k| &mut k.explosions);
    }

    fn sweep_list(&mut self, list: fn(&mut KindLists) -> &mut Vec<EntityKey>) {
        let mut keys = std::mem::take(list(&mut self.kinds));
        keys.retain(|&key| {
            let expired = self.arena.get(key).is_none_or(|e| e.expired);
            if expired {
                if let Some(entity) = self.arena.remove(key) {
                    if let Some(id) = entity.id {
                        self.by_id.remove(&id);
                    }
                    self.grid.remove(key);
                }
            }
            !expired
        });
        *list(&mut self.kinds) = keys;
    }

    /// Rebuild spatial membership from the live arena: moved entities are
    /// re-bucketed, entities expired since the last prune drop out.
    pub fn reindex(&mut self) {
        let moves: Vec<(EntityKey, Vec2, bool)> = self
            .arena
            .iter()
            .filter(|(_, e)| e.caps.spatially_indexed())
            .map(|(k, e)| (k, e.body.pos, e.expired))
            .collect();
        self.grid.update(&moves);
    }

    /// Data-parallel per-entity advance. Non-plane entities go first in
    /// statically partitioned chunks; planes follow across the full worker
    /// width since their per-entity cost dominates. Neither pass reads or
    /// writes another entity's state, so ordering between them is free.
    pub fn update(&mut self, ctx: &SimContext, spawner: &Spawner) {
        let (mut planes, mut others): (Vec<&mut Entity>, Vec<&mut Entity>) =
            self.arena.values_mut().partition(|e| e.is_plane());

        let chunk = (others.len() / ctx.workers.max(1)).max(1);
        others.par_chunks_mut(chunk).for_each(|slice| {
            for entity in slice {
                advance_entity(entity, ctx);
            }
        });

        planes.par_iter_mut().for_each(|entity| {
            advance_plane(entity, ctx, spawner);
        });
    }

    /// Respawn planes whose timers elapsed. Runs in the single-threaded part
    /// of the frame because safe placement reads every other plane.
    pub fn respawn_ready_planes(&mut self, ctx: &SimContext, rng: &mut impl Rng) {
        let due: Vec<EntityKey> = self
            .kinds
            .planes
            .iter()
            .copied()
            .filter(|&k| {
                self.arena.get(k).is_some_and(|e| match &e.kind {
                    EntityKind::Plane(p) => !p.alive && p.respawn_timer <= 0.0,
                    _ => false,
                })
            })
            .collect();

        for key in due {
            let pos = self.safe_spawn_position(ctx, rng);
            let Some(entity) = self.arena.get_mut(key) else {
                continue;
            };
            entity.body = Body {
                pos,
                ..Body::default()
            };
            if let EntityKind::Plane(p) = &mut entity.kind {
                p.hp = ctx.tuning.plane.max_hp;
                p.alive = true;
                p.crashed = false;
                p.crash_ease = 0.0;
                p.throttle = 0.0;
                p.gun_cooldown = 0.0;
                p.missile_cooldown = 0.0;
            }
        }
    }

    /// A position at least `safe_spawn_distance` from every live plane.
    /// Rejection-sampled; falls back to the farthest candidate seen when the
    /// field is too crowded to satisfy the bound.
    pub fn safe_spawn_position(&self, ctx: &SimContext, rng: &mut impl Rng) -> Vec2 {
        let bounds = ctx.bounds;
        let min_dist = ctx.tuning.plane.safe_spawn_distance;
        let mut best = Vec2::new(0.0, bounds.ceiling * 0.5);
        let mut best_dist = f32::NEG_INFINITY;

        for _ in 0..32 {
            let candidate = Vec2::new(
                rng.gen_range(bounds.min_x..bounds.max_x),
                rng.gen_range(bounds.ceiling * 0.25..bounds.ceiling * 0.75),
            );
            let nearest = self
                .kinds
                .planes
                .iter()
                .filter_map(|&k| self.arena.get(k))
                .filter(|e| match &e.kind {
                    EntityKind::Plane(p) => p.alive,
                    _ => false,
                })
                .map(|e| e.body.pos.distance(candidate))
                .fold(f32::INFINITY, f32::min);
            if nearest >= min_dist {
                return candidate;
            }
            if nearest > best_dist {
                best_dist = nearest;
                best = candidate;
            }
        }
        best
    }

    /// Mark every entity belonging to `peer` expired; swept at next prune.
    pub fn expire_peer(&mut self, peer: PeerId) {
        for entity in self.arena.values_mut() {
            if entity.peer == Some(peer) {
                entity.expired = true;
            }
        }
    }
}

fn advance_entity(entity: &mut Entity, ctx: &SimContext) {
    let dt = ctx.dt;
    match &mut entity.kind {
        EntityKind::Bullet(b) => {
            entity.body.pos += entity.body.vel * dt;
            b.ttl -= dt;
            if b.ttl <= 0.0 {
                entity.expired = true;
            }
        }
        EntityKind::Missile(m) => {
            entity.body.pos += entity.body.vel * dt;
            m.fuel -= dt;
            if m.fuel <= 0.0 {
                entity.expired = true;
            }
        }
        EntityKind::Decoy(d) => {
            entity.body.pos += entity.body.vel * dt;
            // Decoys drift and decelerate.
            entity.body.vel *= 1.0 - (1.5 * dt).min(1.0);
            d.ttl -= dt;
            if d.ttl <= 0.0 {
                entity.expired = true;
            }
        }
        EntityKind::Particle(p) => {
            entity.body.pos += entity.body.vel * dt;
            p.ttl -= dt;
            if p.ttl <= 0.0 {
                entity.expired = true;
            }
        }
        EntityKind::Explosion(e) => {
            e.ttl -= dt;
            if e.ttl <= 0.0 {
                entity.expired = true;
            }
        }
        EntityKind::Plane(_) => unreachable!("planes advance in their own pass"),
    }
    debug_assert!(
        entity.body.pos.is_finite() && entity.body.vel.is_finite(),
        "non-finite kinematics"
    );
}

fn advance_plane(entity: &mut Entity, ctx: &SimContext, spawner: &Spawner) {
    let dt = ctx.dt;
    let tuning = &ctx.tuning.plane;
    let (id, peer) = (entity.id, entity.peer);
    let EntityKind::Plane(plane) = &mut entity.kind else {
        return;
    };

    if !plane.alive {
        plane.respawn_timer -= dt;
        return;
    }

    if plane.crashed {
        // Locked flat on the ground; rotation eases level instead of the
        // plane expiring.
        plane.crash_ease = (plane.crash_ease + dt / tuning.crash_flatten_seconds).min(1.0);
        entity.body.rot = lerp_angle(entity.body.rot, 0.0, plane.crash_ease);
        entity.body.vel *= 1.0 - (3.0 * dt).min(1.0);
        entity.body.pos.y = 0.0;
        return;
    }

    plane.throttle = (plane.throttle + plane.input.thrust * tuning.throttle_rate * dt)
        .clamp(0.0, 1.0);
    entity.body.rot += plane.input.turn * tuning.turn_rate * dt;

    let dir = Vec2::from_angle(entity.body.rot);
    entity.body.vel = dir * plane.throttle * tuning.max_speed;
    entity.body.pos += entity.body.vel * dt;

    plane.gun_cooldown = (plane.gun_cooldown - dt).max(0.0);
    plane.missile_cooldown = (plane.missile_cooldown - dt).max(0.0);

    if let (Some(id), Some(peer)) = (id, peer) {
        let projectile = &ctx.tuning.projectile;
        if plane.input.fire_gun && plane.gun_cooldown <= 0.0 {
            let body = Body {
                pos: entity.body.pos + dir * 30.0,
                vel: entity.body.vel + dir * projectile.bullet_speed,
                rot: entity.body.rot,
            };
            spawner.enqueue_bullet(id, peer, body, projectile.bullet_ttl);
            plane.gun_cooldown = tuning.gun_cooldown;
        }
        if plane.input.fire_missile && plane.missile_cooldown <= 0.0 {
            let body = Body {
                pos: entity.body.pos + dir * 34.0,
                vel: dir * projectile.missile_speed,
                rot: entity.body.rot,
            };
            spawner.enqueue_missile(id, peer, body, projectile.missile_fuel);
            plane.missile_cooldown = tuning.missile_cooldown;
        }
        if plane.input.drop_decoy {
            let body = Body {
                pos: entity.body.pos - dir * 24.0,
                vel: entity.body.vel * 0.5,
                rot: entity.body.rot,
            };
            spawner.enqueue_decoy(id, peer, body, projectile.decoy_ttl);
            plane.input.drop_decoy = false;
        }
    }

    if ctx.role == NetRole::Server {
        plane
            .history
            .enqueue(entity.body.pos, entity.body.rot, ctx.now_ms);
    }

    debug_assert!(
        entity.body.pos.is_finite() && entity.body.vel.is_finite(),
        "non-finite kinematics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::NetRole;

    fn ctx() -> SimContext {
        let mut ctx = SimContext::new(NetRole::Server);
        ctx.begin_frame(1.0 / 60.0);
        ctx
    }

    #[test]
    fn sync_promotes_pending_entities() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let id = spawner.enqueue_plane(1, Vec2::new(10.0, 100.0), 100);

        assert!(reg.get(id).is_none());
        reg.sync();
        assert!(reg.get(id).is_some());
        assert_eq!(reg.kinds.planes.len(), 1);
        assert_eq!(reg.grid().len(), 1);
    }

    #[test]
    fn cosmetic_entities_skip_id_lookup() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        spawner.enqueue_particle(Body::default(), 1.0);
        reg.sync();
        assert_eq!(reg.len(), 1);
        // Pushable, so spatially indexed, but never in the id map.
        assert_eq!(reg.grid().len(), 1);
        assert!(reg.arena.values().all(|e| e.id.is_none()));
    }

    #[test]
    fn prune_removes_expired_and_reuses_slots() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let id = spawner.enqueue_bullet(7, 1, Body::default(), 1.0);
        reg.sync();

        let key = reg.key_of(id).unwrap();
        reg.get_mut(id).unwrap().expired = true;
        reg.prune(&ctx());

        assert!(reg.get(id).is_none());
        // Stale generation-checked handle no longer resolves.
        assert!(reg.entity(key).is_none());

        let id2 = spawner.enqueue_bullet(7, 1, Body::default(), 1.0);
        reg.sync();
        assert!(reg.get(id2).is_some());
        assert!(reg.entity(key).is_none());
    }

    #[test]
    fn expired_missile_spawns_explosion_on_prune() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let id = spawner.enqueue_missile(9, 1, Body::default(), 5.0);
        reg.sync();

        reg.get_mut(id).unwrap().expired = true;
        reg.prune(&ctx());
        reg.sync();
        assert_eq!(reg.kinds.explosions.len(), 1);
        assert_eq!(reg.kinds.missiles.len(), 0);

        // Already swept; a second prune cannot double-spawn.
        reg.prune(&ctx());
        reg.sync();
        assert_eq!(reg.kinds.explosions.len(), 1);
    }

    #[test]
    fn missile_chasing_decoy_retires_it() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let missile = spawner.enqueue_missile(9, 1, Body::default(), 5.0);
        let decoy = spawner.enqueue_decoy(9, 1, Body::default(), 10.0);
        reg.sync();

        {
            let m = reg.get_mut(missile).unwrap();
            m.expired = true;
            if let EntityKind::Missile(inner) = &mut m.kind {
                inner.target = Some(decoy);
            }
        }
        reg.prune(&ctx());
        assert!(reg.get(decoy).is_none());
        assert_eq!(reg.kinds.decoys.len(), 0);
    }

    #[test]
    fn update_advances_and_expires_bullets() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let body = Body {
            vel: Vec2::new(60.0, 0.0),
            ..Body::default()
        };
        let id = spawner.enqueue_bullet(7, 1, body, 0.01);
        reg.sync();

        let c = ctx();
        reg.update(&c, &spawner);
        let bullet = reg.get(id).unwrap();
        assert!(bullet.body.pos.x > 0.9);
        assert!(bullet.expired);
    }

    #[test]
    fn plane_firing_gun_enqueues_bullet_with_owner_backref() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let id = spawner.enqueue_plane(1, Vec2::new(0.0, 500.0), 100);
        reg.sync();

        {
            let plane = reg.get_mut(id).unwrap();
            if let EntityKind::Plane(p) = &mut plane.kind {
                p.throttle = 1.0;
                p.input.fire_gun = true;
            }
        }
        let c = ctx();
        reg.update(&c, &spawner);
        reg.sync();

        assert_eq!(reg.kinds.bullets.len(), 1);
        let bullet_key = reg.kinds.bullets[0];
        assert_eq!(reg.entity(bullet_key).unwrap().owner, Some(id));
    }

    #[test]
    fn safe_spawn_respects_minimum_distance() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let occupied = Vec2::new(0.0, 1000.0);
        spawner.enqueue_plane(1, occupied, 100);
        reg.sync();

        let c = ctx();
        let mut rng = rand::thread_rng();
        for _ in 0..16 {
            let pos = reg.safe_spawn_position(&c, &mut rng);
            assert!(occupied.distance(pos) >= c.tuning.plane.safe_spawn_distance);
        }
    }

    #[test]
    fn expire_peer_marks_all_owned_entities() {
        let mut reg = Registry::new(6);
        let spawner = reg.spawner();
        let plane = spawner.enqueue_plane(3, Vec2::new(0.0, 100.0), 100);
        spawner.enqueue_bullet(plane, 3, Body::default(), 5.0);
        reg.sync();

        reg.expire_peer(3);
        reg.prune(&ctx());
        assert_eq!(reg.kinds.planes.len(), 0);
        assert_eq!(reg.kinds.bullets.len(), 0);
    }
}
