use super::types::{
    GameEvent, PlaneSnapshot, ProjectileClass, ProjectileSnapshot, ServerState, WorldUpdate,
};
use crate::domain::collision::{explosion_pass, ground_and_wrap, projectile_pass};
use crate::domain::{
    EntityKind, GroundImpactLog, Impact, NetRole, PeerId, Registry, SimContext,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tracing::info;

/// Cell side 256 = 2^8, sized so one blast radius spans at most ~1 cell.
const CELL_SHIFT: u32 = 8;

pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    world_tx: broadcast::Sender<WorldUpdate>,
    server_state_tx: watch::Sender<ServerState>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
    start_delay: Duration,
    match_time_limit: Duration,
) {
    let mut tick: u64 = 0;
    let mut ctx = SimContext::new(NetRole::Server);
    let mut registry = Registry::new(CELL_SHIFT);
    let spawner = registry.spawner();
    let mut ground_log = GroundImpactLog::default();
    // Owned rng; the task future must stay Send across awaits.
    let mut rng = StdRng::from_entropy();
    // Measured one-way lag per peer, stamped onto their fresh projectiles.
    let mut peer_lag: HashMap<PeerId, f64> = HashMap::new();

    if !start_delay.is_zero() {
        let _ = server_state_tx.send(ServerState::MatchStarting {
            in_seconds: start_delay.as_secs() as u32,
        });
        tokio::time::sleep(start_delay).await;
    }
    let _ = server_state_tx.send(ServerState::MatchRunning);

    // Fixed-step frame pacer at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);

    let mut match_elapsed = Duration::from_secs(0);
    let mut match_ended = false;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {
                if !match_ended && match_time_limit != Duration::from_secs(0) {
                    match_elapsed += tick_interval;
                    if match_elapsed >= match_time_limit {
                        let _ = server_state_tx.send(ServerState::MatchEnded);
                        match_ended = true;
                    }
                }
            }
        }

        ctx.begin_frame(tick_interval.as_secs_f32());
        let mut spawned: Vec<(PeerId, u64, glam::Vec2)> = Vec::new();

        while let Ok(ev) = input_rx.try_recv() {
            match ev {
                GameEvent::Join { peer } => {
                    let pos = registry.safe_spawn_position(&ctx, &mut rng);
                    let id = spawner.enqueue_plane(peer, pos, ctx.tuning.plane.max_hp);
                    spawned.push((peer, id, pos));
                    info!(peer, id, "player joined");
                }
                GameEvent::Leave { peer } => {
                    registry.expire_peer(peer);
                    peer_lag.remove(&peer);
                    info!(peer, "player left");
                }
                GameEvent::Input { peer, input } => {
                    if let Some(key) = registry.plane_key_of_peer(peer) {
                        if let Some(entity) = registry.entity_mut(key) {
                            if let EntityKind::Plane(p) = &mut entity.kind {
                                p.input = input;
                            }
                        }
                    }
                }
                GameEvent::Lag { peer, lag_ms } => {
                    peer_lag.insert(peer, lag_ms);
                }
            }
        }

        // Frame phases, in the order later phases assume: (1) queue sync,
        // (2) expiration prune, (3) spatial reindex, (4) parallel update,
        // (5) collision/impulse, (6) ground and field correction.
        registry.sync();
        stamp_projectile_lag(&mut registry, &peer_lag);

        let expired = collect_expired(&registry);
        registry.prune(&ctx);
        registry.respawn_ready_planes(&ctx, &mut rng);

        registry.reindex();

        registry.update(&ctx, &spawner);

        let mut impacts: Vec<Impact> = Vec::new();
        projectile_pass(&mut registry, &ctx, &mut impacts);
        explosion_pass(&mut registry, &ctx, &mut impacts);

        ground_and_wrap(&mut registry, &ctx, &mut ground_log);

        tick += 1;
        let _ = world_tx.send(snapshot(
            tick, &ctx, &registry, impacts, expired, spawned,
        ));
    }
}

/// Fresh projectiles inherit their owner peer's measured lag, which later
/// widens the rewind window used against them.
fn stamp_projectile_lag(registry: &mut Registry, peer_lag: &HashMap<PeerId, f64>) {
    let keys: Vec<_> = registry
        .kinds
        .bullets
        .iter()
        .chain(registry.kinds.missiles.iter())
        .copied()
        .collect();
    for key in keys {
        let Some(entity) = registry.entity_mut(key) else {
            continue;
        };
        let Some(lag) = entity.peer.and_then(|p| peer_lag.get(&p)).copied() else {
            continue;
        };
        match &mut entity.kind {
            EntityKind::Bullet(b) if b.fresh => b.lag_ms = lag,
            EntityKind::Missile(m) if m.fresh => m.lag_ms = lag,
            _ => {}
        }
    }
}

fn collect_expired(registry: &Registry) -> Vec<u64> {
    registry
        .arena
        .values()
        .filter(|e| e.expired)
        .filter_map(|e| e.id)
        .collect()
}

fn snapshot(
    tick: u64,
    ctx: &SimContext,
    registry: &Registry,
    impacts: Vec<Impact>,
    expired: Vec<u64>,
    spawned: Vec<(PeerId, u64, glam::Vec2)>,
) -> WorldUpdate {
    let planes = registry
        .kinds
        .planes
        .iter()
        .filter_map(|&k| registry.entity(k))
        .filter_map(|e| match &e.kind {
            EntityKind::Plane(p) => Some(PlaneSnapshot {
                id: e.id?,
                peer: e.peer?,
                pos: e.body.pos,
                vel: e.body.vel,
                rot: e.body.rot,
                hp: p.hp,
                alive: p.alive,
            }),
            _ => None,
        })
        .collect();

    let classed = [
        (&registry.kinds.bullets, ProjectileClass::Bullet),
        (&registry.kinds.missiles, ProjectileClass::Missile),
        (&registry.kinds.decoys, ProjectileClass::Decoy),
    ];
    let projectiles = classed
        .iter()
        .flat_map(|(keys, class)| keys.iter().map(move |&k| (k, *class)))
        .filter_map(|(k, class)| registry.entity(k).map(|e| (e, class)))
        .filter(|(e, _)| !e.expired)
        .filter_map(|(e, class)| {
            Some(ProjectileSnapshot {
                id: e.id?,
                owner: e.owner,
                class,
                pos: e.body.pos,
                vel: e.body.vel,
                rot: e.body.rot,
            })
        })
        .collect();

    WorldUpdate {
        tick,
        now_ms: ctx.now_ms,
        planes,
        projectiles,
        impacts,
        expired,
        spawned,
    }
}
