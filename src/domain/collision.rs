// Per-frame collision detection and resolution: continuous sweeps of
// projectiles against plane hulls (lag-compensated on the server), explosion
// impulse/splash, ground impact, and field wrap.

use crate::domain::context::{NetRole, SimContext};
use crate::domain::entity::{Caps, Entity, EntityId, EntityKey, EntityKind};
use crate::domain::geometry::{
    Aabb, Polygon, cockpit_point, edge_normal, missile_hull, plane_hull, polygon_contains,
    segment_intersection,
};
use crate::domain::registry::Registry;
use glam::Vec2;
use std::collections::VecDeque;
use tracing::debug;

/// Backstep granularity when resolving an already-overlapping projectile.
const OVERLAP_STEP: f32 = 4.0;
const OVERLAP_MAX_STEPS: usize = 64;

/// Interaction outcome handed to gameplay (health) and the wire layer.
/// Ephemeral; never retained after being applied and broadcast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub kind: ImpactKind,
    pub target: EntityId,
    pub shooter: Option<EntityId>,
    /// World-space point on the target's hull boundary.
    pub point: Vec2,
    /// Incoming direction of the relative motion, radians.
    pub angle: f32,
    pub damage: i32,
    pub headshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactKind {
    Bullet,
    Missile,
    Splash,
}

/// Cosmetic ground-impact decals, FIFO-bounded.
#[derive(Debug)]
pub struct GroundImpactLog {
    ring: VecDeque<GroundImpact>,
    cap: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct GroundImpact {
    pub pos: Vec2,
    pub angle: f32,
}

impl GroundImpactLog {
    pub fn new(cap: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, impact: GroundImpact) {
        if self.ring.len() == self.cap {
            self.ring.pop_front();
        }
        self.ring.push_back(impact);
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroundImpact> {
        self.ring.iter()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for GroundImpactLog {
    fn default() -> Self {
        Self::new(128)
    }
}

/// Sweep every plane's spatial neighborhood for hostile projectiles and
/// resolve hits. Projectiles already expired are skipped, and expiring one
/// here is idempotent: it cannot produce a second impact or explosion.
pub fn projectile_pass(reg: &mut Registry, ctx: &SimContext, impacts: &mut Vec<Impact>) {
    let hull = plane_hull();
    let impactor_hull = missile_hull();
    let plane_keys: Vec<EntityKey> = reg.kinds.planes.clone();

    for plane_key in plane_keys {
        let Some(plane) = reg.arena.get(plane_key) else {
            continue;
        };
        if plane.expired || !plane_is_alive(plane) {
            continue;
        }
        // One neighborhood gather per plane; never a full pairwise scan.
        let neighbors: Vec<EntityKey> = reg.grid.get_near(plane.body.pos).collect();

        for proj_key in neighbors {
            if proj_key == plane_key {
                continue;
            }
            let Some([plane, proj]) = reg.arena.get_disjoint_mut([plane_key, proj_key]) else {
                continue;
            };
            if !proj.is_projectile() || proj.expired {
                continue;
            }
            if proj.owner.is_some() && proj.owner == plane.id {
                continue;
            }

            if let Some(impact) = test_projectile(plane, proj, ctx, &hull, &impactor_hull) {
                proj.expired = true;
                apply_impact(plane, &impact, ctx);
                impacts.push(impact);
            }
        }
    }
}

fn plane_is_alive(entity: &Entity) -> bool {
    match &entity.kind {
        EntityKind::Plane(p) => p.alive && !p.crashed,
        _ => false,
    }
}

/// Continuous test of one projectile against one plane, rewinding the plane
/// to the shooter's perceived timeframe first when running authoritatively.
fn test_projectile(
    plane: &mut Entity,
    proj: &mut Entity,
    ctx: &SimContext,
    hull: &Polygon,
    impactor_hull: &Polygon,
) -> Option<Impact> {
    let lag_ms = match &proj.kind {
        EntityKind::Bullet(b) => b.lag_ms,
        EntityKind::Missile(m) => m.lag_ms,
        _ => return None,
    };

    // Rewind to `now - (projectile lag + interpolation constant)`; restore
    // the live pose afterwards no matter what the test found. Without a
    // bracketing snapshot the live pose stands in.
    let mut live_pose = None;
    if ctx.role == NetRole::Server && lag_ms > 0.0 {
        let rewind_to = ctx.now_ms - lag_ms - ctx.interp_ms;
        if let EntityKind::Plane(p) = &plane.kind {
            if let Some((pos, rot)) = p.history.get_historical_state(rewind_to) {
                live_pose = Some((plane.body.pos, plane.body.rot));
                plane.body.pos = pos;
                plane.body.rot = rot;
            }
        }
    }

    // The impact result is computed against the rewound pose too, so the
    // local offset and headshot test match what the shooter saw.
    let impact = sweep_against_hull(plane, proj, ctx, hull, impactor_hull)
        .map(|point| build_impact(plane, proj, ctx, point));

    if let Some((pos, rot)) = live_pose {
        plane.body.pos = pos;
        plane.body.rot = rot;
    }
    impact
}

/// The sweep itself, evaluated at the plane's current (possibly rewound)
/// pose. Returns the boundary impact point.
fn sweep_against_hull(
    plane: &Entity,
    proj: &mut Entity,
    ctx: &SimContext,
    hull: &Polygon,
    impactor_hull: &Polygon,
) -> Option<Vec2> {
    let rel_vel = proj.body.vel - plane.body.vel;
    let motion = rel_vel * ctx.dt;
    let start = proj.body.pos;
    let end = start + motion;

    let verts = hull.world_verts(plane.body.pos, plane.body.rot);
    let aabb = Aabb::of_points(&verts).inflate(OVERLAP_STEP);

    // Fresh projectiles first ray-cast the gap between their visible launch
    // point and wherever extrapolation placed them.
    let (fresh, launch_pos) = match &mut proj.kind {
        EntityKind::Bullet(b) => {
            let fresh = b.fresh;
            b.fresh = false;
            (fresh, b.launch_pos)
        }
        EntityKind::Missile(m) => {
            let fresh = m.fresh;
            m.fresh = false;
            (fresh, m.launch_pos)
        }
        _ => (false, start),
    };
    if fresh && launch_pos != start {
        if aabb.intersects_segment(launch_pos, start) {
            if let Some(point) = cast_into_hull(&verts, launch_pos, start - launch_pos) {
                return Some(point);
            }
        }
    }

    if !aabb.intersects_segment(start, end) {
        return None;
    }

    // Already inside the hull (spawned overlapping, or tunneled last frame):
    // step backwards along the relative velocity until disjoint, bounded by
    // the ground plane and a step cap, then sweep forward from there.
    if polygon_contains(&verts, start) {
        let back = rel_vel.normalize_or_zero();
        if back == Vec2::ZERO {
            return None;
        }
        let mut probe = start;
        for _ in 0..OVERLAP_MAX_STEPS {
            probe -= back * OVERLAP_STEP;
            if probe.y <= 0.0 {
                break;
            }
            if !polygon_contains(&verts, probe) {
                return cast_into_hull(&verts, probe, start + motion - probe);
            }
        }
        // Could not find a disjoint start; treat the current position as the
        // impact.
        return Some(start);
    }

    // Leading vertices of the impactor, cast along the motion against the
    // hull edges facing back toward it.
    if matches!(proj.kind, EntityKind::Missile(_)) {
        let impactor_verts = impactor_hull.world_verts(start, proj.body.rot);
        let mut nearest: Option<(f32, Vec2)> = None;
        for v in impactor_verts {
            if (v - start).dot(rel_vel) < 0.0 {
                continue;
            }
            if let Some(point) = cast_into_hull(&verts, v, motion) {
                let d = (point - v).length_squared();
                if nearest.is_none_or(|(best, _)| d < best) {
                    nearest = Some((d, point));
                }
            }
        }
        nearest.map(|(_, p)| p)
    } else {
        cast_into_hull(&verts, start, motion)
    }
}

/// Cast the segment `from .. from + motion` against hull edges whose outward
/// normal opposes the motion; back faces are culled, halving the segment
/// tests. Nearest intersection wins.
fn cast_into_hull(verts: &[Vec2], from: Vec2, motion: Vec2) -> Option<Vec2> {
    let to = from + motion;
    let mut nearest: Option<(f32, Vec2)> = None;
    let n = verts.len();
    for i in 0..n {
        let (a, b) = (verts[i], verts[(i + 1) % n]);
        if edge_normal(a, b).dot(motion) >= 0.0 {
            continue;
        }
        if let Some(point) = segment_intersection(from, to, a, b) {
            let d = (point - from).length_squared();
            if nearest.is_none_or(|(best, _)| d < best) {
                nearest = Some((d, point));
            }
        }
    }
    nearest.map(|(_, p)| p)
}

fn build_impact(plane: &Entity, proj: &Entity, ctx: &SimContext, point: Vec2) -> Impact {
    let rel_vel = proj.body.vel - plane.body.vel;
    let angle = rel_vel.y.atan2(rel_vel.x);

    // Headshot: impact point within the cockpit radius, in hull-local space.
    let local = Vec2::from_angle(-plane.body.rot).rotate(point - plane.body.pos);
    let headshot = local.distance(cockpit_point()) <= ctx.tuning.plane.cockpit_radius;

    let (kind, mut damage) = match &proj.kind {
        EntityKind::Missile(_) => (ImpactKind::Missile, ctx.tuning.projectile.missile_damage),
        _ => (ImpactKind::Bullet, ctx.tuning.projectile.bullet_damage),
    };
    if headshot {
        damage = (damage as f32 * ctx.tuning.projectile.headshot_multiplier).round() as i32;
    }

    Impact {
        kind,
        target: plane.id.unwrap_or_default(),
        shooter: proj.owner,
        point,
        angle,
        damage,
        headshot,
    }
}

/// Reduce the target's health and flip it into the dead/respawning state
/// when depleted.
fn apply_impact(plane: &mut Entity, impact: &Impact, ctx: &SimContext) {
    let EntityKind::Plane(p) = &mut plane.kind else {
        return;
    };
    p.hp -= impact.damage;
    if p.hp <= 0 {
        p.hp = 0;
        p.alive = false;
        p.respawn_timer = ctx.tuning.plane.respawn_seconds;
        p.throttle = 0.0;
        plane.body.vel = Vec2::ZERO;
    }
    debug!(
        target = plane.id.unwrap_or_default(),
        damage = impact.damage,
        headshot = impact.headshot,
        "projectile impact"
    );
}

/// Radial impulse, splash damage and detonation-by-proximity for every
/// active explosion.
pub fn explosion_pass(reg: &mut Registry, ctx: &SimContext, impacts: &mut Vec<Impact>) {
    use crate::domain::tuning::PUSH_RADIUS_SCALE;

    let explosion_keys: Vec<EntityKey> = reg.kinds.explosions.clone();
    for expl_key in explosion_keys {
        let Some(expl) = reg.arena.get(expl_key) else {
            continue;
        };
        if expl.expired {
            continue;
        }
        let EntityKind::Explosion(e) = &expl.kind else {
            continue;
        };
        let center = expl.body.pos;
        let owner = expl.owner;
        let push_radius = e.radius * PUSH_RADIUS_SCALE;

        let neighbors: Vec<EntityKey> = reg.grid.get_near(center).collect();
        for key in neighbors {
            if key == expl_key {
                continue;
            }
            let Some(entity) = reg.arena.get_mut(key) else {
                continue;
            };
            if entity.expired {
                continue;
            }
            let offset = entity.body.pos - center;
            let dist = offset.length();
            if dist >= push_radius {
                continue;
            }

            // Eased radial falloff; full force at the center, zero at the rim.
            let t = 1.0 - dist / push_radius;
            let falloff = t * (2.0 - t);

            if entity.caps.contains(Caps::PUSHABLE) {
                let dir = if dist > f32::EPSILON {
                    offset / dist
                } else {
                    Vec2::Y
                };
                entity.body.vel += dir * ctx.tuning.explosion.force * falloff * ctx.dt;
            }

            let alive_plane = match &entity.kind {
                EntityKind::Plane(p) => p.alive,
                // Sympathetic detonation: live missiles caught in the blast
                // expire immediately rather than being pushed away.
                EntityKind::Missile(_) => {
                    entity.expired = true;
                    continue;
                }
                _ => continue,
            };
            if alive_plane && entity.caps.contains(Caps::BLAST_DAMAGE) && entity.id != owner {
                let damage = (ctx.tuning.explosion.splash_per_frame * falloff).round() as i32;
                if damage > 0 {
                    let impact = Impact {
                        kind: ImpactKind::Splash,
                        target: entity.id.unwrap_or_default(),
                        shooter: owner,
                        point: entity.body.pos,
                        angle: offset.y.atan2(offset.x),
                        damage,
                        headshot: false,
                    };
                    apply_impact(entity, &impact, ctx);
                    impacts.push(impact);
                }
            }
        }
    }
}

/// Ground impact and toroidal field wrap. Runs after the collision pass so
/// impulse-adjusted velocities are what get projected into the ground test.
pub fn ground_and_wrap(reg: &mut Registry, ctx: &SimContext, log: &mut GroundImpactLog) {
    let dt = ctx.dt;
    let width = ctx.bounds.max_x - ctx.bounds.min_x;

    for entity in reg.arena.values_mut() {
        let pos = entity.body.pos;
        let vel = entity.body.vel;
        // Travel-aware crossing test: fast movers cannot tunnel through the
        // ground plane between frames.
        let grounded = pos.y <= 0.0 || pos.y + vel.y * dt <= 0.0;

        match &mut entity.kind {
            EntityKind::Plane(p) => {
                if grounded && p.alive && !p.crashed {
                    p.crashed = true;
                    p.crash_ease = 0.0;
                    entity.body.pos.y = 0.0;
                    entity.body.vel.y = 0.0;
                    debug!(plane = entity.id.unwrap_or_default(), "plane crashed");
                }
                // Toroidal wrap across the horizontal boundary; a position
                // correction, not a collision.
                if entity.body.pos.x < ctx.bounds.min_x {
                    entity.body.pos.x += width;
                } else if entity.body.pos.x > ctx.bounds.max_x {
                    entity.body.pos.x -= width;
                }
            }
            EntityKind::Bullet(_) | EntityKind::Missile(_) => {
                if grounded && !entity.expired {
                    entity.expired = true;
                    log.push(GroundImpact {
                        pos: Vec2::new(pos.x, 0.0),
                        angle: vel.y.atan2(vel.x),
                    });
                }
            }
            EntityKind::Decoy(_) => {
                if grounded {
                    entity.body.pos.y = 0.0;
                    entity.body.vel.y = 0.0;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Body, PeerId};
    use crate::domain::registry::Spawner;
    use glam::Vec2;

    const PEER: PeerId = 1;
    const ENEMY: PeerId = 2;

    fn ctx() -> SimContext {
        let mut ctx = SimContext::new(NetRole::Server);
        ctx.begin_frame(1.0 / 60.0);
        ctx
    }

    fn setup() -> (Registry, Spawner) {
        let reg = Registry::new(8);
        let spawner = reg.spawner();
        (reg, spawner)
    }

    fn spawn_plane(reg: &mut Registry, spawner: &Spawner, peer: PeerId, pos: Vec2) -> EntityId {
        let id = spawner.enqueue_plane(peer, pos, 100);
        reg.sync();
        id
    }

    fn hostile_bullet(
        reg: &mut Registry,
        spawner: &Spawner,
        owner: EntityId,
        pos: Vec2,
        vel: Vec2,
    ) -> EntityId {
        let id = spawner.enqueue_bullet(owner, ENEMY, Body { pos, vel, rot: 0.0 }, 5.0);
        reg.sync();
        // Skip the fresh-spawn pre-check unless a test opts in.
        if let Some(e) = reg.get_mut(id) {
            if let EntityKind::Bullet(b) = &mut e.kind {
                b.fresh = false;
            }
        }
        id
    }

    #[test]
    fn sweep_reports_boundary_point_not_interior() {
        let (mut reg, spawner) = setup();
        let target = spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 500.0));

        // Starts outside the hull, ends inside it after one frame of travel.
        let bullet = hostile_bullet(
            &mut reg,
            &spawner,
            999,
            Vec2::new(60.0, 500.0),
            Vec2::new(-3000.0, 0.0),
        );
        let mut impacts = Vec::new();
        projectile_pass(&mut reg, &ctx(), &mut impacts);

        assert_eq!(impacts.len(), 1);
        let impact = impacts[0];
        assert_eq!(impact.target, target);
        // Nose vertex sits at +28; the hit must land on the boundary.
        assert!((impact.point.x - 28.0).abs() < 0.5, "x = {}", impact.point.x);
        assert!((impact.point.y - 500.0).abs() < 1.0);
        assert!(reg.get(bullet).unwrap().expired);
    }

    #[test]
    fn expired_projectiles_are_skipped_idempotently() {
        let (mut reg, spawner) = setup();
        spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 500.0));
        let bullet = hostile_bullet(
            &mut reg,
            &spawner,
            999,
            Vec2::new(60.0, 500.0),
            Vec2::new(-3000.0, 0.0),
        );
        reg.get_mut(bullet).unwrap().expired = true;

        let mut impacts = Vec::new();
        projectile_pass(&mut reg, &ctx(), &mut impacts);
        projectile_pass(&mut reg, &ctx(), &mut impacts);
        assert!(impacts.is_empty());
    }

    #[test]
    fn own_projectiles_never_hit_their_plane() {
        let (mut reg, spawner) = setup();
        let plane = spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 500.0));
        hostile_bullet(
            &mut reg,
            &spawner,
            plane,
            Vec2::new(60.0, 500.0),
            Vec2::new(-3000.0, 0.0),
        );

        let mut impacts = Vec::new();
        projectile_pass(&mut reg, &ctx(), &mut impacts);
        assert!(impacts.is_empty());
    }

    #[test]
    fn lag_compensated_hit_tests_rewound_pose_and_restores_live() {
        let (mut reg, spawner) = setup();
        let plane = spawn_plane(&mut reg, &spawner, PEER, Vec2::new(200.0, 500.0));

        let mut c = ctx();
        c.set_now_ms(300.0);
        // History: the plane was at x=0 at t=100 and x=100 at t=200; the
        // bullet's view of the world is t = 300 - 100 - 50 = 150 -> x=50.
        {
            let e = reg.get_mut(plane).unwrap();
            if let EntityKind::Plane(p) = &mut e.kind {
                p.history.enqueue(Vec2::new(0.0, 500.0), 0.0, 100.0);
                p.history.enqueue(Vec2::new(100.0, 500.0), 0.0, 200.0);
            }
        }

        let bullet = hostile_bullet(
            &mut reg,
            &spawner,
            999,
            Vec2::new(10.0, 500.0),
            Vec2::new(2400.0, 0.0),
        );
        if let Some(e) = reg.get_mut(bullet) {
            if let EntityKind::Bullet(b) = &mut e.kind {
                b.lag_ms = 100.0;
            }
        }

        let mut impacts = Vec::new();
        projectile_pass(&mut reg, &c, &mut impacts);

        // Hit registered against the rewound pose at x=50 (tail edge at 26),
        // unreachable at the live pose x=200 this frame.
        assert_eq!(impacts.len(), 1);
        assert!(impacts[0].point.x < 60.0);
        // Live pose restored.
        assert_eq!(reg.get(plane).unwrap().body.pos, Vec2::new(200.0, 500.0));
    }

    #[test]
    fn missing_history_bracket_falls_back_to_live_pose() {
        let (mut reg, spawner) = setup();
        spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 500.0));

        let mut c = ctx();
        c.set_now_ms(300.0);
        let bullet = hostile_bullet(
            &mut reg,
            &spawner,
            999,
            Vec2::new(60.0, 500.0),
            Vec2::new(-3000.0, 0.0),
        );
        if let Some(e) = reg.get_mut(bullet) {
            if let EntityKind::Bullet(b) = &mut e.kind {
                b.lag_ms = 100.0;
            }
        }

        let mut impacts = Vec::new();
        projectile_pass(&mut reg, &c, &mut impacts);
        assert_eq!(impacts.len(), 1);
    }

    #[test]
    fn fresh_projectile_covers_launch_gap() {
        let (mut reg, spawner) = setup();
        spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 500.0));

        // Extrapolation placed the bullet past the plane, moving away; only
        // the launch-gap ray can see the crossing.
        let id = spawner.enqueue_bullet(
            999,
            ENEMY,
            Body {
                pos: Vec2::new(-60.0, 500.0),
                vel: Vec2::new(-3000.0, 0.0),
                rot: 0.0,
            },
            5.0,
        );
        reg.sync();
        if let Some(e) = reg.get_mut(id) {
            if let EntityKind::Bullet(b) = &mut e.kind {
                b.launch_pos = Vec2::new(120.0, 500.0);
                b.fresh = true;
            }
        }

        let mut impacts = Vec::new();
        projectile_pass(&mut reg, &ctx(), &mut impacts);
        assert_eq!(impacts.len(), 1);
        // Entered through the nose side.
        assert!((impacts[0].point.x - 28.0).abs() < 0.5);
    }

    #[test]
    fn overlapping_projectile_backsteps_to_boundary() {
        let (mut reg, spawner) = setup();
        spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 500.0));
        let bullet = hostile_bullet(
            &mut reg,
            &spawner,
            999,
            Vec2::new(0.0, 500.0),
            Vec2::new(-600.0, 0.0),
        );

        let mut impacts = Vec::new();
        projectile_pass(&mut reg, &ctx(), &mut impacts);
        assert_eq!(impacts.len(), 1);
        let p = impacts[0].point;
        // Boundary, not deep interior.
        assert!(p.x > 27.0, "point = {p:?}");
        assert!(reg.get(bullet).unwrap().expired);
    }

    #[test]
    fn explosion_impulse_scales_with_distance() {
        let (mut reg, spawner) = setup();
        spawner.enqueue_explosion(None, Vec2::new(0.0, 1000.0), 160.0, 0.6);
        // 0.5R and 2R probes, both pushable.
        let near = spawner.enqueue_decoy(99, PEER, Body {
            pos: Vec2::new(80.0, 1000.0),
            ..Body::default()
        }, 10.0);
        let far = spawner.enqueue_decoy(99, PEER, Body {
            pos: Vec2::new(320.0, 1000.0),
            ..Body::default()
        }, 10.0);
        reg.sync();

        let mut impacts = Vec::new();
        explosion_pass(&mut reg, &ctx(), &mut impacts);

        assert!(reg.get(near).unwrap().body.vel.x > 0.0);
        assert_eq!(reg.get(far).unwrap().body.vel, Vec2::ZERO);
    }

    #[test]
    fn splash_damages_non_owner_planes_only() {
        let (mut reg, spawner) = setup();
        let owner_plane = spawn_plane(&mut reg, &spawner, PEER, Vec2::new(40.0, 1000.0));
        let victim = spawn_plane(&mut reg, &spawner, ENEMY, Vec2::new(-40.0, 1000.0));
        spawner.enqueue_explosion(Some(owner_plane), Vec2::new(0.0, 1000.0), 160.0, 0.6);
        reg.sync();

        let mut impacts = Vec::new();
        explosion_pass(&mut reg, &ctx(), &mut impacts);

        let hp = |id| match &reg.get(id).unwrap().kind {
            EntityKind::Plane(p) => p.hp,
            _ => unreachable!(),
        };
        assert_eq!(hp(owner_plane), 100);
        assert!(hp(victim) < 100);
        assert!(impacts.iter().all(|i| i.kind == ImpactKind::Splash));
    }

    #[test]
    fn missiles_in_blast_detonate() {
        let (mut reg, spawner) = setup();
        spawner.enqueue_explosion(None, Vec2::new(0.0, 1000.0), 160.0, 0.6);
        let missile = spawner.enqueue_missile(
            7,
            PEER,
            Body {
                pos: Vec2::new(50.0, 1000.0),
                ..Body::default()
            },
            5.0,
        );
        reg.sync();

        let mut impacts = Vec::new();
        explosion_pass(&mut reg, &ctx(), &mut impacts);
        assert!(reg.get(missile).unwrap().expired);
    }

    #[test]
    fn planes_crash_on_ground_instead_of_expiring() {
        let (mut reg, spawner) = setup();
        let plane = spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 2.0));
        {
            let e = reg.get_mut(plane).unwrap();
            e.body.vel = Vec2::new(100.0, -300.0);
        }

        let mut log = GroundImpactLog::default();
        ground_and_wrap(&mut reg, &ctx(), &mut log);

        let e = reg.get(plane).unwrap();
        assert!(!e.expired);
        match &e.kind {
            EntityKind::Plane(p) => assert!(p.crashed),
            _ => unreachable!(),
        }
        assert!(log.is_empty());
    }

    #[test]
    fn fast_projectiles_cannot_tunnel_through_ground() {
        let (mut reg, spawner) = setup();
        // 50 units up, falling 6000 units/s: crosses y=0 mid-frame.
        let bullet = spawner.enqueue_bullet(
            9,
            PEER,
            Body {
                pos: Vec2::new(0.0, 50.0),
                vel: Vec2::new(0.0, -6000.0),
                rot: 0.0,
            },
            5.0,
        );
        reg.sync();

        let mut log = GroundImpactLog::default();
        ground_and_wrap(&mut reg, &ctx(), &mut log);
        assert!(reg.get(bullet).unwrap().expired);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn ground_impact_log_is_fifo_bounded() {
        let mut log = GroundImpactLog::new(3);
        for i in 0..5 {
            log.push(GroundImpact {
                pos: Vec2::new(i as f32, 0.0),
                angle: 0.0,
            });
        }
        assert_eq!(log.len(), 3);
        let xs: Vec<f32> = log.iter().map(|g| g.pos.x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn planes_wrap_across_horizontal_boundary() {
        let (mut reg, spawner) = setup();
        let plane = spawn_plane(&mut reg, &spawner, PEER, Vec2::new(0.0, 500.0));
        let c = ctx();
        reg.get_mut(plane).unwrap().body.pos.x = c.bounds.max_x + 10.0;

        let mut log = GroundImpactLog::default();
        ground_and_wrap(&mut reg, &c, &mut log);
        let x = reg.get(plane).unwrap().body.pos.x;
        assert!((x - (c.bounds.min_x + 10.0)).abs() < 1e-3);
    }
}
