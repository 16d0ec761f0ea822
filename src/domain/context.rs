// Explicit simulation context threaded into every component instead of
// global mutable state, so independent simulations can coexist in one process.

use crate::domain::tuning::{ExplosionTuning, PlaneTuning, ProjectileTuning};
use std::time::Instant;

/// Which side of the wire this simulation runs on.
///
/// The server is authoritative and keeps historical snapshots for lag
/// compensation; clients only smooth remote state through interpolation
/// buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetRole {
    Server,
    Client,
}

/// Horizontal playfield limits and the ground plane at y = 0.
#[derive(Debug, Clone, Copy)]
pub struct WorldBounds {
    pub min_x: f32,
    pub max_x: f32,
    /// Soft ceiling; entities above it are still simulated but planes
    /// lose lift in gameplay code (external to this core).
    pub ceiling: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min_x: -4096.0,
            max_x: 4096.0,
            ceiling: 2048.0,
        }
    }
}

/// Gameplay tuning bundle, grouped so the whole set travels together.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tuning {
    pub plane: PlaneTuning,
    pub projectile: ProjectileTuning,
    pub explosion: ExplosionTuning,
}

/// Per-frame simulation context passed by reference into update and
/// collision calls.
#[derive(Debug, Clone)]
pub struct SimContext {
    /// Frame delta time in seconds.
    pub dt: f32,
    /// Simulation clock in milliseconds since `started`.
    pub now_ms: f64,
    pub role: NetRole,
    pub bounds: WorldBounds,
    pub tuning: Tuning,
    /// Constant added to a projectile's accumulated lag when rewinding
    /// targets, covering the client's interpolation delay.
    pub interp_ms: f64,
    /// Worker width for the data-parallel update phase.
    pub workers: usize,
    started: Instant,
}

impl SimContext {
    pub fn new(role: NetRole) -> Self {
        Self {
            dt: 0.0,
            now_ms: 0.0,
            role,
            bounds: WorldBounds::default(),
            tuning: Tuning::default(),
            interp_ms: 50.0,
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            started: Instant::now(),
        }
    }

    /// Advance the frame clock. Called once at the top of each tick.
    pub fn begin_frame(&mut self, dt: f32) {
        self.dt = dt;
        self.now_ms = self.started.elapsed().as_secs_f64() * 1000.0;
    }

    /// Test hook: pin the clock to an explicit timestamp.
    pub fn set_now_ms(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
    }
}
