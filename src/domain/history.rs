// Server-side rewind ring: past authoritative poses per plane, used to test
// hits against the world the shooter was actually seeing.

use glam::Vec2;
use std::collections::VecDeque;

/// Hard cap on retained snapshots; age-based pruning usually trims first.
const MAX_SNAPSHOTS: usize = 400;

/// Snapshots older than this are never needed by lag compensation.
const MAX_AGE_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy)]
pub struct PoseSnapshot {
    pub t_ms: f64,
    pub pos: Vec2,
    pub rot: f32,
}

/// Time-indexed ring of past poses, monotonically increasing in timestamp.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<PoseSnapshot>,
    max_age_ms: f64,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(MAX_AGE_MS)
    }
}

impl HistoryBuffer {
    pub fn new(max_age_ms: f64) -> Self {
        Self {
            entries: VecDeque::with_capacity(64),
            max_age_ms,
        }
    }

    /// Append a pose if newer than the last entry, then prune entries older
    /// than the retention window relative to `t_ms`.
    pub fn enqueue(&mut self, pos: Vec2, rot: f32, t_ms: f64) {
        if let Some(last) = self.entries.back() {
            if t_ms <= last.t_ms {
                return;
            }
        }
        self.entries.push_back(PoseSnapshot { t_ms, pos, rot });

        let horizon = t_ms - self.max_age_ms;
        while let Some(front) = self.entries.front() {
            if front.t_ms < horizon || self.entries.len() > MAX_SNAPSHOTS {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Linearly interpolated pose at `t_ms`, or `None` when no pair of
    /// snapshots brackets the timestamp — the caller falls back to the live
    /// pose ("compensation unavailable").
    pub fn get_historical_state(&self, t_ms: f64) -> Option<(Vec2, f32)> {
        let first = self.entries.front()?;
        let last = self.entries.back()?;
        if t_ms < first.t_ms || t_ms > last.t_ms {
            return None;
        }

        let mut prev = first;
        for entry in self.entries.iter().skip(1) {
            if entry.t_ms >= t_ms {
                let span = entry.t_ms - prev.t_ms;
                if span <= f64::EPSILON {
                    return Some((entry.pos, entry.rot));
                }
                let t = ((t_ms - prev.t_ms) / span) as f32;
                let pos = prev.pos.lerp(entry.pos, t);
                let rot = lerp_angle(prev.rot, entry.rot, t);
                return Some((pos, rot));
            }
            prev = entry;
        }
        Some((last.pos, last.rot))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shortest-arc angle interpolation.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let tau = std::f32::consts::TAU;
    let mut delta = (to - from) % tau;
    if delta > std::f32::consts::PI {
        delta -= tau;
    } else if delta < -std::f32::consts::PI {
        delta += tau;
    }
    from + delta * t
}
