// Client-side delayed-playback buffer: renders between two known-good
// authoritative samples instead of the newest raw packet, trading a constant
// visual delay for smoothness under jitter and loss.

use crate::domain::history::lerp_angle;
use glam::Vec2;
use std::collections::VecDeque;

/// Clock-offset samples kept for smoothing.
const OFFSET_WINDOW: usize = 16;

#[derive(Debug, Clone, Copy)]
struct InterpSample {
    playback_ms: f64,
    pos: Vec2,
    rot: f32,
}

/// Per-entity interpolation queue with a smoothed sender-clock offset.
#[derive(Debug)]
pub struct InterpBuffer {
    samples: VecDeque<InterpSample>,
    offsets: VecDeque<f64>,
    tick_ms: f64,
    /// Pose returned when the buffer has drained; the last sample snapped to
    /// during catch-up.
    rest: (Vec2, f32),
}

impl InterpBuffer {
    pub fn new(tick_ms: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(8),
            offsets: VecDeque::with_capacity(OFFSET_WINDOW),
            tick_ms,
            rest: (Vec2::ZERO, 0.0),
        }
    }

    /// Schedule an authoritative sample for playback at
    /// `sent_ms + rounded_offset + one_tick`. The extra tick of delay makes it
    /// likely a bracketing future sample exists by playback time.
    pub fn enqueue(&mut self, pos: Vec2, rot: f32, sent_ms: f64, now_ms: f64) {
        self.offsets.push_back(now_ms - sent_ms);
        if self.offsets.len() > OFFSET_WINDOW {
            self.offsets.pop_front();
        }
        let mean = self.offsets.iter().sum::<f64>() / self.offsets.len() as f64;
        // Half-tick rounding keeps jitter from constantly resliding playback.
        let half = self.tick_ms / 2.0;
        let rounded = (mean / half).round() * half;

        let playback_ms = sent_ms + rounded + self.tick_ms;
        if let Some(last) = self.samples.back() {
            // Late or duplicated packet; superseded samples are discarded.
            if playback_ms <= last.playback_ms {
                return;
            }
        }
        self.samples.push_back(InterpSample {
            playback_ms,
            pos,
            rot,
        });
    }

    /// Pose at `now_ms`. Empty buffer: the resting fallback. Past the last
    /// sample: snap to it and clear (catch-up). Otherwise: linear
    /// interpolation between the bracketing pair.
    pub fn interpolate(&mut self, now_ms: f64) -> (Vec2, f32) {
        let Some(last) = self.samples.back().copied() else {
            return self.rest;
        };
        if now_ms >= last.playback_ms {
            self.rest = (last.pos, last.rot);
            self.samples.clear();
            return self.rest;
        }

        let mut prev: Option<InterpSample> = None;
        for sample in &self.samples {
            if sample.playback_ms >= now_ms {
                let Some(p) = prev else {
                    // Playback hasn't reached the first sample yet.
                    return (sample.pos, sample.rot);
                };
                let span = sample.playback_ms - p.playback_ms;
                if span <= f64::EPSILON {
                    return (sample.pos, sample.rot);
                }
                let t = ((now_ms - p.playback_ms) / span) as f32;
                return (p.pos.lerp(sample.pos, t), lerp_angle(p.rot, sample.rot, t));
            }
            prev = Some(*sample);
        }
        // Unreachable: `last.playback_ms > now_ms` guarantees a bracket above.
        (last.pos, last.rot)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_returns_resting_fallback() {
        let mut buf = InterpBuffer::new(50.0);
        assert_eq!(buf.interpolate(1000.0), (Vec2::ZERO, 0.0));
    }

    #[test]
    fn interpolates_between_bracketing_samples() {
        let mut buf = InterpBuffer::new(50.0);
        // Zero transit time keeps the offset at 0, so playback = sent + tick.
        buf.enqueue(Vec2::new(0.0, 0.0), 0.0, 100.0, 100.0);
        buf.enqueue(Vec2::new(10.0, 0.0), 0.0, 200.0, 200.0);

        // Playback times are 150 and 250; sample midway.
        let (pos, _) = buf.interpolate(200.0);
        assert!((pos.x - 5.0).abs() < 1e-3);
    }

    #[test]
    fn catch_up_snaps_to_last_and_sticks() {
        let mut buf = InterpBuffer::new(50.0);
        buf.enqueue(Vec2::new(3.0, 4.0), 1.0, 100.0, 100.0);

        // Past the scheduled playback time: snap, clear, and keep returning
        // exactly the last sample with no extrapolation beyond it.
        let snapped = buf.interpolate(1000.0);
        assert_eq!(snapped.0, Vec2::new(3.0, 4.0));
        assert!(buf.is_empty());
        assert_eq!(buf.interpolate(2000.0), snapped);
        assert_eq!(buf.interpolate(3000.0), snapped);
    }

    #[test]
    fn stale_samples_are_dropped() {
        let mut buf = InterpBuffer::new(50.0);
        buf.enqueue(Vec2::ZERO, 0.0, 200.0, 200.0);
        buf.enqueue(Vec2::ONE, 0.0, 100.0, 200.0);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn offset_rounds_to_half_tick() {
        let mut buf = InterpBuffer::new(50.0);
        // Transit 32ms rounds to 25ms at half-tick granularity.
        buf.enqueue(Vec2::ZERO, 0.0, 100.0, 132.0);
        // playback = 100 + 25 + 50 = 175; just before it we still bracket.
        let (pos, _) = buf.interpolate(174.0);
        assert_eq!(pos, Vec2::ZERO);
        // At 175 the buffer catches up and clears.
        buf.interpolate(175.0);
        assert!(buf.is_empty());
    }
}
