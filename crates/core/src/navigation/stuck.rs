//! Sliding-window displacement tracking and recovery maneuvers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::*;

#[derive(Clone, Debug)]
pub(super) struct StuckTracker {
    window: Duration,
    patience: Duration,
    threshold: f32,
    samples: VecDeque<(Instant, WorldPos)>,
    stalled_since: Option<Instant>,
}

impl StuckTracker {
    pub(super) fn new(config: &NavigationConfig) -> Self {
        Self {
            window: config.stuck_window(),
            patience: config.stuck_patience(),
            threshold: config.stuck_threshold,
            samples: VecDeque::new(),
            stalled_since: None,
        }
    }

    pub(super) fn reset(&mut self) {
        self.samples.clear();
        self.stalled_since = None;
    }

    pub(super) fn last_sample_at(&self) -> Option<Instant> {
        self.samples.back().map(|(at, _)| *at)
    }

    /// Records a position sample and reports whether the agent has been stalled
    /// for at least the patience interval.
    pub(super) fn record(&mut self, now: Instant, pos: WorldPos) -> bool {
        self.samples.push_back((now, pos));
        let window_start = now.checked_sub(self.window);
        // Keep exactly one sample at or before the window start.
        while self.samples.len() > 1
            && window_start.is_some_and(|start| self.samples[1].0 <= start)
        {
            self.samples.pop_front();
        }

        let Some(&(oldest_at, oldest_pos)) = self.samples.front() else {
            return false;
        };
        let covers_window = window_start.is_some_and(|start| oldest_at <= start);
        if !covers_window {
            return self.is_stuck(now);
        }
        if oldest_pos.distance_2d(pos) < self.threshold {
            self.stalled_since.get_or_insert(oldest_at);
        } else {
            self.stalled_since = None;
        }
        self.is_stuck(now)
    }

    pub(super) fn is_stuck(&self, now: Instant) -> bool {
        self.stalled_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.patience)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Maneuver {
    SidestepLeft,
    SidestepRight,
    Repath,
}

impl Maneuver {
    /// Maneuver for the given 1-based attempt; cycles once attempts exceed three.
    pub(super) fn for_attempt(attempt: u32) -> Self {
        match attempt % 3 {
            1 => Maneuver::SidestepLeft,
            2 => Maneuver::SidestepRight,
            _ => Maneuver::Repath,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct Recovery {
    pub(super) maneuver: Maneuver,
    pub(super) target: WorldPos,
    pub(super) until: Instant,
    pub(super) resume: NavState,
}

/// Point `step` units to the left or right of the heading from `pos` to `toward`.
pub(super) fn sidestep_target(pos: WorldPos, toward: WorldPos, step: f32, left: bool) -> WorldPos {
    let dx = toward.x - pos.x;
    let dy = toward.y - pos.y;
    let len = dx.hypot(dy);
    if len <= f32::EPSILON {
        return if left { pos.offset(0.0, step) } else { pos.offset(0.0, -step) };
    }
    let (px, py) = if left { (-dy / len, dx / len) } else { (dy / len, -dx / len) };
    pos.offset(px * step, py * step)
}
