//! # Soft timer
//!
//! A one-shot/periodic interval timer layered on top of [`crate::clock`].
//! Task bodies use it the way `original_source` task callbacks use
//! `qSTimer_t` — arm it once with `set`, poll `expired` on each dispatch.
//! It holds no callback of its own; it is pure state, matching the
//! original's plain-old-data `qSTimer_t` struct.

use crate::clock::Clock;

/// Interval timer state. `Default`-constructible to all-zero, matching the
/// original's static initialization idiom.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftTimer {
    start: u32,
    interval: u32,
    armed: bool,
}

impl SoftTimer {
    /// A disarmed timer.
    pub const fn new() -> Self {
        Self {
            start: 0,
            interval: 0,
            armed: false,
        }
    }

    /// Arm the timer for `interval` ticks, starting now.
    pub fn set(&mut self, clock: &Clock, interval: u32) {
        self.start = clock.tick_now();
        self.interval = interval;
        self.armed = true;
    }

    /// Disarm the timer. `expired` returns `false` unconditionally until
    /// `set` is called again.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// True once the armed interval has elapsed. An unarmed timer never
    /// reports expiry.
    pub fn expired(&self, clock: &Clock) -> bool {
        self.armed && clock.deadline_reached(self.start, self.interval)
    }

    /// Re-arm with the same interval, anchored to "now" rather than the
    /// previous deadline — matches the original's `qSTimer_Reload` which
    /// restarts the full interval rather than accumulating drift.
    pub fn reload(&mut self, clock: &Clock) {
        self.start = clock.tick_now();
    }

    /// Ticks remaining until expiry, saturating at 0 once past the deadline.
    pub fn remaining(&self, clock: &Clock) -> u32 {
        let elapsed = clock.tick_now().wrapping_sub(self.start);
        self.interval.saturating_sub(elapsed)
    }
}
