//! # Clock service
//!
//! A monotonic tick counter plus deadline arithmetic, shared by the
//! scheduler (time-elapsed readiness, §4.3) and the coroutine runtime's
//! delay/timeout primitives. The kernel never reads a hardware timer
//! itself — it is handed a tick-provider function once, at
//! [`crate::kernel::init_scheduler`], matching the original's
//! `qClock_SetTickProvider`.

/// A function that returns the current tick count. Installed once at
/// kernel init; typically backed by a hardware timer ISR counter on the
/// target, or a software counter in host-side tests.
pub type TickProviderFn = fn() -> u32;

/// Wraps the application-supplied tick provider and exposes the deadline
/// arithmetic the scheduler needs.
#[derive(Clone, Copy)]
pub struct Clock {
    provider: Option<TickProviderFn>,
}

impl Clock {
    /// An unconfigured clock. `tick_now` returns 0 until `set_tick_provider`
    /// is called.
    pub const fn new() -> Self {
        Self { provider: None }
    }

    /// Install the tick provider. Must be called during kernel
    /// initialization, before the scheduler loop starts.
    pub fn set_tick_provider(&mut self, provider: TickProviderFn) {
        self.provider = Some(provider);
    }

    /// The current tick count, or 0 if no provider has been installed.
    pub fn tick_now(&self) -> u32 {
        match self.provider {
            Some(f) => f(),
            None => 0,
        }
    }

    /// True once `now - start >= interval`, using wrapping arithmetic so a
    /// tick-counter rollover doesn't produce a spuriously huge elapsed
    /// value.
    pub fn deadline_reached(&self, start: u32, interval: u32) -> bool {
        self.tick_now().wrapping_sub(start) >= interval
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static TICKS: AtomicU32 = AtomicU32::new(0);
    fn fake_tick() -> u32 {
        TICKS.load(Ordering::Relaxed)
    }

    #[test]
    fn unconfigured_clock_reads_zero() {
        let clock = Clock::new();
        assert_eq!(clock.tick_now(), 0);
        assert!(clock.deadline_reached(0, 0));
    }

    #[test]
    fn deadline_reached_respects_interval() {
        TICKS.store(0, Ordering::Relaxed);
        let mut clock = Clock::new();
        clock.set_tick_provider(fake_tick);
        assert!(!clock.deadline_reached(0, 10));
        TICKS.store(9, Ordering::Relaxed);
        assert!(!clock.deadline_reached(0, 10));
        TICKS.store(10, Ordering::Relaxed);
        assert!(clock.deadline_reached(0, 10));
    }

    #[test]
    fn deadline_reached_survives_wraparound() {
        TICKS.store(u32::MAX - 2, Ordering::Relaxed);
        let mut clock = Clock::new();
        clock.set_tick_provider(fake_tick);
        let start = clock.tick_now();
        TICKS.store(2, Ordering::Relaxed); // wrapped past u32::MAX
        assert!(clock.deadline_reached(start, 4));
    }
}
