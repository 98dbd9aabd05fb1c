//! # System Time
//!
//! The global tick counter and the busy-wait delay built on it.
//!
//! The counter is 32 bits wide and wraps. At 100 Hz that takes about 497
//! days; elapsed time is always computed with wrapping subtraction, so a
//! wrap in the middle of a delay is harmless.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::{ms_to_ticks, TICK_HZ};

/// Monotonic, wrapping tick counter. Written only by the tick handler.
pub struct TickCounter(AtomicU32);

impl TickCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Current tick count.
    #[inline]
    pub fn now(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Count one tick and return the new value.
    #[inline]
    pub fn advance(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Spin until at least `ticks` ticks have elapsed.
    ///
    /// The caller keeps burning its own time slices while it waits; this is
    /// not a blocking primitive and no low-power state is entered.
    pub fn delay_ticks(&self, ticks: u32) {
        let start = self.now();
        while self.now().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// The global tick counter advanced by SysTick.
pub static TICKS: TickCounter = TickCounter::new();

/// Number of ticks since the scheduler started.
#[inline]
pub fn get_ticks() -> u32 {
    TICKS.now()
}

/// Busy-wait for `ms` milliseconds, truncated to whole ticks.
///
/// `delay(0)` and any delay shorter than one tick return immediately.
pub fn delay(ms: u32) {
    TICKS.delay_ticks(ms_to_ticks(ms, TICK_HZ));
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_advance_counts_by_one() {
        let ticks = TickCounter::new();
        assert_eq!(ticks.now(), 0);
        assert_eq!(ticks.advance(), 1);
        assert_eq!(ticks.advance(), 2);
        assert_eq!(ticks.now(), 2);
    }

    #[test]
    fn test_advance_wraps() {
        let ticks = TickCounter(AtomicU32::new(u32::MAX));
        assert_eq!(ticks.advance(), 0);
        assert_eq!(ticks.now(), 0);
    }

    #[test]
    fn test_delay_zero_returns_immediately() {
        let ticks = TickCounter::new();
        ticks.delay_ticks(0);
        // Nothing ever advances the global counter in host tests
        delay(0);
        delay(9);
    }

    fn ticker(ticks: &TickCounter, done: &AtomicBool) {
        while !done.load(Ordering::Relaxed) {
            ticks.advance();
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_delay_waits_for_elapsed_ticks() {
        let ticks = TickCounter::new();
        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| ticker(&ticks, &done));
            let start = ticks.now();
            ticks.delay_ticks(50);
            assert!(ticks.now().wrapping_sub(start) >= 50);
            done.store(true, Ordering::Relaxed);
        });
    }

    #[test]
    fn test_delay_across_wrap() {
        let ticks = TickCounter(AtomicU32::new(u32::MAX - 5));
        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| ticker(&ticks, &done));
            let start = ticks.now();
            ticks.delay_ticks(20);
            assert!(ticks.now().wrapping_sub(start) >= 20);
            done.store(true, Ordering::Relaxed);
        });
    }
}
