//! # rros Configuration
//!
//! Compile-time constants governing the kernel. All limits are fixed at
//! compile time — there is no dynamic allocation anywhere in the kernel.

/// Maximum number of tasks the task table can hold. Registration fails
/// permanently once this many tasks exist.
pub const MAX_TASKS: usize = 10;

/// SysTick frequency in Hz. One tick is one scheduling time slice.
pub const TICK_HZ: u32 = 100;

/// System clock frequency in Hz (STM32F4 running from the 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Pre-fill the software-restored registers of every initial frame with a
/// per-task pattern. Purely a debugging aid; enabled by the `debug-canary`
/// cargo feature.
pub const DEBUG_CANARY: bool = cfg!(feature = "debug-canary");

/// Size of one stack cell in bytes.
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// Convert a duration in milliseconds to whole ticks at `tick_hz`.
///
/// Sub-tick remainders are truncated, so a 15 ms delay at 100 Hz is one
/// tick long. Counts that do not fit a `u32` saturate.
pub const fn ms_to_ticks(ms: u32, tick_hz: u32) -> u32 {
    let ticks = ms as u64 * tick_hz as u64 / 1000;
    if ticks > u32::MAX as u64 {
        u32::MAX
    } else {
        ticks as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_ticks_rounds_down() {
        assert_eq!(ms_to_ticks(0, 100), 0);
        assert_eq!(ms_to_ticks(9, 100), 0);
        assert_eq!(ms_to_ticks(10, 100), 1);
        assert_eq!(ms_to_ticks(15, 100), 1);
        assert_eq!(ms_to_ticks(1000, 100), 100);
    }

    #[test]
    fn test_ms_to_ticks_fast_tick() {
        // Faster than 1 kHz must not divide by zero
        assert_eq!(ms_to_ticks(3, 2000), 6);
        assert_eq!(ms_to_ticks(u32::MAX, 1000), u32::MAX);
    }

    #[test]
    fn test_ms_to_ticks_saturates() {
        assert_eq!(ms_to_ticks(u32::MAX, 2000), u32::MAX);
        assert_eq!(ms_to_ticks(u32::MAX, u32::MAX), u32::MAX);
        assert_eq!(ms_to_ticks(3_000_000, 2000), 6_000_000);
    }
}
