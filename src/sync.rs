//! # Synchronization
//!
//! Interrupt-safe critical sections for Cortex-M.
//!
//! The kernel itself needs exactly one: the registration path, which runs
//! in Thread mode and must not interleave with an interrupt that might also
//! touch the kernel instance. The context switch handler masks interrupts
//! on its own. Tasks sharing state with an interrupt handler must bring
//! their own critical sections; rros provides no mutex.

use cortex_m::interrupt;

/// Execute a closure within a critical section (interrupts disabled).
///
/// Interrupts are disabled on entry and restored to their previous state
/// on exit.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|_cs| {
///     // Access shared state safely
/// });
/// ```
///
/// Only effective in privileged mode. Tasks run unprivileged, where
/// `cpsid` is silently ignored.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&interrupt::CriticalSection) -> R,
{
    interrupt::free(f)
}
