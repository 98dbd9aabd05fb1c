//! Host stand-in for a processor port, used by the kernel unit tests.
//!
//! Frames use the Cortex-M4 layout so the tests see the real slot order.
//! Hardware configuration is recorded instead of performed, and each test
//! thread gets its own handoff slots and pend counter.

use std::cell::Cell;

use crate::arch::cortex_m4::{task_finished, SavedFrame, FRAME_WORDS};
use crate::arch::{Handoff, InitialFrame, Launch, Port};
use crate::error::Error;

#[derive(Debug, Default)]
pub struct HostHardware {
    pub priorities_configured: bool,
    pub tick_hz: Option<u32>,
    /// Refuse to arm the tick, like an unreachable SysTick reload.
    pub reject_tick: bool,
}

pub struct HostPort;

thread_local! {
    static HANDOFF: &'static Handoff = Box::leak(Box::new(Handoff::new()));
    static PENDED: Cell<usize> = const { Cell::new(0) };
}

impl HostPort {
    /// Number of switch requests raised on this thread.
    pub fn pended() -> usize {
        PENDED.with(Cell::get)
    }
}

impl Port for HostPort {
    type Hardware = HostHardware;

    const FRAME_WORDS: usize = FRAME_WORDS;

    fn init_frame(frame: &mut [usize], init: &InitialFrame) {
        SavedFrame::initial(init, task_finished as usize).write_to(frame);
    }

    fn configure_priorities(hw: &mut HostHardware) {
        hw.priorities_configured = true;
    }

    fn arm_tick(hw: &mut HostHardware, tick_hz: u32) -> Result<(), Error> {
        if hw.reject_tick {
            return Err(Error::TickRate { hz: tick_hz });
        }
        hw.tick_hz = Some(tick_hz);
        Ok(())
    }

    fn handoff() -> &'static Handoff {
        HANDOFF.with(|h| *h)
    }

    fn pend_switch() {
        PENDED.with(|p| p.set(p.get() + 1));
    }

    unsafe fn bootstrap_first_task(_launch: Launch) -> ! {
        panic!("the host port cannot enter a task");
    }
}
