//! # Architecture Abstraction Layer
//!
//! The boundary between portable kernel logic and the processor. Everything
//! that depends on register layout, exception numbers or inline assembly
//! lives behind [`Port`]; the task table, the lifecycle and the tick policy
//! only ever see opaque stack-pointer values.
//!
//! ## Handoff protocol
//!
//! The tick handler and the context switch handler never call each other.
//! They coordinate through one [`Handoff`]:
//!
//! ```text
//!   SysTick (highest prio)              PendSV (lowest prio)
//!   ─ pick next task                    ─ save regs, store SP into *curr
//!   ─ handoff.next = &record  ───────►  ─ curr = next
//!   ─ pend_switch()                     ─ load SP from *next, restore regs
//! ```
//!
//! The scheduler decides *who*; the port only moves registers.
//!
//! Currently implements the Cortex-M4 port; extensible to other
//! architectures by adding sibling modules.

use core::sync::atomic::{AtomicPtr, Ordering};

use crate::error::Error;
use crate::task::{TaskEntry, TaskRecord};

pub mod cortex_m4;

#[cfg(test)]
pub(crate) mod host;

/// Initial register contents for a task that has never run.
#[derive(Debug, Clone, Copy)]
pub struct InitialFrame {
    pub entry: TaskEntry,
    pub arg: usize,
    /// Base value for a recognisable register pattern, or `None` to zero
    /// the registers that carry no meaning at first dispatch.
    pub canary: Option<usize>,
}

/// Everything needed to enter the first task directly, without an
/// exception return.
#[derive(Debug, Clone, Copy)]
pub struct Launch {
    /// Top of the first task's stack, past its (unused) initial frame.
    pub stack_top: usize,
    pub entry: TaskEntry,
    pub arg: usize,
}

/// Records shared between the tick handler and the context switch handler.
///
/// `curr` is the task whose registers are live on the CPU; `next` is the
/// task the scheduler picked. Both point into the task table, which never
/// moves once the kernel has started.
#[repr(C)]
pub struct Handoff {
    curr: AtomicPtr<TaskRecord>,
    next: AtomicPtr<TaskRecord>,
}

impl Handoff {
    pub const CURR_OFFSET: usize = core::mem::offset_of!(Handoff, curr);
    pub const NEXT_OFFSET: usize = core::mem::offset_of!(Handoff, next);

    pub const fn new() -> Self {
        Self {
            curr: AtomicPtr::new(core::ptr::null_mut()),
            next: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    pub fn curr(&self) -> *const TaskRecord {
        self.curr.load(Ordering::Relaxed)
    }

    pub fn next(&self) -> *const TaskRecord {
        self.next.load(Ordering::Relaxed)
    }

    pub(crate) fn set_curr(&self, record: &TaskRecord) {
        self.curr.store(record as *const TaskRecord as *mut TaskRecord, Ordering::Relaxed);
    }

    pub(crate) fn set_next(&self, record: &TaskRecord) {
        self.next.store(record as *const TaskRecord as *mut TaskRecord, Ordering::Relaxed);
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}

/// A processor port.
///
/// Besides these items, a port must install the two handlers: a periodic
/// tick handler that calls into the kernel, and a lowest-priority switch
/// handler that transfers registers between `handoff().curr` and
/// `handoff().next`.
pub trait Port {
    /// Peripherals needed to configure interrupts and the tick timer.
    type Hardware;

    /// Words in one saved register frame.
    const FRAME_WORDS: usize;

    /// Write the synthetic frame of a task that has never run.
    ///
    /// `frame` is exactly `FRAME_WORDS` long and sits at the top of the
    /// task's stack.
    fn init_frame(frame: &mut [usize], init: &InitialFrame);

    /// Give the switch handler the lowest and the tick the highest priority.
    fn configure_priorities(hw: &mut Self::Hardware);

    /// Start the periodic tick at `tick_hz`.
    fn arm_tick(hw: &mut Self::Hardware, tick_hz: u32) -> Result<(), Error>;

    /// Slots consumed by the switch handler.
    fn handoff() -> &'static Handoff;

    /// Request a context switch once no higher-priority work is pending.
    fn pend_switch();

    /// Switch to unprivileged Thread mode on the task stack and call the
    /// first task.
    ///
    /// # Safety
    /// Must be called once, with interrupts disabled, and `launch` must
    /// describe a registered task whose stack is not otherwise in use.
    unsafe fn bootstrap_first_task(launch: Launch) -> !;
}
