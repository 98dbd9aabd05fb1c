//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//! Implements context switching via PendSV, SysTick timer configuration,
//! the first-task bootstrap and the fatal task-exit trap.
//!
//! ## Context Switch Mechanism
//!
//! The Cortex-M4 uses a split-stack model:
//! - **MSP** (Main Stack Pointer): Used by the kernel and interrupt handlers
//! - **PSP** (Process Stack Pointer): Used by tasks in Thread mode
//!
//! On exception entry, the hardware automatically stacks R0–R3, R12, LR, PC,
//! and xPSR onto the process stack. The PendSV handler manually saves and
//! restores R4–R11, which completes the full context save/restore.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: 0x00 (highest) — the tick is never delayed by a switch
//! - SVCall: 0x00 — the task-exit trap cannot be preempted by the tick
//! - PendSV: 0xFF (lowest) — runs only when no other ISR is active
//!
//! Tasks must not use the FPU: the switch handler always returns with the
//! basic (non-FP) exception frame. Build for `thumbv7em-none-eabi`.

#[cfg(target_arch = "arm")]
use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::arch::InitialFrame;
#[cfg(target_arch = "arm")]
use crate::arch::{Handoff, Launch, Port};
use crate::config::SYSTEM_CLOCK_HZ;
use crate::error::Error;
#[cfg(target_arch = "arm")]
use crate::task::TaskRecord;

/// xPSR with only the Thumb bit set.
pub const XPSR_THUMB: usize = 0x0100_0000;

/// EXC_RETURN: return to Thread mode, use PSP, basic frame.
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// CONTROL.nPRIV: Thread mode runs unprivileged.
pub const CONTROL_NPRIV: u32 = 0b01;
/// CONTROL.SPSEL: Thread mode uses PSP.
pub const CONTROL_SPSEL: u32 = 0b10;

/// CONTROL while entering the first task: PSP selected, still privileged.
pub const CONTROL_PRIVILEGED_PSP: u32 = CONTROL_SPSEL;
/// CONTROL for tasks: nPRIV = 1 (unprivileged), SPSEL = 1 (PSP).
pub const CONTROL_UNPRIVILEGED_PSP: u32 = CONTROL_SPSEL | CONTROL_NPRIV;

pub const PENDSV_PRIORITY: u8 = 0xFF;
pub const SYSTICK_PRIORITY: u8 = 0x00;
pub const SVCALL_PRIORITY: u8 = 0x00;

/// The SysTick counter is 24 bits wide.
const SYST_RELOAD_MAX: u32 = 0x00FF_FFFF;

// ---------------------------------------------------------------------------
// Saved register frame
// ---------------------------------------------------------------------------

/// Registers saved and restored by the PendSV handler itself
/// (`stmdb`/`ldmia {r4-r11}`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftwareFrame {
    pub r4: usize,
    pub r5: usize,
    pub r6: usize,
    pub r7: usize,
    pub r8: usize,
    pub r9: usize,
    pub r10: usize,
    pub r11: usize,
}

/// Registers stacked by the NVIC on exception entry and restored by the
/// exception return, in the order the architecture defines.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareFrame {
    pub r0: usize,
    pub r1: usize,
    pub r2: usize,
    pub r3: usize,
    pub r12: usize,
    pub lr: usize,
    pub pc: usize,
    pub xpsr: usize,
}

/// A suspended task's context, as it sits on the task's stack.
///
/// ```text
///   high address
///   +------+
///   | xPSR |  ┐
///   |  PC  |  │
///   |  LR  |  │ HardwareFrame: restored by exception return
///   |  R12 |  │
///   | R3-R0|  ┘
///   | R11  |  ┐
///   |  ..  |  │ SoftwareFrame: restored by PendSV
///   |  R4  |  ┘ <- saved stack pointer
///   +------+
///   low address
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavedFrame {
    pub software: SoftwareFrame,
    pub hardware: HardwareFrame,
}

/// Words in a [`SavedFrame`].
pub const FRAME_WORDS: usize = core::mem::size_of::<SavedFrame>() / core::mem::size_of::<usize>();

const _: () = assert!(FRAME_WORDS == 16);
const _: () = assert!(
    core::mem::offset_of!(SavedFrame, hardware) == 8 * core::mem::size_of::<usize>()
);

impl SavedFrame {
    /// The frame a task "returns" into on its first dispatch.
    ///
    /// `exit` becomes the link register, so a returning entry function
    /// lands there.
    pub fn initial(init: &InitialFrame, exit: usize) -> Self {
        let base = init.canary.unwrap_or(0);
        let pattern = |n: usize| if init.canary.is_some() { base + n } else { 0 };

        Self {
            software: SoftwareFrame {
                r4: pattern(4),
                r5: pattern(5),
                r6: pattern(6),
                r7: pattern(7),
                r8: pattern(8),
                r9: pattern(9),
                r10: pattern(10),
                r11: pattern(11),
            },
            hardware: HardwareFrame {
                r0: init.arg,
                r1: pattern(1),
                r2: pattern(2),
                r3: pattern(3),
                r12: pattern(12),
                lr: exit,
                // Exception return with PC<0> set is UNPREDICTABLE
                pc: init.entry as usize & !0x01,
                xpsr: XPSR_THUMB,
            },
        }
    }

    /// Store `self` into the first `FRAME_WORDS` words of `frame`.
    pub fn write_to(&self, frame: &mut [usize]) {
        let frame = &mut frame[..FRAME_WORDS];
        // SAFETY: `frame` spans exactly `size_of::<SavedFrame>()` bytes and
        // `SavedFrame` is a repr(C) sequence of usize, so size and alignment
        // match.
        unsafe { frame.as_mut_ptr().cast::<SavedFrame>().write(*self) }
    }
}

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// SysTick reload value producing `tick_hz` from a `clock_hz` core clock,
/// or `None` if the counter cannot produce that rate.
pub fn systick_reload(clock_hz: u32, tick_hz: u32) -> Option<u32> {
    if tick_hz == 0 {
        return None;
    }
    let reload = (clock_hz / tick_hz).checked_sub(1)?;
    if reload == 0 || reload > SYST_RELOAD_MAX {
        return None;
    }
    Some(reload)
}

/// Configure the SysTick timer for the scheduler tick.
///
/// Sets up SysTick to fire at `tick_hz` using the processor clock. Each
/// tick runs the `SysTick` handler below.
pub fn configure_systick(syst: &mut SYST, tick_hz: u32) -> Result<(), Error> {
    let reload = systick_reload(SYSTEM_CLOCK_HZ, tick_hz).ok_or(Error::TickRate { hz: tick_hz })?;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
    Ok(())
}

/// Apply the fixed priority order: tick > everything else > switch.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: changing system handler priorities before the scheduler runs
    // cannot break any priority-based critical section.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, PENDSV_PRIORITY);
        scb.set_priority(SystemHandler::SysTick, SYSTICK_PRIORITY);
        scb.set_priority(SystemHandler::SVCall, SVCALL_PRIORITY);
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Instructions entering the first task.
///
/// `cpsie` is ignored in unprivileged Thread mode, so PRIMASK is cleared
/// between switching to PSP and dropping privilege. A tick taken in that
/// window already sees the task on PSP.
#[cfg(any(target_arch = "arm", test))]
macro_rules! bootstrap_asm {
    () => {
        "mov lr, r3
        msr psp, r1
        movs r2, #{privileged}
        msr control, r2
        isb
        cpsie i
        movs r2, #{unprivileged}
        msr control, r2
        isb
        bx r12"
    };
}

/// The Cortex-M4 port.
pub struct CortexM4;

/// Switch slots read by `PendSV`.
#[cfg(target_arch = "arm")]
static HANDOFF: Handoff = Handoff::new();

#[cfg(target_arch = "arm")]
impl Port for CortexM4 {
    type Hardware = cortex_m::Peripherals;

    const FRAME_WORDS: usize = FRAME_WORDS;

    fn init_frame(frame: &mut [usize], init: &InitialFrame) {
        SavedFrame::initial(init, task_finished as usize).write_to(frame);
    }

    fn configure_priorities(hw: &mut Self::Hardware) {
        set_interrupt_priorities(&mut hw.SCB);
    }

    fn arm_tick(hw: &mut Self::Hardware, tick_hz: u32) -> Result<(), Error> {
        configure_systick(&mut hw.SYST, tick_hz)
    }

    fn handoff() -> &'static Handoff {
        &HANDOFF
    }

    #[inline]
    fn pend_switch() {
        SCB::set_pendsv();
    }

    unsafe fn bootstrap_first_task(launch: Launch) -> ! {
        // The first entry is a plain call, not an exception return: the
        // task's initial frame is skipped and will be overwritten by the
        // first PendSV that switches away from it.
        asm!(
            bootstrap_asm!(),
            privileged = const CONTROL_PRIVILEGED_PSP,
            unprivileged = const CONTROL_UNPRIVILEGED_PSP,
            in("r0") launch.arg,
            in("r1") launch.stack_top,
            in("r3") task_finished as usize,
            in("r12") launch.entry as usize,
            options(noreturn),
        );
    }
}

// ---------------------------------------------------------------------------
// Task exit trap
// ---------------------------------------------------------------------------

/// Link register of every task's initial frame.
///
/// Tasks never return. If one does, it traps into `SVCall`, which shares
/// the highest priority with SysTick and spins there with interrupts off:
/// the whole system halts.
pub extern "C" fn task_finished() -> ! {
    trap();
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(target_arch = "arm")]
fn trap() {
    // SAFETY: `svc` only enters the SVCall handler below.
    unsafe { asm!("svc #0", options(nomem, nostack)) }
}

#[cfg(not(target_arch = "arm"))]
fn trap() {}

/// SVCall exception handler — fatal halt after a task returned.
#[cfg(target_arch = "arm")]
#[no_mangle]
pub unsafe extern "C" fn SVCall() -> ! {
    cortex_m::interrupt::disable();
    loop {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler — performs the actual context switch.
///
/// ## Sequence
/// 1. Disable interrupts
/// 2. Save R4–R11 below the hardware frame on the current task's stack (PSP)
/// 3. Store the resulting PSP into `handoff.curr`'s record
/// 4. `handoff.curr = handoff.next`
/// 5. Load the next task's saved PSP and restore R4–R11 from it
/// 6. Re-enable interrupts and return from exception with
///    EXC_RETURN = 0xFFFFFFFD (hardware restores R0–R3, R12, LR, PC, xPSR)
///
/// # Safety
/// This is a naked function called directly by the NVIC. It must only
/// touch R0–R3 and R12, which the hardware already stacked.
#[cfg(target_arch = "arm")]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",

        // --- Save current context ---
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "ldr r2, ={handoff}",
        "ldr r1, [r2, #{curr}]",
        "str r0, [r1, #{sp}]",

        // --- Next becomes current ---
        "ldr r1, [r2, #{next}]",
        "str r1, [r2, #{curr}]",

        // --- Restore new context ---
        "ldr r0, [r1, #{sp}]",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",

        "ldr r0, ={exc_return}",
        "cpsie i",
        "bx r0",

        handoff = sym HANDOFF,
        curr = const Handoff::CURR_OFFSET,
        next = const Handoff::NEXT_OFFSET,
        sp = const TaskRecord::STACK_POINTER_OFFSET,
        exc_return = const EXC_RETURN_THREAD_PSP,
    );
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler — scheduler tick entry point.
///
/// Called at `TICK_HZ`. Makes the scheduling decision and pends PendSV;
/// it never touches task registers itself.
#[cfg(target_arch = "arm")]
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    crate::kernel::tick();
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn entry(_arg: usize) {}

    fn words(frame: &SavedFrame) -> [usize; FRAME_WORDS] {
        let mut out = [0usize; FRAME_WORDS];
        frame.write_to(&mut out);
        out
    }

    #[test]
    fn test_frame_slot_order() {
        let init = InitialFrame { entry, arg: 0xA5A5, canary: None };
        let frame = SavedFrame::initial(&init, 0x0800_1235);
        let w = words(&frame);

        // R4..R11 first, then R0, R1, R2, R3, R12, LR, PC, xPSR
        assert_eq!(w[..8], [0; 8]);
        assert_eq!(w[8], 0xA5A5);
        assert_eq!(w[13], 0x0800_1235);
        assert_eq!(w[14], entry as usize & !1);
        assert_eq!(w[15], XPSR_THUMB);
    }

    #[test]
    fn test_pc_thumb_bit_cleared() {
        let init = InitialFrame { entry, arg: 0, canary: None };
        let frame = SavedFrame::initial(&init, 0);
        assert_eq!(frame.hardware.pc & 1, 0);
    }

    #[test]
    fn test_canary_pattern() {
        let init = InitialFrame { entry, arg: 7, canary: Some(2000) };
        let frame = SavedFrame::initial(&init, 0);

        assert_eq!(frame.hardware.r0, 7);
        assert_eq!(frame.hardware.r1, 2001);
        assert_eq!(frame.hardware.r2, 2002);
        assert_eq!(frame.hardware.r3, 2003);
        assert_eq!(frame.hardware.r12, 2012);
        assert_eq!(frame.software.r4, 2004);
        assert_eq!(frame.software.r11, 2011);

        let w = words(&frame);
        assert_eq!(w[..8], [2004, 2005, 2006, 2007, 2008, 2009, 2010, 2011]);
    }

    #[test]
    fn test_write_to_leaves_rest_of_slice() {
        let init = InitialFrame { entry, arg: 1, canary: None };
        let mut buf = [usize::MAX; FRAME_WORDS + 2];
        SavedFrame::initial(&init, 0).write_to(&mut buf);
        assert_eq!(buf[FRAME_WORDS], usize::MAX);
        assert_eq!(buf[FRAME_WORDS + 1], usize::MAX);
        assert_eq!(buf[8], 1);
    }

    #[test]
    fn test_systick_reload() {
        assert_eq!(systick_reload(16_000_000, 100), Some(159_999));
        assert_eq!(systick_reload(16_000_000, 1000), Some(15_999));
        assert_eq!(systick_reload(16_000_000, 0), None);
        // 24-bit counter cannot count 168M cycles
        assert_eq!(systick_reload(168_000_000, 1), None);
        // Faster than the core clock
        assert_eq!(systick_reload(16_000_000, 20_000_000), None);
        assert_eq!(systick_reload(16_000_000, 16_000_000), None);
    }

    fn bootstrap_lines() -> Vec<&'static str> {
        bootstrap_asm!().lines().map(str::trim).collect()
    }

    fn position(lines: &[&str], instr: &str) -> usize {
        lines
            .iter()
            .position(|l| *l == instr)
            .unwrap_or_else(|| panic!("`{}` missing from bootstrap", instr))
    }

    #[test]
    fn test_bootstrap_control_values() {
        // Both keep Thread mode on PSP, only the last one drops privilege
        assert_eq!(CONTROL_PRIVILEGED_PSP & CONTROL_SPSEL, CONTROL_SPSEL);
        assert_eq!(CONTROL_PRIVILEGED_PSP & CONTROL_NPRIV, 0);
        assert_eq!(CONTROL_UNPRIVILEGED_PSP, 0b11);
    }

    #[test]
    fn test_bootstrap_unmasks_before_dropping_privilege() {
        let lines = bootstrap_lines();
        let psp = position(&lines, "msr psp, r1");
        let privileged = position(&lines, "movs r2, #{privileged}");
        let unmask = position(&lines, "cpsie i");
        let unprivileged = position(&lines, "movs r2, #{unprivileged}");

        assert!(psp < privileged);
        assert!(privileged < unmask);
        assert!(unmask < unprivileged);
        assert_eq!(lines[privileged + 1], "msr control, r2");
        assert_eq!(lines[privileged + 2], "isb");
        assert_eq!(lines[unprivileged + 1], "msr control, r2");
        assert_eq!(lines[unprivileged + 2], "isb");
    }

    #[test]
    fn test_bootstrap_ends_in_entry_branch() {
        let lines = bootstrap_lines();
        assert_eq!(lines.iter().filter(|l| l.starts_with("cpsie")).count(), 1);
        assert!(position(&lines, "mov lr, r3") < position(&lines, "bx r12"));
        assert_eq!(lines.last(), Some(&"bx r12"));
    }
}
