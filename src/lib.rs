//! # rros — Round-Robin Operating System
//!
//! A minimal preemptive, round-robin task scheduler for single-core ARM
//! Cortex-M4 microcontrollers.
//!
//! ## Overview
//!
//! A fixed number of tasks, each on its own stack, share the CPU in strict
//! rotation. SysTick fires at `TICK_HZ`, picks the next task and pends
//! PendSV; PendSV swaps the register file. There are no priorities, no
//! blocking primitives and no task creation after start.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   init() · register_task() · start() · delay() · ticks │
//! ├──────────────┬─────────────────┬───────────────────────┤
//! │  Lifecycle   │   Scheduler     │   Time                │
//! │  lifecycle.rs│   scheduler.rs  │   time.rs             │
//! │  ─ State     │   ─ TaskTable   │   ─ TickCounter       │
//! │              │   ─ rotate()    │   ─ delay()           │
//! ├──────────────┴─────────────────┴───────────────────────┤
//! │              Task Record (task.rs)                      │
//! │        TaskRecord · TaskStatus · Stack                  │
//! ├────────────────────────────────────────────────────────┤
//! │         Port boundary (arch/mod.rs)                     │
//! │   Port · Handoff · InitialFrame · Launch               │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    PendSV · SysTick · SavedFrame · bootstrap            │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! kernel::init()?;
//! let stack = cortex_m::singleton!(: Stack<512> = Stack::new()).unwrap();
//! kernel::register_task(worker, 0, stack.as_mut_bytes())?;
//! kernel::start(&mut cortex_m::Peripherals::take().unwrap())?;
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: All state is statically allocated
//! - **Fixed-size task table**: `[Option<TaskRecord>; MAX_TASKS]`
//! - **Caller-provided stacks**: handed over as `&'static mut [u8]`
//! - **Tasks run unprivileged** on PSP; handlers run privileged on MSP

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod error;
pub mod kernel;
pub mod lifecycle;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod time;

pub use error::Error;
pub use lifecycle::State;
pub use task::{Stack, TaskEntry, TaskStatus};
pub use time::{delay, get_ticks};
