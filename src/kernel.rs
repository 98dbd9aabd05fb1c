//! # Kernel
//!
//! Lifecycle management and the public API of rros.
//!
//! [`Kernel`] holds the lifecycle state and the task table and is written
//! against the [`Port`] trait only, so all of its rules run on the host in
//! unit tests. On Cortex-M a single instance lives in a static and is
//! driven by the free functions at the bottom of this file.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()           ← Clear the task table
//!         ├─► kernel::register_task()  ← Build initial frames (×N)
//!         └─► kernel::start()          ← No return on success
//!               ├─► Set interrupt priorities
//!               ├─► Configure SysTick
//!               └─► Enter the first task via Port::bootstrap_first_task()
//! ```

use core::marker::PhantomData;

use log::{debug, info, warn};

use crate::arch::{InitialFrame, Launch, Port};
use crate::config::{DEBUG_CANARY, WORD_SIZE};
use crate::error::Error;
use crate::lifecycle::State;
use crate::scheduler::TaskTable;
use crate::task::{TaskEntry, TaskRecord, TaskStatus};
use crate::time::TickCounter;

/// Lifecycle state plus task table for one processor port.
pub struct Kernel<P: Port> {
    state: State,
    table: TaskTable,
    canary: bool,
    _port: PhantomData<fn() -> P>,
}

impl<P: Port> Kernel<P> {
    pub const fn new() -> Self {
        Self {
            state: State::Default,
            table: TaskTable::new(),
            canary: DEBUG_CANARY,
            _port: PhantomData,
        }
    }

    /// Force the register pattern in initial frames on or off, regardless
    /// of the `debug-canary` feature.
    pub const fn with_canary(mut self, enabled: bool) -> Self {
        self.canary = enabled;
        self
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn table(&self) -> &TaskTable {
        &self.table
    }

    /// Clear the task table. Allowed exactly once.
    pub fn init(&mut self) -> Result<(), Error> {
        self.state.require(&[State::Default]).inspect_err(|e| warn!("init rejected: {}", e))?;

        self.table = TaskTable::new();
        self.state = State::Initialized;
        debug!("kernel initialized, capacity {} tasks", self.table.capacity());
        Ok(())
    }

    /// Register a task that will run `entry(arg)` on `stack`.
    ///
    /// The stack is handed over to the kernel for good. Its length must be
    /// a whole number of words, its base word aligned, and it must hold
    /// more than one saved register frame.
    ///
    /// # Returns
    /// The task's index in the table.
    pub fn register_task(
        &mut self,
        entry: TaskEntry,
        arg: usize,
        stack: &'static mut [u8],
    ) -> Result<usize, Error> {
        self.check_registration(stack).inspect_err(|e| warn!("task rejected: {}", e))?;

        let index = self.table.len();
        let words = stack.len() / WORD_SIZE;
        // SAFETY: the base is word aligned and `words * WORD_SIZE` bytes are
        // in bounds (both checked above). The 'static borrow moves into the
        // kernel, so nothing else can reach these bytes.
        let cells: &'static mut [usize] =
            unsafe { core::slice::from_raw_parts_mut(stack.as_mut_ptr().cast::<usize>(), words) };

        let frame = &mut cells[words - P::FRAME_WORDS..];
        let canary = self.canary.then_some((index + 1) * 1000);
        P::init_frame(frame, &InitialFrame { entry, arg, canary });

        let stack_pointer = frame.as_ptr() as usize;
        self.table.push(TaskRecord::new(entry, arg, stack_pointer))?;
        self.state = State::TasksRegistered;

        debug!("task {} registered, {} words of stack, sp {:#x}", index, words, stack_pointer);
        Ok(index)
    }

    fn check_registration(&self, stack: &[u8]) -> Result<(), Error> {
        self.state.require(&[State::Initialized, State::TasksRegistered])?;
        if self.table.is_full() {
            return Err(Error::TableFull);
        }
        if stack.len() % WORD_SIZE != 0 || stack.as_ptr() as usize % WORD_SIZE != 0 {
            return Err(Error::MisalignedStack);
        }
        let words = stack.len() / WORD_SIZE;
        if words <= P::FRAME_WORDS {
            return Err(Error::StackTooSmall { words });
        }
        Ok(())
    }

    /// Arm the tick and select the first task.
    ///
    /// On success the kernel is `Started` and the returned [`Launch`] must
    /// be handed to [`Port::bootstrap_first_task`] with interrupts still
    /// disabled. If the tick cannot be armed the kernel stays in
    /// `TasksRegistered` and `start` may be retried.
    pub fn start(&mut self, hw: &mut P::Hardware, tick_hz: u32) -> Result<Launch, Error> {
        self.state.require(&[State::TasksRegistered]).inspect_err(|e| warn!("start rejected: {}", e))?;

        P::configure_priorities(hw);
        P::arm_tick(hw, tick_hz).inspect_err(|e| warn!("start failed: {}", e))?;

        let current = self.table.current();
        let record = self.table.current_record_mut().ok_or(Error::InvalidState(self.state))?;
        record.status = TaskStatus::Active;
        P::handoff().set_curr(record);

        let launch = Launch {
            stack_top: record.stack_pointer() + P::FRAME_WORDS * WORD_SIZE,
            entry: record.entry(),
            arg: record.arg(),
        };
        self.state = State::Started;

        info!("starting {} tasks at {} Hz, first task {}", self.table.len(), tick_hz, current);
        Ok(launch)
    }

    /// Tick handler body: rotate to the next task, count the tick and
    /// request a context switch.
    pub fn on_tick(&mut self, ticks: &TickCounter) {
        if self.state != State::Started {
            return;
        }
        let Some(next) = self.table.rotate() else {
            return;
        };
        ticks.advance();
        if let Some(record) = self.table.get(next) {
            P::handoff().set_next(record);
        }
        P::pend_switch();
    }
}

impl<P: Port> Default for Kernel<P> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Global kernel instance (Cortex-M)
// ---------------------------------------------------------------------------

#[cfg(target_arch = "arm")]
pub use self::global::{init, register_task, start};

#[cfg(target_arch = "arm")]
pub(crate) use self::global::tick;

#[cfg(target_arch = "arm")]
mod global {
    use core::cell::UnsafeCell;
    use core::convert::Infallible;

    use super::Kernel;
    use crate::arch::cortex_m4::CortexM4;
    use crate::arch::Port;
    use crate::config::TICK_HZ;
    use crate::error::Error;
    use crate::sync;
    use crate::task::TaskEntry;
    use crate::time::TICKS;

    struct KernelCell(UnsafeCell<Kernel<CortexM4>>);

    // SAFETY: before `start` the kernel is only touched from Thread mode
    // inside critical sections; afterwards only the SysTick handler mutates
    // it, and SysTick cannot preempt itself.
    unsafe impl Sync for KernelCell {}

    static KERNEL: KernelCell = KernelCell(UnsafeCell::new(Kernel::new()));

    /// # Safety
    /// The caller must hold exclusive access: a critical section, masked
    /// interrupts, or the SysTick handler.
    unsafe fn kernel() -> &'static mut Kernel<CortexM4> {
        &mut *KERNEL.0.get()
    }

    /// Initialize the kernel. Must be the first kernel call, and succeeds
    /// only once.
    pub fn init() -> Result<(), Error> {
        sync::critical_section(|_cs| unsafe { kernel().init() })
    }

    /// Register a task to run `entry(arg)` on `stack`.
    ///
    /// # Returns
    /// - `Ok(task_id)`: The task's index in the task table.
    /// - `Err(_)`: Wrong lifecycle state, table full, or unusable stack.
    ///
    /// # Example
    /// ```ignore
    /// let stack = cortex_m::singleton!(: Stack<512> = Stack::new()).unwrap();
    /// kernel::register_task(blink, 0, stack.as_mut_bytes())?;
    /// ```
    pub fn register_task(entry: TaskEntry, arg: usize, stack: &'static mut [u8]) -> Result<usize, Error> {
        sync::critical_section(|_cs| unsafe { kernel().register_task(entry, arg, stack) })
    }

    /// Start the scheduler. **Does not return on success.**
    ///
    /// Sets interrupt priorities, arms SysTick at `TICK_HZ`, and enters the
    /// first registered task in unprivileged Thread mode. Interrupts stay
    /// masked until the bootstrap re-enables them, so no tick can observe a
    /// half-started kernel.
    pub fn start(peripherals: &mut cortex_m::Peripherals) -> Result<Infallible, Error> {
        cortex_m::interrupt::disable();
        // SAFETY: interrupts are masked.
        match unsafe { kernel().start(peripherals, TICK_HZ) } {
            // SAFETY: called once, interrupts masked, `launch` comes from the
            // kernel that just started.
            Ok(launch) => unsafe { CortexM4::bootstrap_first_task(launch) },
            Err(e) => {
                // SAFETY: nothing was started, restore normal operation.
                unsafe { cortex_m::interrupt::enable() };
                Err(e)
            }
        }
    }

    /// SysTick entry into the kernel.
    ///
    /// # Safety
    /// Only the SysTick handler may call this.
    pub(crate) unsafe fn tick() {
        kernel().on_tick(&TICKS);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
