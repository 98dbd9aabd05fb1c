//! # rros Example Firmware
//!
//! Three tasks share one entry function and differ only by their argument.
//! Each prints a greeting over semihosting once per second:
//!
//! | Task | Arg | Output          |
//! |------|-----|-----------------|
//! | 0    | 0   | `hello`         |
//! | 1    | 1   | `world`         |
//! | 2    | 2   | `hello world!`  |
//!
//! Every task spins in `rros::delay()` between greetings, so all three keep
//! getting their 10 ms slices in strict rotation.
//!
//! Build with `--target thumbv7em-none-eabi`. Host builds only print a
//! notice.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use cortex_m_rt::entry;
    use cortex_m_semihosting::hprintln;
    use log::{debug, error, info, LevelFilter, Log, Metadata, Record};
    use panic_halt as _;

    use rros::arch::cortex_m4::FRAME_WORDS;
    use rros::kernel;
    use rros::Stack;

    // -----------------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------------

    /// `log` backend writing `[LEVEL] file:line >> message` to the
    /// debugger console.
    struct SemihostingLogger;

    impl Log for SemihostingLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            hprintln!(
                "[{}] {}:{} >> {}",
                record.level(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            );
        }

        fn flush(&self) {}
    }

    static LOGGER: SemihostingLogger = SemihostingLogger;

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    const GREETINGS: [&str; 3] = ["hello", "world", "hello world!"];

    /// Per-task stack. The logger's `core::fmt` path runs on it.
    const TASK_STACK_BYTES: usize = 1024;

    // Room left below the initial frame for the formatting call chain
    const _: () = assert!(
        TASK_STACK_BYTES - FRAME_WORDS * core::mem::size_of::<usize>() >= 768
    );

    extern "C" fn greeter(arg: usize) {
        let greeting = GREETINGS[arg % GREETINGS.len()];
        loop {
            info!("{}", greeting);
            rros::delay(1000);
        }
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Firmware entry point. Initializes the kernel, registers the tasks
    /// and starts the scheduler. Only returns control to the idle loop if
    /// something went wrong.
    #[entry]
    fn main() -> ! {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Debug);
        }
        debug!("system start");

        if let Err(e) = run() {
            error!("kernel error: {}", e);
        }
        loop {
            cortex_m::asm::wfi();
        }
    }

    fn run() -> Result<(), rros::Error> {
        kernel::init()?;

        let stacks = [
            cortex_m::singleton!(: Stack<TASK_STACK_BYTES> = Stack::new()),
            cortex_m::singleton!(: Stack<TASK_STACK_BYTES> = Stack::new()),
            cortex_m::singleton!(: Stack<TASK_STACK_BYTES> = Stack::new()),
        ];
        for (arg, stack) in stacks.into_iter().enumerate() {
            let Some(stack) = stack else {
                error!("stack {} already taken", arg);
                continue;
            };
            kernel::register_task(greeter, arg, stack.as_mut_bytes())?;
        }

        let Some(mut peripherals) = cortex_m::Peripherals::take() else {
            error!("core peripherals already taken");
            return Ok(());
        };
        match kernel::start(&mut peripherals)? {}
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    println!("rros runs on bare-metal Cortex-M4; build with --target thumbv7em-none-eabi");
}
