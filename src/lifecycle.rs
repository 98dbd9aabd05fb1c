//! # Kernel Lifecycle
//!
//! The kernel moves strictly forward through four states:
//!
//! ```text
//!   Default ──init()──► Initialized ──register_task()──► TasksRegistered ──start()──► Started
//!                                                          │        ▲
//!                                                          └────────┘
//!                                                        register_task()
//! ```
//!
//! There is no way back. Once tasks are running on their own stacks in
//! unprivileged Thread mode, a reset would have to rebuild every stack and
//! the CPU mode as well, so repeated initialization is simply rejected.

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing has been set up yet.
    Default,
    /// The task table is cleared and empty.
    Initialized,
    /// At least one task is registered; more may follow.
    TasksRegistered,
    /// The tick is armed and the first task has been dispatched. Terminal.
    Started,
}

impl State {
    /// Succeed if `self` is one of `allowed`, otherwise report the state
    /// that made the operation illegal.
    pub fn require(self, allowed: &[State]) -> Result<(), Error> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(Error::InvalidState(self))
        }
    }
}
