//! # Kernel Errors
//!
//! Every fallible kernel operation returns [`Error`]. A failed operation is
//! always a no-op: the lifecycle state and the task table are exactly as
//! they were before the call.

use core::fmt;

use crate::lifecycle::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The operation is not legal in the current lifecycle state.
    InvalidState(State),
    /// The task table is at capacity. Slots are never freed.
    TableFull,
    /// The stack length is not a whole number of words, or its base
    /// address is not word aligned.
    MisalignedStack,
    /// The stack does not have room for more than one saved register frame.
    StackTooSmall { words: usize },
    /// The tick timer cannot be programmed at the requested rate.
    TickRate { hz: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidState(state) => write!(f, "operation not allowed in state {:?}", state),
            Error::TableFull => f.write_str("task table is full"),
            Error::MisalignedStack => f.write_str("stack is not word aligned"),
            Error::StackTooSmall { words } => {
                write!(f, "stack of {} words cannot hold an initial frame", words)
            }
            Error::TickRate { hz } => write!(f, "tick timer cannot run at {} Hz", hz),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::InvalidState(State::Started).to_string(),
            "operation not allowed in state Started"
        );
        assert_eq!(Error::TableFull.to_string(), "task table is full");
        assert_eq!(
            Error::StackTooSmall { words: 16 }.to_string(),
            "stack of 16 words cannot hold an initial frame"
        );
        assert_eq!(Error::TickRate { hz: 0 }.to_string(), "tick timer cannot run at 0 Hz");
    }
}
