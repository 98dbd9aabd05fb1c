//! # Task Record
//!
//! Passive description of one schedulable unit. Records live in the task
//! table for the whole life of the program; they are never destroyed.
//!
//! ## Ownership of fields
//!
//! | Field           | Written by                           |
//! |-----------------|--------------------------------------|
//! | `stack_pointer` | registration, then the switch engine |
//! | `entry`, `arg`  | registration only                    |
//! | `status`        | the tick handler only                |

use core::sync::atomic::{AtomicUsize, Ordering};

/// Task entry point. Called once, at first dispatch, with the `arg` given at
/// registration in the first argument register.
///
/// Tasks are expected to loop forever. Returning halts the whole system.
pub type TaskEntry = extern "C" fn(arg: usize);

/// Scheduling status of a task.
///
/// ```text
///   ┌──────┐   tick selects task    ┌────────┐
///   │ Idle │ ─────────────────────► │ Active │
///   └──────┘ ◄───────────────────── └────────┘
///               next tick moves on
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Not loaded on the CPU; its registers are saved on its stack.
    Idle,
    /// Selected for (or currently on) the CPU. At most one task at a time.
    Active,
}

/// One entry of the task table.
///
/// `stack_pointer` must stay the first field: the context switch handler
/// reaches it through a raw record pointer at a fixed offset.
#[repr(C)]
pub struct TaskRecord {
    /// Saved top of stack. Only meaningful while the task is off the CPU.
    stack_pointer: AtomicUsize,
    entry: TaskEntry,
    arg: usize,
    pub(crate) status: TaskStatus,
}

impl TaskRecord {
    /// Byte offset of the saved stack pointer inside a record.
    pub const STACK_POINTER_OFFSET: usize = core::mem::offset_of!(TaskRecord, stack_pointer);

    pub(crate) const fn new(entry: TaskEntry, arg: usize, stack_pointer: usize) -> Self {
        Self {
            stack_pointer: AtomicUsize::new(stack_pointer),
            entry,
            arg,
            status: TaskStatus::Idle,
        }
    }

    /// Saved stack pointer of this task.
    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.stack_pointer.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn entry(&self) -> TaskEntry {
        self.entry
    }

    #[inline]
    pub fn arg(&self) -> usize {
        self.arg
    }

    #[inline]
    pub fn status(&self) -> TaskStatus {
        self.status
    }
}

const _: () = assert!(TaskRecord::STACK_POINTER_OFFSET == 0);

/// Statically allocatable task stack.
///
/// Aligned to 8 bytes as required by the AAPCS for the stack pointer at a
/// public interface. Hand it to the kernel with [`Stack::as_mut_bytes`]:
///
/// ```ignore
/// let stack = cortex_m::singleton!(: Stack<512> = Stack::new()).unwrap();
/// kernel::register_task(my_task, 0, stack.as_mut_bytes())?;
/// ```
#[repr(C, align(8))]
pub struct Stack<const N: usize>([u8; N]);

impl<const N: usize> Stack<N> {
    pub const fn new() -> Self {
        Self([0; N])
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl<const N: usize> Default for Stack<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn noop(_arg: usize) {}

    #[test]
    fn test_record_initialization() {
        let record = TaskRecord::new(noop, 42, 0x2000_1000);
        assert_eq!(record.status(), TaskStatus::Idle);
        assert_eq!(record.arg(), 42);
        assert_eq!(record.stack_pointer(), 0x2000_1000);
        assert_eq!(record.entry() as usize, noop as usize);
    }

    #[test]
    fn test_stack_pointer_is_first_field() {
        let record = TaskRecord::new(noop, 0, 0xdead_beef);
        let base = &record as *const TaskRecord as *const usize;
        // SAFETY: offset 0 of a repr(C) record is the AtomicUsize, which has
        // the same layout as usize.
        assert_eq!(unsafe { *base }, 0xdead_beef);
    }

    #[test]
    fn test_stack_alignment() {
        let mut stack = Stack::<64>::new();
        let bytes = stack.as_mut_bytes();
        assert_eq!(bytes.len(), 64);
        assert_eq!(bytes.as_ptr() as usize % 8, 0);
    }
}
