//! # Scheduler
//!
//! The task table and the round-robin scheduling decision.
//!
//! ## Scheduling Algorithm
//!
//! At each SysTick interrupt:
//! 1. Mark the task at `current` (the one running until now) as Idle
//! 2. Advance `current` by one, wrapping to 0 at `size`
//! 3. Mark the new `current` task as Active
//!
//! There is no priority, no weighting and no skipping: over `size`
//! consecutive ticks every registered task gets exactly one time slice.
//! Moving registers around is not done here; see `arch` for the switch
//! engine that consumes the decision.

use crate::config::MAX_TASKS;
use crate::error::Error;
use crate::task::{TaskRecord, TaskStatus};

/// Fixed-capacity, append-only table of task records plus the scheduling
/// cursor.
///
/// ## Invariants
///
/// - `size <= MAX_TASKS`, and slots `0..size` are exactly the occupied ones
/// - `current < size` whenever `size > 0`
/// - at most one record is Active
pub struct TaskTable {
    tasks: [Option<TaskRecord>; MAX_TASKS],
    size: usize,
    current: usize,
}

impl TaskTable {
    const EMPTY_SLOT: Option<TaskRecord> = None;

    pub const fn new() -> Self {
        Self {
            tasks: [Self::EMPTY_SLOT; MAX_TASKS],
            size: 0,
            current: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        MAX_TASKS
    }

    /// Number of registered tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size >= MAX_TASKS
    }

    /// Index of the task selected to run after the next switch.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn get(&self, index: usize) -> Option<&TaskRecord> {
        if index < self.size {
            self.tasks[index].as_ref()
        } else {
            None
        }
    }

    pub(crate) fn current_record_mut(&mut self) -> Option<&mut TaskRecord> {
        if self.current < self.size {
            self.tasks[self.current].as_mut()
        } else {
            None
        }
    }

    /// Registered records, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks[..self.size].iter().flatten()
    }

    /// Append a record and return its index.
    pub fn push(&mut self, record: TaskRecord) -> Result<usize, Error> {
        if self.is_full() {
            return Err(Error::TableFull);
        }
        let index = self.size;
        self.tasks[index] = Some(record);
        self.size += 1;
        Ok(index)
    }

    /// Hand the CPU to the next task in circular order.
    ///
    /// Returns the new `current` index, or `None` if the table is empty.
    pub fn rotate(&mut self) -> Option<usize> {
        if self.size == 0 {
            return None;
        }

        if let Some(prev) = self.tasks[self.current].as_mut() {
            prev.status = TaskStatus::Idle;
        }

        self.current += 1;
        if self.current >= self.size {
            self.current = 0;
        }

        if let Some(next) = self.tasks[self.current].as_mut() {
            next.status = TaskStatus::Active;
        }
        Some(self.current)
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
