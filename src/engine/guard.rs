// src/engine/guard.rs

//! Per-task execution guard.
//!
//! The guard maps a task id to the attempt currently executing it. The core
//! is single-threaded, so `try_acquire` is an atomic check-then-insert with
//! respect to every other dispatch decision.

use std::collections::HashMap;

use tracing::trace;

use crate::engine::Attempt;
use crate::plan::task::TaskId;

#[derive(Debug, Default)]
pub struct ExecutionGuard {
    active: HashMap<TaskId, Attempt>,
    next_attempt: Attempt,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `task` for a new attempt, or `None` if it is already executing.
    pub fn try_acquire(&mut self, task: &TaskId) -> Option<Attempt> {
        if self.active.contains_key(task) {
            trace!(task = %task, "guard already held; skipping dispatch");
            return None;
        }
        self.next_attempt += 1;
        self.active.insert(task.clone(), self.next_attempt);
        Some(self.next_attempt)
    }

    /// Whether `attempt` is the live execution for `task`.
    pub fn is_current(&self, task: &TaskId, attempt: Attempt) -> bool {
        self.active.get(task) == Some(&attempt)
    }

    /// Release `task` if `attempt` still owns it.
    pub fn release(&mut self, task: &TaskId, attempt: Attempt) -> bool {
        if self.is_current(task, attempt) {
            self.active.remove(task);
            true
        } else {
            false
        }
    }

    /// Release `task` regardless of attempt (operator override).
    pub fn clear(&mut self, task: &TaskId) -> Option<Attempt> {
        self.active.remove(task)
    }

    /// Release everything, returning the ids that were held.
    pub fn clear_all(&mut self) -> Vec<TaskId> {
        self.active.drain().map(|(id, _)| id).collect()
    }

    pub fn contains(&self, task: &TaskId) -> bool {
        self.active.contains_key(task)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &TaskId> {
        self.active.keys()
    }
}
