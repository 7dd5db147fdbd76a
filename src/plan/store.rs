// src/plan/store.rs

//! The single authoritative task collection.
//!
//! Readers take a cheap `Arc` snapshot. Writers build a whole new collection
//! from a snapshot and hand it to [`TaskStore::commit`]; nothing is mutated
//! in place, so computations running against a snapshot never observe a
//! half-applied update.

use std::sync::Arc;

use tracing::trace;

use crate::plan::task::{Task, TaskId};

/// Immutable view of the task collection at one revision.
pub type Snapshot = Arc<Vec<Task>>;

#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Snapshot,
    revision: u64,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Arc::new(tasks),
            revision: 0,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.tasks)
    }

    /// Monotonic counter bumped on every effective commit.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Replace the collection. Returns `false` (and keeps the revision) when
    /// `next` is identical to the current snapshot.
    pub fn commit(&mut self, next: Vec<Task>) -> bool {
        if *self.tasks == next {
            return false;
        }
        self.tasks = Arc::new(next);
        self.revision += 1;
        trace!(revision = self.revision, "task store committed new snapshot");
        true
    }
}
