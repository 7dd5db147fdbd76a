// src/plan/activity.rs

//! Append-only activity feed shown to operators.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::plan::task::ActivityLogEntry;
use crate::types::Agent;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityLog {
    entries: Vec<ActivityLogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time. Every entry is mirrored
    /// to `tracing` at info level.
    pub fn record(&mut self, agent: Agent, message: impl Into<String>) {
        self.push(ActivityLogEntry::now(agent, message));
    }

    pub fn push(&mut self, entry: ActivityLogEntry) {
        info!(agent = %entry.agent, "{}", entry.message);
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ActivityLogEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn entries(&self) -> &[ActivityLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry's message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }
}
