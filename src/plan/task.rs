// src/plan/task.rs

//! Task, approval and activity-log records.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Agent, ApprovalStatus, TaskStatus};

/// Stable task identifier, unique within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Default task duration in days.
pub const DEFAULT_DURATION_DAYS: u32 = 1;

/// Longest estimate a task may carry, in days.
pub const MAX_DURATION_DAYS: u32 = 3650;

/// A unit of work assigned to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assigned_agent: Agent,
    /// Ordered dependency list. Ids missing from the plan are ignored.
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    /// Container this task belongs to, if any.
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub status: TaskStatus,
    /// 0..=100
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub approved_content: Option<String>,
    /// Replacement instruction for the next execution attempt.
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default = "default_duration")]
    pub estimated_duration: u32,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_DAYS
}

impl Task {
    /// A fresh pending task with default duration and no links.
    pub fn new(id: impl Into<String>, title: impl Into<String>, agent: Agent) -> Self {
        Self {
            id: TaskId::new(id),
            title: title.into(),
            description: String::new(),
            assigned_agent: agent,
            depends_on: Vec::new(),
            parent_id: None,
            status: TaskStatus::Pending,
            progress: 0,
            retries: 0,
            approved_content: None,
            custom_prompt: None,
            start_date: None,
            estimated_duration: DEFAULT_DURATION_DAYS,
        }
    }

    /// Duration in days, never less than one.
    pub fn duration_days(&self) -> i64 {
        i64::from(self.estimated_duration.max(1))
    }

    /// Reset execution state so the task re-runs from scratch.
    pub fn reset_execution(&mut self) {
        self.status = TaskStatus::Pending;
        self.progress = 0;
        self.retries = 0;
        self.approved_content = None;
    }
}

/// Identifier of an approval request; allocated monotonically by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(pub u64);

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "approval-{}", self.0)
    }
}

/// Candidate output waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub task_id: TaskId,
    pub agent: Agent,
    pub title: String,
    pub content: String,
    pub status: ApprovalStatus,
}

/// One line of the operator-visible activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub agent: Agent,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn now(agent: Agent, message: impl Into<String>) -> Self {
        Self {
            agent,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
