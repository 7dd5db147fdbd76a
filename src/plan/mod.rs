// src/plan/mod.rs

//! Plan model and lifecycle.
//!
//! - [`task`] holds the task, approval and activity records.
//! - [`graph`] answers dependency and containment queries over a snapshot.
//! - [`store`] owns the authoritative copy-on-write task collection.
//! - [`lifecycle`] implements activation, rollup, retries and operator
//!   transitions as pure snapshot-to-snapshot functions.
//! - [`approval`] tracks approval requests and applies human decisions.
//! - [`activity`] is the append-only activity feed.

pub mod activity;
pub mod approval;
pub mod graph;
pub mod lifecycle;
pub mod store;
pub mod task;

pub use activity::ActivityLog;
pub use approval::{ApprovalBook, ApprovalDecision};
pub use graph::TaskGraph;
pub use lifecycle::{FailureOutcome, LifecyclePolicy, TaskPatch, Transition};
pub use store::{Snapshot, TaskStore};
pub use task::{ActivityLogEntry, Approval, ApprovalId, Task, TaskId};
