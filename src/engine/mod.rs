// src/engine/mod.rs

//! Orchestration engine for agentplan.
//!
//! This module ties together:
//! - the authoritative task store and lifecycle rules
//! - the execution guard (at most one in-flight execution per task)
//! - approval handling and the activity log
//! - the main runtime event loop that reacts to:
//!   - execution results and progress ticks
//!   - goal decomposition results
//!   - operator intents
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::plan::approval::ApprovalDecision;
use crate::plan::lifecycle::{LifecyclePolicy, TaskPatch};
use crate::plan::task::{ApprovalId, Task, TaskId};
use crate::types::{Agent, ExecutionStrategy};

/// Execution attempt number handed out by the guard.
pub type Attempt = u64;

/// A task the core wants executed now.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Snapshot of the task at dispatch time (includes any custom prompt).
    pub task: Task,
    pub strategy: ExecutionStrategy,
    pub attempt: Attempt,
}

/// Operator actions arriving from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorIntent {
    /// Decompose a goal into a fresh plan.
    SubmitGoal { goal: String },
    /// Mark a task completed. `force` overrides the "automated work must be
    /// finished" precondition.
    CompleteTask { task: TaskId, force: bool },
    /// Move a task to another agent and restart it.
    Reassign { task: TaskId, agent: Agent },
    ResolveApproval {
        approval: ApprovalId,
        decision: ApprovalDecision,
    },
    EditTask { task: TaskId, patch: TaskPatch },
    /// Replace the plan with a saved schedule-editor session.
    CommitSchedule { tasks: Vec<Task> },
    /// Throw away every task, approval and error flag.
    ResetPlan,
}

/// Events flowing into the runtime from executors, the decomposer and the
/// operator.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    PlanDecomposed { goal: String, tasks: Vec<Task> },
    DecompositionFailed { goal: String, error: String },
    /// A content-generation call for `attempt` returned text.
    ContentGenerated {
        task: TaskId,
        attempt: Attempt,
        content: String,
    },
    /// An execution attempt failed.
    ExecutionFailed {
        task: TaskId,
        attempt: Attempt,
        error: String,
    },
    /// Simulated work advanced.
    ProgressTick {
        task: TaskId,
        attempt: Attempt,
        progress: u8,
    },
    Operator(OperatorIntent),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Behaviour switches for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub policy: LifecyclePolicy,
    /// Let rejections carry a replacement instruction.
    pub custom_prompt_rejection: bool,
    /// Emit `CoreCommand::Persist` after authoritative changes.
    pub persist: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: LifecyclePolicy::default(),
            custom_prompt_rejection: true,
            persist: false,
        }
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once nothing is executing and no operator action is pending
    /// (used for `--once`).
    pub exit_when_idle: bool,
    /// Feed the core's operator backlog back in automatically
    /// (used for `--auto-approve`).
    pub auto_operator: bool,
}

pub mod core;
pub mod event_handlers;
pub mod guard;
pub mod runtime;
pub mod state;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use guard::ExecutionGuard;
pub use runtime::Runtime;
pub use state::PlanState;
