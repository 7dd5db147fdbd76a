// src/engine/state.rs

//! Mutable state owned by the core runtime, and its serialisable snapshot.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::engine::guard::ExecutionGuard;
use crate::engine::EngineConfig;
use crate::plan::activity::ActivityLog;
use crate::plan::approval::ApprovalBook;
use crate::plan::lifecycle::Transition;
use crate::plan::store::{Snapshot, TaskStore};
use crate::plan::task::{Task, TaskId};
use crate::types::{Agent, TaskStatus};

/// Everything needed to resume a plan after a restart.
///
/// In-flight executions are deliberately absent: on resume every eligible
/// task is dispatched afresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanState {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub approvals: ApprovalBook,
    #[serde(default)]
    pub activity: ActivityLog,
    #[serde(default)]
    pub errored_agents: BTreeSet<Agent>,
    #[serde(default)]
    pub plan_error: Option<String>,
}

/// State the event handlers operate on.
#[derive(Debug)]
pub struct CoreState {
    pub store: TaskStore,
    pub approvals: ApprovalBook,
    pub activity: ActivityLog,
    pub guard: ExecutionGuard,
    /// Instruction each in-flight content task was dispatched with.
    pub dispatched_prompts: HashMap<TaskId, Option<String>>,
    pub errored_agents: BTreeSet<Agent>,
    pub plan_error: Option<String>,
    pub goal: Option<String>,
    /// A decomposition request is outstanding.
    pub decomposing: bool,
    pub config: EngineConfig,
}

impl CoreState {
    pub fn new(tasks: Vec<Task>, config: EngineConfig) -> Self {
        Self::from_plan_state(
            PlanState {
                tasks,
                ..PlanState::default()
            },
            config,
        )
    }

    pub fn from_plan_state(state: PlanState, config: EngineConfig) -> Self {
        Self {
            store: TaskStore::new(state.tasks),
            approvals: state.approvals,
            activity: state.activity,
            guard: ExecutionGuard::new(),
            dispatched_prompts: HashMap::new(),
            errored_agents: state.errored_agents,
            plan_error: state.plan_error,
            goal: state.goal,
            decomposing: false,
            config,
        }
    }

    pub fn to_plan_state(&self) -> PlanState {
        PlanState {
            goal: self.goal.clone(),
            tasks: self.store.snapshot().as_ref().clone(),
            approvals: self.approvals.clone(),
            activity: self.activity.clone(),
            errored_agents: self.errored_agents.clone(),
            plan_error: self.plan_error.clone(),
        }
    }

    pub fn tasks(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Commit a transition: swap in the new collection and append its log.
    pub fn commit(&mut self, transition: Transition) -> bool {
        self.activity.extend(transition.log);
        self.store.commit(transition.tasks)
    }

    /// Drop error flags of agents that no longer own a failed task.
    pub fn refresh_agent_errors(&mut self) {
        let tasks = self.store.snapshot();
        self.errored_agents.retain(|agent| {
            tasks
                .iter()
                .any(|t| t.status == TaskStatus::Failed && t.assigned_agent == *agent)
        });
    }
}
