// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! After every event the core re-settles the plan (activation + container
//! rollup), runs a dispatch pass through the execution guard, and, when
//! enabled, emits a snapshot for persistence.
//!
//! The core is intended to be extensively tested without any Tokio,
//! channels, filesystem, or processes.

use tracing::{debug, warn};

use crate::engine::event_handlers::{
    dispatch_pass, handle_content_generated, handle_decomposition_failed,
    handle_execution_failed, handle_operator_intent, handle_plan_decomposed,
    handle_progress_tick, CoreCommand, CoreStep,
};
use crate::engine::guard::ExecutionGuard;
use crate::engine::state::{CoreState, PlanState};
use crate::engine::{EngineConfig, OperatorIntent, RuntimeEvent, RuntimeOptions};
use crate::errors::Result;
use crate::plan::activity::ActivityLog;
use crate::plan::approval::{ApprovalBook, ApprovalDecision};
use crate::plan::lifecycle::settle;
use crate::plan::store::Snapshot;
use crate::plan::task::{Task, TaskId};
use crate::types::{Agent, AgentStatus, ExecutionStrategy, TaskStatus};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    state: CoreState,
    options: RuntimeOptions,
    last_persisted: Option<PlanState>,
}

impl CoreRuntime {
    pub fn new(tasks: Vec<Task>, config: EngineConfig, options: RuntimeOptions) -> Self {
        Self {
            state: CoreState::new(tasks, config),
            options,
            last_persisted: None,
        }
    }

    /// Resume from a persisted snapshot.
    pub fn restore(state: PlanState, config: EngineConfig, options: RuntimeOptions) -> Self {
        let last_persisted = Some(state.clone());
        Self {
            state: CoreState::from_plan_state(state, config),
            options,
            last_persisted,
        }
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    /// Initial settle + dispatch for the loaded plan.
    pub fn start(&mut self) -> CoreStep {
        let mut step = CoreStep::proceed(Vec::new());
        self.finish_step(&mut step);
        step
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let mut step = match event {
            RuntimeEvent::PlanDecomposed { goal, tasks } => {
                handle_plan_decomposed(&mut self.state, goal, tasks)
            }
            RuntimeEvent::DecompositionFailed { goal, error } => {
                handle_decomposition_failed(&mut self.state, goal, error)
            }
            RuntimeEvent::ContentGenerated {
                task,
                attempt,
                content,
            } => handle_content_generated(&mut self.state, task, attempt, content),
            RuntimeEvent::ExecutionFailed {
                task,
                attempt,
                error,
            } => handle_execution_failed(&mut self.state, task, attempt, error),
            RuntimeEvent::ProgressTick {
                task,
                attempt,
                progress,
            } => handle_progress_tick(&mut self.state, task, attempt, progress),
            RuntimeEvent::Operator(intent) => match handle_operator_intent(&mut self.state, intent) {
                Ok(step) => step,
                Err(err) => {
                    warn!(error = %err, "operator intent rejected");
                    CoreStep::proceed(Vec::new())
                }
            },
            RuntimeEvent::ShutdownRequested => {
                let mut step = CoreStep::stop();
                step.commands.extend(self.persist_if_changed());
                return step;
            }
        };

        self.finish_step(&mut step);
        step
    }

    /// Apply an operator intent, reporting rejections to the caller.
    pub fn apply_intent(&mut self, intent: OperatorIntent) -> Result<CoreStep> {
        let mut step = handle_operator_intent(&mut self.state, intent)?;
        self.finish_step(&mut step);
        Ok(step)
    }

    fn finish_step(&mut self, step: &mut CoreStep) {
        let policy = self.state.config.policy;
        let settled = settle(&self.state.tasks(), &policy);
        self.state.commit(settled);
        self.state.refresh_agent_errors();

        let dispatches = dispatch_pass(&mut self.state);
        if !dispatches.is_empty() {
            step.commands.push(CoreCommand::Dispatch(dispatches));
        }

        step.commands.extend(self.persist_if_changed());

        if self.options.exit_when_idle && self.is_idle() {
            debug!("plan is idle; requesting exit");
            step.keep_running = false;
            step.commands.push(CoreCommand::RequestExit);
        }
    }

    fn persist_if_changed(&mut self) -> Option<CoreCommand> {
        if !self.state.config.persist {
            return None;
        }
        let snapshot = self.state.to_plan_state();
        if self.last_persisted.as_ref() == Some(&snapshot) {
            return None;
        }
        self.last_persisted = Some(snapshot.clone());
        Some(CoreCommand::Persist(snapshot))
    }

    /// Nothing is executing or being planned, and (when the unattended
    /// operator is on) it has nothing left to do either.
    pub fn is_idle(&self) -> bool {
        self.state.guard.is_empty()
            && !self.state.decomposing
            && (!self.options.auto_operator || self.operator_backlog().is_empty())
    }

    /// Intents an unattended operator would issue right now: approve every
    /// pending approval as-is and complete every finished simulated task.
    pub fn operator_backlog(&self) -> Vec<OperatorIntent> {
        let tasks = self.state.tasks();
        let containers = self.state.config.policy.containers(&tasks);

        let approvals = self.state.approvals.pending().iter().map(|a| {
            OperatorIntent::ResolveApproval {
                approval: a.id,
                decision: ApprovalDecision::Approve {
                    edited_content: None,
                },
            }
        });

        let finished = tasks
            .iter()
            .filter(|t| {
                t.status == TaskStatus::InProgress
                    && t.progress >= 100
                    && !containers.contains(&t.id)
                    && !self.state.guard.contains(&t.id)
                    && t.assigned_agent.strategy() == Some(ExecutionStrategy::Simulated)
            })
            .map(|t| OperatorIntent::CompleteTask {
                task: t.id.clone(),
                force: false,
            });

        approvals.chain(finished).collect()
    }

    pub fn tasks(&self) -> Snapshot {
        self.state.tasks()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.state.store.get(id)
    }

    pub fn revision(&self) -> u64 {
        self.state.store.revision()
    }

    pub fn approvals(&self) -> &ApprovalBook {
        &self.state.approvals
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.state.activity
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.state.guard
    }

    pub fn goal(&self) -> Option<&str> {
        self.state.goal.as_deref()
    }

    pub fn plan_error(&self) -> Option<&str> {
        self.state.plan_error.as_deref()
    }

    pub fn is_decomposing(&self) -> bool {
        self.state.decomposing
    }

    pub fn agent_status(&self, agent: Agent) -> AgentStatus {
        if self.state.errored_agents.contains(&agent) {
            return AgentStatus::Error;
        }
        let working = self
            .state
            .guard
            .active()
            .filter_map(|id| self.state.store.get(id))
            .any(|t| t.assigned_agent == agent);
        if working {
            AgentStatus::Working
        } else {
            AgentStatus::Idle
        }
    }

    pub fn agent_statuses(&self) -> Vec<(Agent, AgentStatus)> {
        Agent::ALL
            .iter()
            .map(|&agent| (agent, self.agent_status(agent)))
            .collect()
    }

    pub fn plan_state(&self) -> PlanState {
        self.state.to_plan_state()
    }
}
