// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.
//!
//! Each handler mutates [`CoreState`] and returns the commands that follow
//! directly from the event. The settle / dispatch / persist pass that runs
//! after every event lives in [`crate::engine::core`].

use tracing::{debug, info, warn};

use crate::engine::state::{CoreState, PlanState};
use crate::engine::{Attempt, Dispatch, OperatorIntent};
use crate::errors::{AgentplanError, Result};
use crate::plan::lifecycle::{
    await_approval, complete_manually, edit, reassign, record_failure, record_progress,
    reset_for_rerun, FailureOutcome,
};
use crate::plan::task::{Task, TaskId};
use crate::types::{Agent, ExecutionStrategy, TaskStatus};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Start these executions.
    Dispatch(Vec<Dispatch>),
    /// Stop in-flight executions of these tasks; their results are stale.
    Cancel(Vec<TaskId>),
    /// Ask the decomposer to break `goal` into tasks.
    Decompose { goal: String },
    /// Save this snapshot through the configured state store.
    Persist(PlanState),
    /// Request that the process exits (used for `--once` when idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn stop() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }

    /// All tasks this step dispatches, across every `Dispatch` command.
    pub fn dispatched(&self) -> impl Iterator<Item = &Dispatch> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Dispatch(d) => Some(d),
                _ => None,
            })
            .flatten()
    }
}

/// A decomposition came back: replace the whole plan.
pub fn handle_plan_decomposed(state: &mut CoreState, goal: String, tasks: Vec<Task>) -> CoreStep {
    state.decomposing = false;

    if tasks.is_empty() {
        return handle_decomposition_failed(state, goal, "no tasks were produced".to_string());
    }

    let count = tasks.len();
    let commands = replace_plan(state, tasks);
    state.goal = Some(goal.clone());
    state
        .activity
        .record(Agent::Orchestrator, format!("Planned {count} tasks for \"{goal}\"."));

    CoreStep::proceed(commands)
}

/// A decomposition failed: surface a plan-level error, keep the current plan.
pub fn handle_decomposition_failed(state: &mut CoreState, goal: String, error: String) -> CoreStep {
    state.decomposing = false;
    warn!(%goal, %error, "goal decomposition failed");
    state.activity.record(
        Agent::Orchestrator,
        format!("Could not break down \"{goal}\": {error}"),
    );
    state.plan_error = Some(error);
    CoreStep::proceed(Vec::new())
}

/// Generated content arrived for `attempt`.
///
/// The result is only accepted while the attempt still owns the guard and
/// the task is still `InProgress`; anything else means the task moved on
/// (manual completion, reassignment, plan replacement) and the draft is
/// discarded.
pub fn handle_content_generated(
    state: &mut CoreState,
    task: TaskId,
    attempt: Attempt,
    content: String,
) -> CoreStep {
    if !state.guard.release(&task, attempt) {
        discard_stale(state, &task, attempt, "draft");
        return CoreStep::proceed(Vec::new());
    }
    let consumed = state.dispatched_prompts.remove(&task).flatten();

    let tasks = state.tasks();
    let Some(current) = tasks.iter().find(|t| t.id == task) else {
        debug!(task = %task, attempt, "task vanished before its draft arrived");
        return CoreStep::proceed(Vec::new());
    };
    if current.status != TaskStatus::InProgress {
        discard_stale(state, &task, attempt, "draft");
        return CoreStep::proceed(Vec::new());
    }

    match state.approvals.open(current, content) {
        Ok(approval) => {
            info!(task = %task, attempt, %approval, "draft submitted for approval");
        }
        Err(err) => {
            warn!(task = %task, attempt, error = %err, "could not open approval; dropping draft");
            return CoreStep::proceed(Vec::new());
        }
    }

    match await_approval(&tasks, &task, consumed.as_deref()) {
        Ok(transition) => {
            state.commit(transition);
        }
        Err(err) => warn!(task = %task, error = %err, "could not park task behind approval"),
    }

    CoreStep::proceed(Vec::new())
}

/// An execution attempt failed: apply the retry policy.
pub fn handle_execution_failed(
    state: &mut CoreState,
    task: TaskId,
    attempt: Attempt,
    error: String,
) -> CoreStep {
    if !state.guard.release(&task, attempt) {
        discard_stale(state, &task, attempt, "failure report");
        return CoreStep::proceed(Vec::new());
    }
    state.dispatched_prompts.remove(&task);

    let tasks = state.tasks();
    let policy = state.config.policy;
    match record_failure(&tasks, &task, &error, &policy) {
        Ok((transition, outcome)) => {
            let agent = tasks
                .iter()
                .find(|t| t.id == task)
                .map(|t| t.assigned_agent);
            state.commit(transition);

            match (outcome, agent) {
                (FailureOutcome::Retrying { attempt: n }, _) => {
                    info!(task = %task, attempt, failed = n, %error, "execution failed; will retry");
                }
                (FailureOutcome::Exhausted, Some(agent)) => {
                    warn!(task = %task, %agent, %error, "retries exhausted; task failed");
                    state.errored_agents.insert(agent);
                    state.activity.record(
                        Agent::Orchestrator,
                        format!("{agent} needs attention: \"{task}\" failed. Reassign it to continue."),
                    );
                }
                (FailureOutcome::Exhausted, None) => {}
            }
        }
        Err(err) => {
            debug!(task = %task, attempt, error = %err, "failure ignored for task that moved on");
        }
    }

    CoreStep::proceed(Vec::new())
}

/// Simulated work advanced.
pub fn handle_progress_tick(
    state: &mut CoreState,
    task: TaskId,
    attempt: Attempt,
    progress: u8,
) -> CoreStep {
    if !state.guard.is_current(&task, attempt) {
        debug!(task = %task, attempt, progress, "stale progress tick ignored");
        return CoreStep::proceed(Vec::new());
    }

    let tasks = state.tasks();
    match record_progress(&tasks, &task, progress) {
        Ok(transition) => {
            state.commit(transition);
            if progress >= 100 {
                state.guard.release(&task, attempt);
            }
            CoreStep::proceed(Vec::new())
        }
        Err(err) => {
            debug!(task = %task, attempt, error = %err, "stopping simulated work");
            state.guard.release(&task, attempt);
            CoreStep::proceed(vec![CoreCommand::Cancel(vec![task])])
        }
    }
}

/// Apply an operator intent. Rejected intents leave the state untouched.
pub fn handle_operator_intent(state: &mut CoreState, intent: OperatorIntent) -> Result<CoreStep> {
    let policy = state.config.policy;
    let tasks = state.tasks();

    let commands = match intent {
        OperatorIntent::SubmitGoal { goal } => {
            let goal = goal.trim().to_string();
            if goal.is_empty() {
                return Err(AgentplanError::Decomposition("goal text is empty".to_string()));
            }
            if state.decomposing {
                return Err(AgentplanError::Decomposition(
                    "a goal is already being planned".to_string(),
                ));
            }
            state.decomposing = true;
            state.plan_error = None;
            state
                .activity
                .record(Agent::Orchestrator, format!("Breaking down \"{goal}\"."));
            vec![CoreCommand::Decompose { goal }]
        }
        OperatorIntent::CompleteTask { task, force } => {
            let transition = complete_manually(&tasks, &task, force, &policy)?;
            state.commit(transition);
            state.approvals.withdraw(&task);
            cancel_one(state, &task)
        }
        OperatorIntent::Reassign { task, agent } => {
            let transition = reassign(&tasks, &task, agent, &policy)?;
            state.commit(transition);
            state.approvals.withdraw(&task);
            cancel_one(state, &task)
        }
        OperatorIntent::ResolveApproval { approval, decision } => {
            let allow_instruction = state.config.custom_prompt_rejection;
            let transition =
                state
                    .approvals
                    .resolve(&tasks, approval, decision, allow_instruction)?;
            state.commit(transition);
            Vec::new()
        }
        OperatorIntent::EditTask { task, patch } => {
            let transition = edit(&tasks, &task, patch)?;
            state.commit(transition);
            Vec::new()
        }
        OperatorIntent::CommitSchedule { tasks } => {
            let count = tasks.len();
            let commands = replace_plan(state, tasks);
            state.activity.record(
                Agent::Orchestrator,
                format!("Schedule updated; restarting {count} tasks."),
            );
            commands
        }
        OperatorIntent::ResetPlan => {
            let commands = replace_plan(state, Vec::new());
            state.goal = None;
            state.activity.record(Agent::Orchestrator, "Plan cleared.");
            commands
        }
    };

    Ok(CoreStep::proceed(commands))
}

/// Choose the tasks that should start executing now and claim their guard
/// entries.
///
/// A task is dispatched when it is an `InProgress` leaf assigned to an
/// executing agent, is not already executing, and still has automated work
/// left (no pending approval for content work, progress below 100 for
/// simulated work).
pub fn dispatch_pass(state: &mut CoreState) -> Vec<Dispatch> {
    let tasks = state.tasks();
    let containers = state.config.policy.containers(&tasks);
    let mut dispatched = Vec::new();

    for task in tasks.iter() {
        if task.status != TaskStatus::InProgress || containers.contains(&task.id) {
            continue;
        }
        let Some(strategy) = task.assigned_agent.strategy() else {
            debug!(task = %task.id, "orchestrator-assigned task is never executed");
            continue;
        };
        let has_work = match strategy {
            ExecutionStrategy::Content => state.approvals.pending_for(&task.id).is_none(),
            ExecutionStrategy::Simulated => task.progress < 100,
        };
        if !has_work {
            continue;
        }

        let Some(attempt) = state.guard.try_acquire(&task.id) else {
            continue;
        };
        debug!(task = %task.id, attempt, ?strategy, "dispatching task");
        if strategy == ExecutionStrategy::Content {
            state
                .dispatched_prompts
                .insert(task.id.clone(), task.custom_prompt.clone());
        }
        dispatched.push(Dispatch {
            task: task.clone(),
            strategy,
            attempt,
        });
    }

    dispatched
}

/// Swap in a brand-new plan revision: every execution is abandoned, pending
/// approvals and error flags are dropped, and all tasks restart from Pending.
fn replace_plan(state: &mut CoreState, tasks: Vec<Task>) -> Vec<CoreCommand> {
    let cancelled = state.guard.clear_all();
    state.dispatched_prompts.clear();
    state.approvals.clear_pending();
    state.errored_agents.clear();
    state.plan_error = None;
    state.store.commit(reset_for_rerun(&tasks));

    if cancelled.is_empty() {
        Vec::new()
    } else {
        vec![CoreCommand::Cancel(cancelled)]
    }
}

fn cancel_one(state: &mut CoreState, task: &TaskId) -> Vec<CoreCommand> {
    state.dispatched_prompts.remove(task);
    match state.guard.clear(task) {
        Some(attempt) => {
            debug!(task = %task, attempt, "abandoning in-flight execution");
            vec![CoreCommand::Cancel(vec![task.clone()])]
        }
        None => Vec::new(),
    }
}

fn discard_stale(state: &mut CoreState, task: &TaskId, attempt: Attempt, what: &str) {
    info!(task = %task, attempt, "discarding stale {what}");
    state.activity.record(
        Agent::Orchestrator,
        format!("Discarded a stale {what} for \"{task}\"; the task has moved on."),
    );
}
