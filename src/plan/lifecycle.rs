// src/plan/lifecycle.rs

//! Task lifecycle rules.
//!
//! Every function here is pure: it takes a snapshot of the task collection
//! and returns a [`Transition`] holding the next collection plus the
//! activity entries describing what changed. The engine commits the result
//! through [`crate::plan::TaskStore::commit`].

use std::collections::HashSet;

use tracing::debug;

use crate::errors::{AgentplanError, Result};
use crate::plan::graph::{container_ids, deps_completed};
use crate::plan::task::{ActivityLogEntry, Task, TaskId, MAX_DURATION_DAYS};
use crate::types::{Agent, TaskStatus};

/// Knobs that change lifecycle behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Failed attempts allowed before a task is marked `Failed`.
    pub max_retries: u32,
    /// Treat tasks referenced as `parent_id` as derived containers.
    pub container_tasks: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            container_tasks: true,
        }
    }
}

impl LifecyclePolicy {
    /// Container ids under this policy (empty when containers are disabled).
    pub fn containers(&self, tasks: &[Task]) -> HashSet<TaskId> {
        if self.container_tasks {
            container_ids(tasks)
        } else {
            HashSet::new()
        }
    }
}

/// Next task collection plus the activity entries that explain it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub tasks: Vec<Task>,
    pub log: Vec<ActivityLogEntry>,
}

impl Transition {
    fn unchanged(tasks: &[Task]) -> Self {
        Self {
            tasks: tasks.to_vec(),
            log: Vec::new(),
        }
    }
}

/// What happened to a task after an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The task stays `InProgress` and will be dispatched again.
    Retrying { attempt: u32 },
    /// Retries are exhausted; the task is now `Failed`.
    Exhausted,
}

/// Optional field overrides for [`edit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub estimated_duration: Option<u32>,
    pub custom_prompt: Option<String>,
}

/// Promote pending leaf tasks whose dependencies are all completed, or
/// which carry a fixed start date, to `InProgress`.
pub fn activate(tasks: &[Task], policy: &LifecyclePolicy) -> Transition {
    let containers = policy.containers(tasks);
    let mut next = tasks.to_vec();
    let mut log = Vec::new();

    for task in next.iter_mut() {
        if task.status != TaskStatus::Pending || containers.contains(&task.id) {
            continue;
        }
        if task.start_date.is_some() || deps_completed(task, tasks) {
            debug!(task = %task.id, "dependencies satisfied; activating");
            task.status = TaskStatus::InProgress;
            log.push(ActivityLogEntry::now(
                task.assigned_agent,
                format!("Starting \"{}\".", task.title),
            ));
        }
    }

    Transition { tasks: next, log }
}

/// Recompute status and progress of every container from its children.
pub fn rollup(tasks: &[Task], policy: &LifecyclePolicy) -> Transition {
    if !policy.container_tasks {
        return Transition::unchanged(tasks);
    }

    let containers = container_ids(tasks);
    let mut next = tasks.to_vec();
    let mut log = Vec::new();

    for container in next.iter_mut().filter(|t| containers.contains(&t.id)) {
        let children: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.parent_id.as_ref() == Some(&container.id) && t.id != container.id)
            .collect();
        let total = children.len();
        let completed = children
            .iter()
            .filter(|c| c.status == TaskStatus::Completed)
            .count();

        container.progress = rounded_percent(completed, total);
        container.retries = 0;

        if matches!(
            container.status,
            TaskStatus::Failed | TaskStatus::AwaitingApproval
        ) {
            container.status = TaskStatus::InProgress;
        }

        if completed == total && total > 0 {
            if container.status != TaskStatus::Completed {
                container.status = TaskStatus::Completed;
                log.push(ActivityLogEntry::now(
                    Agent::Orchestrator,
                    format!("\"{}\": all sub-tasks complete.", container.title),
                ));
            }
        } else if container.status == TaskStatus::Completed {
            container.status = TaskStatus::InProgress;
            log.push(ActivityLogEntry::now(
                Agent::Orchestrator,
                format!(
                    "\"{}\": sub-task no longer complete, reverting.",
                    container.title
                ),
            ));
        } else if container.status == TaskStatus::Pending
            && children
                .iter()
                .any(|c| c.start_date.is_some() || deps_completed(c, tasks))
        {
            container.status = TaskStatus::InProgress;
            log.push(ActivityLogEntry::now(
                Agent::Orchestrator,
                format!("Kicking off \"{}\".", container.title),
            ));
        }
    }

    Transition { tasks: next, log }
}

/// Run activation and rollup until neither changes anything.
///
/// Bounded by the task count so malformed input cannot loop forever.
pub fn settle(tasks: &[Task], policy: &LifecyclePolicy) -> Transition {
    let mut current = tasks.to_vec();
    let mut log = Vec::new();

    for _ in 0..=tasks.len() + 1 {
        let activated = activate(&current, policy);
        let rolled = rollup(&activated.tasks, policy);
        let changed = rolled.tasks != current;

        log.extend(activated.log);
        log.extend(rolled.log);
        current = rolled.tasks;

        if !changed {
            break;
        }
    }

    Transition {
        tasks: current,
        log,
    }
}

/// Apply the bounded retry policy after an execution error.
///
/// The attempt that just failed is `retries + 1`; once that reaches
/// `max_retries` the task is marked `Failed`.
pub fn record_failure(
    tasks: &[Task],
    id: &TaskId,
    error: &str,
    policy: &LifecyclePolicy,
) -> Result<(Transition, FailureOutcome)> {
    let mut next = tasks.to_vec();
    let task = find_mut(&mut next, id)?;

    if task.status != TaskStatus::InProgress {
        return Err(AgentplanError::invalid(
            id,
            format!("cannot record a failure while {}", task.status),
        ));
    }

    let max = policy.max_retries.max(1);
    let failed_attempt = task.retries + 1;
    task.progress = 0;

    let (entry, outcome) = if failed_attempt < max {
        task.retries = failed_attempt;
        (
            ActivityLogEntry::now(
                task.assigned_agent,
                format!(
                    "Attempt {failed_attempt}/{max} on \"{}\" failed ({error}); retrying.",
                    task.title
                ),
            ),
            FailureOutcome::Retrying {
                attempt: failed_attempt,
            },
        )
    } else {
        task.retries = max;
        task.status = TaskStatus::Failed;
        (
            ActivityLogEntry::now(
                task.assigned_agent,
                format!(
                    "\"{}\" failed after {max} attempts ({error}). Needs reassignment.",
                    task.title
                ),
            ),
            FailureOutcome::Exhausted,
        )
    };

    Ok((
        Transition {
            tasks: next,
            log: vec![entry],
        },
        outcome,
    ))
}

/// Record simulated progress on an in-progress task.
pub fn record_progress(tasks: &[Task], id: &TaskId, progress: u8) -> Result<Transition> {
    let mut next = tasks.to_vec();
    let task = find_mut(&mut next, id)?;

    if task.status != TaskStatus::InProgress {
        return Err(AgentplanError::invalid(
            id,
            format!("cannot record progress while {}", task.status),
        ));
    }

    task.progress = progress.min(100);
    let log = if task.progress == 100 {
        vec![ActivityLogEntry::now(
            task.assigned_agent,
            format!("\"{}\" is done and ready to be marked complete.", task.title),
        )]
    } else {
        Vec::new()
    };

    Ok(Transition { tasks: next, log })
}

/// Park a task behind a freshly created approval request.
///
/// `consumed` is the instruction the finished attempt ran with. The task's
/// prompt is only cleared when it still matches; a prompt edited in while
/// the attempt was running has not been used yet and is kept.
pub fn await_approval(tasks: &[Task], id: &TaskId, consumed: Option<&str>) -> Result<Transition> {
    let mut next = tasks.to_vec();
    let task = find_mut(&mut next, id)?;

    task.status = TaskStatus::AwaitingApproval;
    task.progress = 100;
    if task.custom_prompt.as_deref() == consumed {
        task.custom_prompt = None;
    }
    let entry = ActivityLogEntry::now(
        task.assigned_agent,
        format!("Draft for \"{}\" is ready for review.", task.title),
    );

    Ok(Transition {
        tasks: next,
        log: vec![entry],
    })
}

/// Operator completion.
///
/// Without `force` the task's automated work must be finished (`progress ==
/// 100`) and its agent must not require approval. With `force` any
/// non-container task that is not already completed may be completed.
pub fn complete_manually(
    tasks: &[Task],
    id: &TaskId,
    force: bool,
    policy: &LifecyclePolicy,
) -> Result<Transition> {
    ensure_not_container(tasks, id, policy)?;

    let mut next = tasks.to_vec();
    let task = find_mut(&mut next, id)?;

    if task.status == TaskStatus::Completed {
        return Err(AgentplanError::invalid(id, "task is already completed"));
    }
    if !force {
        if task.assigned_agent.requires_approval() {
            return Err(AgentplanError::invalid(
                id,
                "work from this agent must go through approval",
            ));
        }
        if task.status != TaskStatus::InProgress || task.progress < 100 {
            return Err(AgentplanError::invalid(
                id,
                format!(
                    "automated work is not finished ({}, {}%)",
                    task.status, task.progress
                ),
            ));
        }
    }

    task.status = TaskStatus::Completed;
    task.progress = 100;
    task.custom_prompt = None;
    let entry = ActivityLogEntry::now(
        task.assigned_agent,
        format!("\"{}\" marked complete by operator.", task.title),
    );

    Ok(Transition {
        tasks: next,
        log: vec![entry],
    })
}

/// Move a task to another worker and restart it from scratch.
pub fn reassign(
    tasks: &[Task],
    id: &TaskId,
    agent: Agent,
    policy: &LifecyclePolicy,
) -> Result<Transition> {
    ensure_not_container(tasks, id, policy)?;

    let mut next = tasks.to_vec();
    let task = find_mut(&mut next, id)?;

    if agent.is_orchestrator() {
        return Err(AgentplanError::invalid(
            id,
            "the orchestrator cannot be assigned executable work",
        ));
    }
    if agent == task.assigned_agent {
        return Err(AgentplanError::invalid(
            id,
            format!("task is already assigned to {agent}"),
        ));
    }
    if task.status == TaskStatus::Completed {
        return Err(AgentplanError::invalid(id, "task is already completed"));
    }

    let previous = task.assigned_agent;
    task.assigned_agent = agent;
    task.retries = 0;
    task.progress = 0;
    task.approved_content = None;
    if task.status != TaskStatus::Pending {
        task.status = TaskStatus::InProgress;
    }

    let entry = ActivityLogEntry::now(
        Agent::Orchestrator,
        format!(
            "Reassigned \"{}\" from {previous} to {agent}.",
            task.title
        ),
    );

    Ok(Transition {
        tasks: next,
        log: vec![entry],
    })
}

/// Apply operator edits to task text, duration or instruction.
pub fn edit(tasks: &[Task], id: &TaskId, patch: TaskPatch) -> Result<Transition> {
    let mut next = tasks.to_vec();
    let task = find_mut(&mut next, id)?;

    match patch.estimated_duration {
        Some(0) => return Err(AgentplanError::invalid(id, "duration must be at least one day")),
        Some(days) if days > MAX_DURATION_DAYS => {
            return Err(AgentplanError::invalid(
                id,
                format!("duration must be at most {MAX_DURATION_DAYS} days"),
            ));
        }
        _ => {}
    }

    if let Some(title) = patch.title {
        task.title = title;
    }
    if let Some(description) = patch.description {
        task.description = description;
    }
    if let Some(days) = patch.estimated_duration {
        task.estimated_duration = days;
    }
    if let Some(prompt) = patch.custom_prompt {
        task.custom_prompt = Some(prompt);
    }

    let entry = ActivityLogEntry::now(
        Agent::Orchestrator,
        format!("Updated \"{}\".", task.title),
    );

    Ok(Transition {
        tasks: next,
        log: vec![entry],
    })
}

/// Reset every task so a committed plan revision re-runs from scratch.
pub fn reset_for_rerun(tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .cloned()
        .map(|mut t| {
            t.reset_execution();
            t
        })
        .collect()
}

fn rounded_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // round-half-up of 100 * completed / total
    ((200 * completed + total) / (2 * total)).min(100) as u8
}

fn find_mut<'a>(tasks: &'a mut [Task], id: &TaskId) -> Result<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|t| &t.id == id)
        .ok_or_else(|| AgentplanError::TaskNotFound(id.to_string()))
}

fn ensure_not_container(tasks: &[Task], id: &TaskId, policy: &LifecyclePolicy) -> Result<()> {
    if policy.containers(tasks).contains(id) {
        return Err(AgentplanError::invalid(
            id,
            "container status is derived from its sub-tasks",
        ));
    }
    Ok(())
}
