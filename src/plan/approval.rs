// src/plan/approval.rs

//! Approval requests and their resolution.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{AgentplanError, Result};
use crate::plan::lifecycle::Transition;
use crate::plan::task::{ActivityLogEntry, Approval, ApprovalId, Task, TaskId};
use crate::types::{Agent, ApprovalStatus, TaskStatus};

/// Human decision on a pending approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Accept the draft, optionally with operator edits.
    Approve { edited_content: Option<String> },
    /// Send the task back, optionally with a replacement instruction.
    Reject { instruction: Option<String> },
}

/// Pending approvals plus the history of resolved ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalBook {
    pending: Vec<Approval>,
    resolved: Vec<Approval>,
    next_id: u64,
}

impl ApprovalBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[Approval] {
        &self.pending
    }

    pub fn resolved(&self) -> &[Approval] {
        &self.resolved
    }

    pub fn pending_for(&self, task: &TaskId) -> Option<&Approval> {
        self.pending.iter().find(|a| &a.task_id == task)
    }

    /// Open a pending approval for `task` carrying `content`.
    ///
    /// Fails if the task already has a pending approval.
    pub fn open(&mut self, task: &Task, content: String) -> Result<ApprovalId> {
        if self.pending_for(&task.id).is_some() {
            return Err(AgentplanError::invalid(
                &task.id,
                "an approval is already pending for this task",
            ));
        }

        self.next_id += 1;
        let id = ApprovalId(self.next_id);
        self.pending.push(Approval {
            id,
            task_id: task.id.clone(),
            agent: task.assigned_agent,
            title: task.title.clone(),
            content,
            status: ApprovalStatus::Pending,
        });
        debug!(task = %task.id, approval = %id, "approval opened");
        Ok(id)
    }

    /// Silently withdraw any pending approval for `task`.
    pub fn withdraw(&mut self, task: &TaskId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|a| &a.task_id != task);
        before - self.pending.len()
    }

    /// Drop every pending approval (plan reset or new plan revision).
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Remove `id` from the pending set, so each approval resolves once.
    fn take(&mut self, id: ApprovalId) -> Result<Approval> {
        let pos = self
            .pending
            .iter()
            .position(|a| a.id == id)
            .ok_or(AgentplanError::ApprovalNotFound(id.0))?;
        Ok(self.pending.remove(pos))
    }

    /// Apply a human decision to the related task.
    ///
    /// `allow_instruction` gates whether a rejection may carry a replacement
    /// instruction into the task's `custom_prompt`.
    pub fn resolve(
        &mut self,
        tasks: &[Task],
        id: ApprovalId,
        decision: ApprovalDecision,
        allow_instruction: bool,
    ) -> Result<Transition> {
        let mut approval = self.take(id)?;
        let mut next = tasks.to_vec();
        let mut log = Vec::new();

        let Some(task) = next.iter_mut().find(|t| t.id == approval.task_id) else {
            warn!(approval = %id, task = %approval.task_id, "approval resolved for a task no longer in the plan");
            approval.status = match decision {
                ApprovalDecision::Approve { .. } => ApprovalStatus::Approved,
                ApprovalDecision::Reject { .. } => ApprovalStatus::Rejected,
            };
            self.resolved.push(approval);
            return Ok(Transition { tasks: next, log });
        };

        match decision {
            ApprovalDecision::Approve { edited_content } => {
                let edited = edited_content.is_some();
                task.status = TaskStatus::Completed;
                task.progress = 100;
                task.approved_content = Some(edited_content.unwrap_or_else(|| approval.content.clone()));
                task.custom_prompt = None;
                approval.status = ApprovalStatus::Approved;

                log.push(ActivityLogEntry::now(
                    Agent::Orchestrator,
                    if edited {
                        format!("Approved \"{}\" with edits.", task.title)
                    } else {
                        format!("Approved \"{}\".", task.title)
                    },
                ));
                log.push(ActivityLogEntry::now(
                    task.assigned_agent,
                    format!("Publishing approved work for \"{}\".", task.title),
                ));
            }
            ApprovalDecision::Reject { instruction } => {
                task.status = TaskStatus::InProgress;
                task.progress = 0;
                task.retries = 0;
                task.approved_content = None;
                approval.status = ApprovalStatus::Rejected;

                let instruction = instruction.filter(|_| allow_instruction);
                let message = match instruction.as_deref() {
                    Some(text) => format!(
                        "Rejected \"{}\". New instruction: {text}",
                        task.title
                    ),
                    None => format!("Rejected \"{}\".", task.title),
                };
                if let Some(text) = instruction {
                    task.custom_prompt = Some(text);
                }

                log.push(ActivityLogEntry::now(Agent::Orchestrator, message));
                log.push(ActivityLogEntry::now(
                    task.assigned_agent,
                    format!("Reworking \"{}\".", task.title),
                ));
            }
        }

        self.resolved.push(approval);
        Ok(Transition { tasks: next, log })
    }
}
