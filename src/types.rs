// src/types.rs

//! Small shared enums used across the plan, scheduler and engine layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
///
/// ```text
/// Pending --[deps satisfied | start_date set]--> InProgress
/// InProgress --[content ready]--> AwaitingApproval
/// AwaitingApproval --[approved]--> Completed
/// AwaitingApproval --[rejected]--> InProgress
/// InProgress --[retries exhausted]--> Failed
/// Failed --[reassigned]--> InProgress
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    AwaitingApproval,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::AwaitingApproval => "awaiting_approval",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.pad(s)
    }
}

/// Resolution state of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// How a task assigned to a given agent is driven to completion.
///
/// - `Content`: an external generator produces text that a human approves.
/// - `Simulated`: progress ramps up on a timer and the operator marks the
///   task completed by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    Content,
    Simulated,
}

/// The fixed roster of worker identities.
///
/// `Orchestrator` plans and narrates; it is never assigned executable work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    Orchestrator,
    Marketing,
    Outreach,
    Logistics,
}

impl Agent {
    pub const ALL: [Agent; 4] = [
        Agent::Orchestrator,
        Agent::Marketing,
        Agent::Outreach,
        Agent::Logistics,
    ];

    /// Execution strategy for tasks assigned to this agent, or `None` for the
    /// orchestrator.
    pub fn strategy(self) -> Option<ExecutionStrategy> {
        match self {
            Agent::Orchestrator => None,
            Agent::Marketing | Agent::Outreach => Some(ExecutionStrategy::Content),
            Agent::Logistics => Some(ExecutionStrategy::Simulated),
        }
    }

    /// Whether finished work from this agent must be approved by a human.
    pub fn requires_approval(self) -> bool {
        matches!(self.strategy(), Some(ExecutionStrategy::Content))
    }

    pub fn is_orchestrator(self) -> bool {
        self == Agent::Orchestrator
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Agent::Orchestrator => "orchestrator",
            Agent::Marketing => "marketing",
            Agent::Outreach => "outreach",
            Agent::Logistics => "logistics",
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Agent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "orchestrator" => Ok(Agent::Orchestrator),
            "marketing" => Ok(Agent::Marketing),
            "outreach" => Ok(Agent::Outreach),
            "logistics" => Ok(Agent::Logistics),
            other => Err(format!(
                "invalid agent: {other} (expected one of orchestrator, marketing, outreach, logistics)"
            )),
        }
    }
}

/// Operator-facing status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Working,
    Error,
}
