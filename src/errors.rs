// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentplanError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Approval not found or already resolved: {0}")]
    ApprovalNotFound(u64),

    #[error("Invalid transition for task '{task}': {reason}")]
    InvalidTransition { task: String, reason: String },

    #[error("Goal decomposition failed: {0}")]
    Decomposition(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentplanError {
    pub(crate) fn invalid(task: impl ToString, reason: impl Into<String>) -> Self {
        AgentplanError::InvalidTransition {
            task: task.to_string(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AgentplanError>;
