// src/exec/content.rs

//! Content-generation collaborator.
//!
//! The engine only needs "given a task, eventually return text or an error";
//! how the text is produced is up to the implementation.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::plan::task::Task;

pub trait ContentGenerator: Send + Sync {
    /// Produce a draft for `task`. A task's `custom_prompt`, when set,
    /// replaces its description as the instruction.
    fn generate<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// The instruction a generator should follow for `task`.
pub fn instruction_for(task: &Task) -> &str {
    task.custom_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(&task.description)
}

/// Runs a shell command per task and takes its stdout as the draft.
///
/// The task is described to the command through environment variables:
/// `AGENTPLAN_TASK_ID`, `AGENTPLAN_TASK_TITLE`, `AGENTPLAN_AGENT` and
/// `AGENTPLAN_PROMPT`.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    cmd: String,
}

impl CommandGenerator {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    async fn run(&self, task: &Task) -> Result<String> {
        info!(task = %task.id, cmd = %self.cmd, "running content command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.env("AGENTPLAN_TASK_ID", task.id.as_str())
            .env("AGENTPLAN_TASK_TITLE", &task.title)
            .env("AGENTPLAN_AGENT", task.assigned_agent.as_str())
            .env("AGENTPLAN_PROMPT", instruction_for(task))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("spawning content command for task '{}'", task.id))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(task = %task.id, "stderr: {}", line);
        }

        if !output.status.success() {
            bail!(
                "content command exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let content = String::from_utf8(output.stdout)
            .context("content command produced non-UTF-8 output")?;
        let content = content.trim().to_string();
        if content.is_empty() {
            bail!("content command produced no output");
        }
        Ok(content)
    }
}

impl ContentGenerator for CommandGenerator {
    fn generate<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.run(task))
    }
}

/// Built-in generator used when no content command is configured. It
/// writes a short templated draft from the task itself.
#[derive(Debug, Clone, Default)]
pub struct DraftGenerator;

impl ContentGenerator for DraftGenerator {
    fn generate<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let body = instruction_for(task);
            Ok(format!(
                "[{} draft] {}\n\n{}",
                task.assigned_agent,
                task.title,
                if body.is_empty() { "(no brief provided)" } else { body }
            ))
        })
    }
}
