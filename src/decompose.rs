// src/decompose.rs

//! Goal decomposition collaborator.
//!
//! A decomposer turns a free-text goal into an ordered task list. The engine
//! treats a successful result as a brand-new plan revision.

use std::future::Future;
use std::pin::Pin;

use anyhow::{bail, Result};
use tracing::debug;

use crate::plan::lifecycle::reset_for_rerun;
use crate::plan::task::Task;

pub trait Decomposer: Send + Sync {
    fn decompose<'a>(
        &'a self,
        goal: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Task>>> + Send + 'a>>;
}

/// Answers every goal with the task list of the loaded plan file.
#[derive(Debug, Clone)]
pub struct PlanFileDecomposer {
    tasks: Vec<Task>,
}

impl PlanFileDecomposer {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }
}

impl Decomposer for PlanFileDecomposer {
    fn decompose<'a>(
        &'a self,
        goal: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Task>>> + Send + 'a>> {
        Box::pin(async move {
            if self.tasks.is_empty() {
                bail!("the plan file defines no tasks for \"{goal}\"");
            }
            debug!(%goal, tasks = self.tasks.len(), "decomposed goal from plan file");
            Ok(reset_for_rerun(&self.tasks))
        })
    }
}
