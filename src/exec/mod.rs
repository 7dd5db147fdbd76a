// src/exec/mod.rs

//! Execution layer.
//!
//! This module actually carries out dispatched tasks and reports back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the background loop that keeps one cancellable
//!   handle per executing task.
//! - [`task_runner`] runs a single attempt with either strategy.
//! - [`content`] provides the content-generation collaborator.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

use std::time::Duration;

pub mod backend;
pub mod content;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use content::{CommandGenerator, ContentGenerator, DraftGenerator};
pub use executor_loop::{spawn_executor, ExecutorRequest};

/// Timing of the simulated (progress-ramp) strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationSettings {
    /// Bounds of the randomly drawn total ramp duration.
    pub min_duration: Duration,
    pub max_duration: Duration,
    /// Interval between progress ticks.
    pub tick: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_secs(2),
            max_duration: Duration::from_secs(5),
            tick: Duration::from_millis(500),
        }
    }
}
