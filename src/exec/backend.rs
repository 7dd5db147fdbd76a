// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`super::executor_loop`].
//!
//! - `RealExecutorBackend` is the default implementation used by `agentplan`.
//!   It wraps the `spawn_executor` loop and forwards requests over an mpsc
//!   channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were dispatched and directly emits result events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::{Dispatch, RuntimeEvent};
use crate::errors::{Error, Result};
use crate::plan::task::TaskId;

use super::content::ContentGenerator;
use super::executor_loop::{spawn_executor, ExecutorRequest};
use super::SimulationSettings;

/// Trait abstracting how dispatched tasks are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't run generators or timers.
pub trait ExecutorBackend: Send {
    /// Start executing the given dispatches.
    fn dispatch(
        &mut self,
        dispatches: Vec<Dispatch>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop in-flight executions for these tasks, if the strategy allows it.
    fn cancel(
        &mut self,
        tasks: Vec<TaskId>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ExecutorRequest>,
}

impl RealExecutorBackend {
    /// Create a new real executor backend, wiring it to the given runtime
    /// event sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        generator: Arc<dyn ContentGenerator>,
        simulation: SimulationSettings,
    ) -> Self {
        let tx = spawn_executor(runtime_tx, generator, simulation);
        Self { tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn dispatch(
        &mut self,
        dispatches: Vec<Dispatch>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for dispatch in dispatches {
                tx.send(ExecutorRequest::Run(dispatch))
                    .await
                    .map_err(Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel(
        &mut self,
        tasks: Vec<TaskId>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(ExecutorRequest::Cancel(task))
                    .await
                    .map_err(Error::from)?;
            }
            Ok(())
        })
    }
}
