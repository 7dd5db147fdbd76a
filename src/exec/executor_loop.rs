// src/exec/executor_loop.rs

//! Main executor loop that manages in-flight executions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::engine::{Attempt, Dispatch, RuntimeEvent};
use crate::exec::content::ContentGenerator;
use crate::exec::task_runner::run_dispatch;
use crate::exec::SimulationSettings;
use crate::plan::task::TaskId;

/// Requests accepted by the executor loop.
#[derive(Debug)]
pub enum ExecutorRequest {
    Run(Dispatch),
    Cancel(TaskId),
}

/// Internal handle for a currently-executing attempt.
///
/// - `cancel` asks the runner to stop (honoured by simulated work).
/// - `handle` is the Tokio task that is actually running the attempt.
struct ActiveExecution {
    attempt: Attempt,
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ExecutorRequest>` is what
/// `RealExecutorBackend` uses. Each dispatch runs in its own Tokio task, and
/// **per task id there is at most one runner alive**: a newer attempt for
/// the same task cancels the older one before starting.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    generator: Arc<dyn ContentGenerator>,
    simulation: SimulationSettings,
) -> mpsc::Sender<ExecutorRequest> {
    let (tx, mut rx) = mpsc::channel::<ExecutorRequest>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<TaskId, ActiveExecution> = HashMap::new();

        while let Some(request) = rx.recv().await {
            match request {
                ExecutorRequest::Run(dispatch) => {
                    start_execution(dispatch, &mut active, &runtime_tx, &generator, simulation);
                }
                ExecutorRequest::Cancel(task) => {
                    if let Some(mut existing) = active.remove(&task) {
                        cancel_execution(&task, &mut existing);
                    }
                }
            }
            active.retain(|_, execution| !execution.handle.is_finished());
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn start_execution(
    dispatch: Dispatch,
    active: &mut HashMap<TaskId, ActiveExecution>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    generator: &Arc<dyn ContentGenerator>,
    simulation: SimulationSettings,
) {
    let id = dispatch.task.id.clone();

    if let Some(mut existing) = active.remove(&id) {
        if !existing.handle.is_finished() {
            cancel_execution(&id, &mut existing);
        }
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let rt_tx = runtime_tx.clone();
    let generator = Arc::clone(generator);
    let attempt = dispatch.attempt;
    let spawn_id = id.clone();

    let handle = tokio::spawn(async move {
        run_dispatch(dispatch, generator, simulation, rt_tx, cancel_rx).await;
        debug!(task = %spawn_id, attempt, "runner future finished");
    });

    active.insert(
        id,
        ActiveExecution {
            attempt,
            cancel: Some(cancel_tx),
            handle,
        },
    );
}

fn cancel_execution(task: &TaskId, existing: &mut ActiveExecution) {
    info!(
        task = %task,
        attempt = existing.attempt,
        "cancelling in-flight execution"
    );

    if let Some(cancel) = existing.cancel.take() {
        if cancel.send(()).is_err() {
            debug!(
                task = %task,
                attempt = existing.attempt,
                "execution already finished while cancelling"
            );
        }
    }
}
