// src/exec/task_runner.rs

//! Single-attempt runner for both execution strategies.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, error, info};

use crate::engine::{Attempt, Dispatch, RuntimeEvent};
use crate::exec::content::ContentGenerator;
use crate::exec::SimulationSettings;
use crate::plan::task::TaskId;
use crate::types::ExecutionStrategy;

/// Run one execution attempt and report its result.
///
/// - Content work always runs to completion; if the task moved on in the
///   meantime the core discards the result by attempt number.
/// - Simulated work stops silently when the cancel channel fires, and emits
///   no further events for that attempt.
pub async fn run_dispatch(
    dispatch: Dispatch,
    generator: Arc<dyn ContentGenerator>,
    simulation: SimulationSettings,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let task = dispatch.task.id.clone();
    let attempt = dispatch.attempt;

    let result = match dispatch.strategy {
        ExecutionStrategy::Content => run_content(dispatch, generator, &runtime_tx).await,
        ExecutionStrategy::Simulated => {
            run_simulated(dispatch, simulation, &runtime_tx, cancel_rx).await
        }
    };

    if let Err(err) = result {
        error!(task = %task, attempt, error = %err, "execution error");
        let _ = runtime_tx
            .send(RuntimeEvent::ExecutionFailed {
                task,
                attempt,
                error: format!("{err:#}"),
            })
            .await;
    }
}

async fn run_content(
    dispatch: Dispatch,
    generator: Arc<dyn ContentGenerator>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> Result<()> {
    let Dispatch { task, attempt, .. } = dispatch;
    info!(task = %task.id, attempt, agent = %task.assigned_agent, "generating content");

    let content = generator
        .generate(&task)
        .await
        .with_context(|| format!("generating content for task '{}'", task.id))?;

    debug!(task = %task.id, attempt, bytes = content.len(), "content generated");
    send(
        runtime_tx,
        RuntimeEvent::ContentGenerated {
            task: task.id,
            attempt,
            content,
        },
    )
    .await
}

async fn run_simulated(
    dispatch: Dispatch,
    simulation: SimulationSettings,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<()> {
    let id = dispatch.task.id;
    let attempt = dispatch.attempt;
    let start_progress = dispatch.task.progress.min(100);
    let total = ramp_duration(&simulation);

    info!(task = %id, attempt, ?total, from = start_progress, "starting simulated work");

    let started = Instant::now();
    let mut ticks = time::interval(simulation.tick.max(Duration::from_millis(1)));
    // The first tick completes immediately.
    ticks.tick().await;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let progress = ramp_progress(start_progress, started.elapsed(), total);
                send_tick(runtime_tx, &id, attempt, progress).await?;
                if progress >= 100 {
                    debug!(task = %id, attempt, "simulated work finished");
                    return Ok(());
                }
            }
            cancel = &mut cancel_rx => {
                match cancel {
                    Ok(()) => info!(task = %id, attempt, "simulated work cancelled"),
                    Err(_) => debug!(task = %id, attempt, "cancel channel closed; stopping simulated work"),
                }
                return Ok(());
            }
        }
    }
}

/// Progress after `elapsed` of a ramp lasting `total`, starting at `from`.
pub fn ramp_progress(from: u8, elapsed: Duration, total: Duration) -> u8 {
    if total.is_zero() {
        return 100;
    }
    let fraction = (elapsed.as_secs_f64() / total.as_secs_f64()).min(1.0);
    let remaining = f64::from(100 - from.min(100));
    (f64::from(from) + remaining * fraction).round().min(100.0) as u8
}

fn ramp_duration(simulation: &SimulationSettings) -> Duration {
    let min = simulation.min_duration.as_millis() as u64;
    let max = (simulation.max_duration.as_millis() as u64).max(min);
    let millis = rand::thread_rng().gen_range(min..=max);
    Duration::from_millis(millis)
}

async fn send_tick(
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    task: &TaskId,
    attempt: Attempt,
    progress: u8,
) -> Result<()> {
    send(
        runtime_tx,
        RuntimeEvent::ProgressTick {
            task: task.clone(),
            attempt,
            progress,
        },
    )
    .await
}

async fn send(runtime_tx: &mpsc::Sender<RuntimeEvent>, event: RuntimeEvent) -> Result<()> {
    runtime_tx
        .send(event)
        .await
        .context("sending execution event to runtime")
}
