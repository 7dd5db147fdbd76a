// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::decompose::Decomposer;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::storage::StateStore;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, Dispatch, OperatorIntent, PlanState, RuntimeEvent};

/// Drives the plan in response to `RuntimeEvent`s and delegates execution,
/// decomposition and persistence to its collaborators.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, handing executions to the executor and running the unattended
/// operator when enabled.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    event_tx: mpsc::Sender<RuntimeEvent>,
    executor: E,
    decomposer: Arc<dyn Decomposer>,
    state_store: Option<Box<dyn StateStore>>,
    initial_intents: Vec<OperatorIntent>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    /// `event_tx` must feed `event_rx`; decomposition results are posted
    /// back through it.
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        executor: E,
        decomposer: Arc<dyn Decomposer>,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            decomposer,
            state_store: None,
            initial_intents: Vec::new(),
        }
    }

    pub fn with_state_store(mut self, store: Box<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Intents applied before the first settle pass (e.g. the goal given
    /// on the command line).
    pub fn with_initial_intents(mut self, intents: Vec<OperatorIntent>) -> Self {
        self.initial_intents = intents;
        self
    }

    /// Main event loop.
    ///
    /// - Applies the initial intents, then the initial settle/dispatch pass.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them into the core.
    /// - Executes commands returned by the core.
    ///
    /// Returns the final plan snapshot.
    pub async fn run(mut self) -> Result<PlanState> {
        info!("agentplan runtime started");

        let mut running = true;
        for intent in std::mem::take(&mut self.initial_intents) {
            let step = self.core.step(RuntimeEvent::Operator(intent));
            running = self.apply(step).await?;
            if !running {
                break;
            }
        }
        if running {
            let step = self.core.start();
            running = self.apply(step).await?;
        }

        while running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            running = self.apply(step).await?;
            if !running {
                info!("core requested exit; stopping runtime");
            }
        }

        info!("runtime exiting");
        Ok(self.core.plan_state())
    }

    /// Execute a step's commands, then let the unattended operator act on
    /// the result until it has nothing left to do. Returns whether the loop
    /// should keep running.
    async fn apply(&mut self, mut step: CoreStep) -> Result<bool> {
        let mut previous_backlog = Vec::new();

        loop {
            for command in std::mem::take(&mut step.commands) {
                self.execute_command(command).await?;
            }
            if !step.keep_running {
                return Ok(false);
            }
            if !self.core.options().auto_operator {
                return Ok(true);
            }

            let backlog = self.core.operator_backlog();
            if backlog.is_empty() {
                return Ok(true);
            }
            if backlog == previous_backlog {
                warn!(?backlog, "unattended operator made no progress; waiting for events");
                return Ok(true);
            }

            let mut next = CoreStep::proceed(Vec::new());
            for intent in backlog.iter().cloned() {
                debug!(?intent, "unattended operator acting");
                let s = self.core.step(RuntimeEvent::Operator(intent));
                next.commands.extend(s.commands);
                if !s.keep_running {
                    next.keep_running = false;
                    break;
                }
            }
            previous_backlog = backlog;
            step = next;
        }
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Dispatch(dispatches) => {
                self.spawn_ready(dispatches).await?;
            }
            CoreCommand::Cancel(tasks) => {
                debug!(?tasks, "cancelling executions");
                self.executor.cancel(tasks).await?;
            }
            CoreCommand::Decompose { goal } => {
                self.spawn_decomposition(goal);
            }
            CoreCommand::Persist(state) => {
                if let Some(store) = &self.state_store {
                    // Persistence failures never affect the in-memory plan.
                    if let Err(err) = store.save(&state) {
                        warn!(error = %err, "failed to persist plan state");
                    }
                }
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, dispatches: Vec<Dispatch>) -> Result<()> {
        if dispatches.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = dispatches.iter().map(|d| d.task.id.as_str()).collect();
        let attempts: Vec<_> = dispatches.iter().map(|d| d.attempt).collect();
        debug!(?ids, ?attempts, "dispatching executions");

        self.executor.dispatch(dispatches).await
    }

    fn spawn_decomposition(&self, goal: String) {
        let decomposer = Arc::clone(&self.decomposer);
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            info!(%goal, "decomposing goal");
            let event = match decomposer.decompose(&goal).await {
                Ok(tasks) => RuntimeEvent::PlanDecomposed { goal, tasks },
                Err(err) => RuntimeEvent::DecompositionFailed {
                    goal,
                    error: format!("{err:#}"),
                },
            };
            if tx.send(event).await.is_err() {
                debug!("runtime gone before decomposition finished");
            }
        });
    }
}
