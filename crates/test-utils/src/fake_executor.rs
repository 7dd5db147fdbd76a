use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use agentplan::decompose::Decomposer;
use agentplan::engine::{Attempt, Dispatch, RuntimeEvent};
use agentplan::errors::Result;
use agentplan::exec::{ContentGenerator, ExecutorBackend};
use agentplan::exec::content::instruction_for;
use agentplan::plan::task::{Task, TaskId};
use agentplan::types::ExecutionStrategy;
use tokio::sync::mpsc;

/// What the fake executor does with one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeOutcome {
    /// Report generated content.
    Content(String),
    /// Report an execution failure.
    Fail(String),
    /// Report these progress ticks in order.
    Progress(Vec<u8>),
    /// Record the dispatch and report nothing; the test drives the result.
    Hold,
}

#[derive(Debug, Default)]
struct Shared {
    script: HashMap<TaskId, VecDeque<FakeOutcome>>,
    dispatched: Vec<(TaskId, Attempt)>,
    cancelled: Vec<TaskId>,
}

/// Inspection handle shared with a [`FakeExecutor`].
#[derive(Debug, Clone, Default)]
pub struct FakeExecutorHandle {
    shared: Arc<Mutex<Shared>>,
}

impl FakeExecutorHandle {
    /// Every dispatch seen so far, in order.
    pub fn dispatched(&self) -> Vec<(TaskId, Attempt)> {
        self.shared.lock().unwrap().dispatched.clone()
    }

    pub fn dispatch_count(&self, task: &str) -> usize {
        self.shared
            .lock()
            .unwrap()
            .dispatched
            .iter()
            .filter(|(id, _)| id.as_str() == task)
            .count()
    }

    /// Latest attempt dispatched for `task`.
    pub fn last_attempt(&self, task: &str) -> Option<Attempt> {
        self.shared
            .lock()
            .unwrap()
            .dispatched
            .iter()
            .rev()
            .find(|(id, _)| id.as_str() == task)
            .map(|(_, attempt)| *attempt)
    }

    pub fn cancelled(&self) -> Vec<TaskId> {
        self.shared.lock().unwrap().cancelled.clone()
    }
}

/// A fake executor that:
/// - records which tasks were dispatched (and cancelled)
/// - immediately reports a scripted outcome for each dispatch.
///
/// Unscripted content tasks succeed with `"draft for <id>"`; unscripted
/// simulated tasks tick to 50 and then 100.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    handle: FakeExecutorHandle,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            handle: FakeExecutorHandle::default(),
        }
    }

    /// Queue outcomes for successive dispatches of `task`.
    pub fn script(self, task: &str, outcomes: impl IntoIterator<Item = FakeOutcome>) -> Self {
        self.handle
            .shared
            .lock()
            .unwrap()
            .script
            .entry(TaskId::new(task))
            .or_default()
            .extend(outcomes);
        self
    }

    pub fn handle(&self) -> FakeExecutorHandle {
        self.handle.clone()
    }

    fn next_outcome(&self, dispatch: &Dispatch) -> FakeOutcome {
        let mut shared = self.handle.shared.lock().unwrap();
        shared
            .dispatched
            .push((dispatch.task.id.clone(), dispatch.attempt));
        let scripted = shared
            .script
            .get_mut(&dispatch.task.id)
            .and_then(|q| q.pop_front());
        scripted.unwrap_or_else(|| match dispatch.strategy {
            ExecutionStrategy::Content => {
                FakeOutcome::Content(format!("draft for {}", dispatch.task.id))
            }
            ExecutionStrategy::Simulated => FakeOutcome::Progress(vec![50, 100]),
        })
    }
}

impl ExecutorBackend for FakeExecutor {
    fn dispatch(
        &mut self,
        dispatches: Vec<Dispatch>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let planned: Vec<(Dispatch, FakeOutcome)> = dispatches
            .into_iter()
            .map(|d| {
                let outcome = self.next_outcome(&d);
                (d, outcome)
            })
            .collect();
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            for (dispatch, outcome) in planned {
                let task = dispatch.task.id.clone();
                let attempt = dispatch.attempt;
                let events = match outcome {
                    FakeOutcome::Content(content) => vec![RuntimeEvent::ContentGenerated {
                        task,
                        attempt,
                        content,
                    }],
                    FakeOutcome::Fail(error) => vec![RuntimeEvent::ExecutionFailed {
                        task,
                        attempt,
                        error,
                    }],
                    FakeOutcome::Progress(ticks) => ticks
                        .into_iter()
                        .map(|progress| RuntimeEvent::ProgressTick {
                            task: task.clone(),
                            attempt,
                            progress,
                        })
                        .collect(),
                    FakeOutcome::Hold => Vec::new(),
                };
                for event in events {
                    tx.send(event).await.map_err(anyhow::Error::from)?;
                }
            }
            Ok(())
        })
    }

    fn cancel(
        &mut self,
        tasks: Vec<TaskId>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.handle.shared.lock().unwrap().cancelled.extend(tasks);
        Box::pin(async { Ok(()) })
    }
}

/// Scripted content generator for exercising the real executor loop.
#[derive(Debug, Clone, Default)]
pub struct FakeGenerator {
    script: Arc<Mutex<HashMap<TaskId, VecDeque<std::result::Result<String, String>>>>>,
    calls: Arc<Mutex<Vec<(TaskId, String)>>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(
        self,
        task: &str,
        outcomes: impl IntoIterator<Item = std::result::Result<String, String>>,
    ) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(TaskId::new(task))
            .or_default()
            .extend(outcomes);
        self
    }

    /// `(task, instruction)` for every call so far.
    pub fn calls(&self) -> Vec<(TaskId, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ContentGenerator for FakeGenerator {
    fn generate<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        self.calls
            .lock()
            .unwrap()
            .push((task.id.clone(), instruction_for(task).to_string()));
        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&task.id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Ok(format!("generated {}", task.id)));

        Box::pin(async move { next.map_err(anyhow::Error::msg) })
    }
}

/// Decomposer returning a fixed answer.
#[derive(Debug, Clone)]
pub struct FakeDecomposer {
    answer: std::result::Result<Vec<Task>, String>,
}

impl FakeDecomposer {
    pub fn tasks(tasks: Vec<Task>) -> Self {
        Self { answer: Ok(tasks) }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            answer: Err(error.to_string()),
        }
    }
}

impl Decomposer for FakeDecomposer {
    fn decompose<'a>(
        &'a self,
        _goal: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Task>>> + Send + 'a>> {
        let answer = self.answer.clone();
        Box::pin(async move { answer.map_err(anyhow::Error::msg) })
    }
}
