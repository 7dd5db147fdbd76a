// src/schedule/editor.rs

//! Interactive schedule editing on a working copy with linear undo.
//!
//! Every successful edit pushes the pre-edit copy onto the history stack.
//! After each edit the working copy is re-ordered so that dependencies
//! always precede their dependents; a dependency that would have to point
//! forward is dropped.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::errors::{AgentplanError, Result};
use crate::plan::graph::TaskGraph;
use crate::plan::lifecycle::reset_for_rerun;
use crate::plan::task::{Task, TaskId};
use crate::schedule::layout::{layout, Timeline};

/// Result of [`ScheduleEditor::link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The dependency was added.
    Linked,
    /// The requested link would have closed a cycle, so the target was made
    /// to run in parallel with the source instead.
    Parallel,
}

#[derive(Debug, Clone)]
pub struct ScheduleEditor {
    anchor: NaiveDate,
    working: Vec<Task>,
    history: Vec<Vec<Task>>,
}

impl ScheduleEditor {
    /// Open an edit session on a copy of `tasks`.
    pub fn new(tasks: &[Task], anchor: NaiveDate) -> Self {
        Self {
            anchor,
            working: tasks.to_vec(),
            history: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.working
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    /// Timeline of the working copy.
    pub fn timeline(&self) -> Timeline {
        layout(&self.working, self.anchor)
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Restore the copy from before the last edit. Returns `false` if there
    /// is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.working = previous;
                debug!(depth = self.history.len(), "schedule edit undone");
                true
            }
            None => false,
        }
    }

    /// Pin `id` to `date`, dropping dependencies that would end on or after
    /// the new start. End dates are inclusive, so a dependency ending on
    /// `date` itself still overlaps the task and is dropped.
    pub fn reschedule(&mut self, id: &TaskId, date: NaiveDate) -> Result<()> {
        let pos = self.position(id)?;

        let mut next = self.working.clone();
        next[pos].start_date = Some(date);

        let timeline = layout(&next, self.anchor);
        let before = next[pos].depends_on.len();
        next[pos].depends_on.retain(|dep| {
            timeline
                .get(dep)
                .is_none_or(|placement| placement.end < date)
        });
        let dropped = before - next[pos].depends_on.len();

        info!(task = %id, %date, dropped, "rescheduled task");
        self.apply(next);
        Ok(())
    }

    /// Move the task at `from` to list position `to`; dependencies that now
    /// point forward are dropped.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.working.len();
        if from >= len {
            return Err(AgentplanError::invalid(
                format!("#{from}"),
                format!("position out of range (plan has {len} tasks)"),
            ));
        }

        let mut next = self.working.clone();
        let task = next.remove(from);
        let to = to.min(next.len());
        debug!(task = %task.id, from, to, "reordering task");
        next.insert(to, task);

        prune_forward_refs(&mut next);
        self.apply(next);
        Ok(())
    }

    /// Move task `id` to list position `to`.
    pub fn move_task(&mut self, id: &TaskId, to: usize) -> Result<()> {
        let from = self.position(id)?;
        self.reorder(from, to)
    }

    /// Make `task` depend on `on`.
    ///
    /// If `on` already (transitively) depends on `task`, a direct link would
    /// close a cycle; instead `on` takes over `task`'s dependencies and loses
    /// its fixed start, so the two run side by side.
    pub fn link(&mut self, task: &TaskId, on: &TaskId) -> Result<LinkOutcome> {
        if task == on {
            return Err(AgentplanError::invalid(task, "a task cannot depend on itself"));
        }
        let a = self.position(task)?;
        let b = self.position(on)?;

        let graph = TaskGraph::from_tasks(&self.working);
        let mut next = self.working.clone();

        let outcome = if graph.has_path(on, task) {
            let deps: Vec<TaskId> = next[a]
                .depends_on
                .iter()
                .filter(|d| *d != on)
                .cloned()
                .collect();
            next[b].depends_on = deps;
            next[b].start_date = None;
            LinkOutcome::Parallel
        } else {
            if !next[a].depends_on.contains(on) {
                next[a].depends_on.push(on.clone());
            }
            next[a].start_date = None;
            next[b].depends_on.retain(|d| d != task);
            LinkOutcome::Linked
        };

        info!(task = %task, on = %on, ?outcome, "linked tasks");
        self.apply(next);
        Ok(outcome)
    }

    /// Finish the session: history is discarded and every task is reset so
    /// the new plan revision runs from scratch.
    pub fn save(self) -> Vec<Task> {
        info!(tasks = self.working.len(), "schedule edits saved");
        reset_for_rerun(&self.working)
    }

    /// Abandon the session without touching the authoritative plan.
    pub fn cancel(self) {
        debug!(edits = self.history.len(), "schedule edits discarded");
    }

    fn position(&self, id: &TaskId) -> Result<usize> {
        self.working
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| AgentplanError::TaskNotFound(id.to_string()))
    }

    fn apply(&mut self, mut next: Vec<Task>) {
        normalize_order(&mut next);
        let previous = std::mem::replace(&mut self.working, next);
        self.history.push(previous);
    }
}

/// Stable topological re-ordering: dependencies move before dependents,
/// otherwise list order is kept. Tasks stuck on a cycle keep their relative
/// order at the end, and forward references are then pruned.
pub fn normalize_order(tasks: &mut Vec<Task>) {
    let graph = TaskGraph::from_tasks(tasks);
    let n = graph.len();

    let mut in_degree: Vec<usize> = (0..n).map(|i| graph.dep_indices(i).len()).collect();
    let mut heap: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(i)) = heap.pop() {
        placed[i] = true;
        order.push(i);
        for &j in graph.dependent_indices(i) {
            in_degree[j] = in_degree[j].saturating_sub(1);
            if in_degree[j] == 0 && !placed[j] {
                heap.push(Reverse(j));
            }
        }
    }
    order.extend((0..n).filter(|&i| !placed[i]));

    let mut slots: Vec<Option<Task>> = tasks.drain(..).map(Some).collect();
    tasks.extend(order.into_iter().filter_map(|i| slots[i].take()));

    prune_forward_refs(tasks);
}

/// Drop every dependency that points at the task itself or at a task placed
/// after it in the list.
pub fn prune_forward_refs(tasks: &mut [Task]) {
    let positions: HashMap<TaskId, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.clone(), i))
        .collect();

    for (i, task) in tasks.iter_mut().enumerate() {
        task.depends_on
            .retain(|dep| positions.get(dep).is_none_or(|&p| p < i));
    }
}
