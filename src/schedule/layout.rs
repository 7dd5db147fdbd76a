// src/schedule/layout.rs

//! Calendar placement of tasks.
//!
//! Dates come from a forward pass over the dependency graph (Kahn-style,
//! FIFO). Tasks the pass never reaches sit on or behind a dependency cycle;
//! they get a fallback date and are reported instead of aborting the layout.
//! Lanes are assigned afterwards by greedy interval packing.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::plan::graph::TaskGraph;
use crate::plan::task::{Task, TaskId};

/// Where one task sits on the timeline. `end` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub task: TaskId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub lane: usize,
    /// Placed by fallback because of a dependency cycle.
    pub fallback: bool,
}

/// Placements for a whole plan, in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub anchor: NaiveDate,
    pub placements: Vec<Placement>,
    /// Tasks that could not be reached by propagation.
    pub fallback: Vec<TaskId>,
}

impl Timeline {
    pub fn get(&self, id: &TaskId) -> Option<&Placement> {
        self.placements.iter().find(|p| &p.task == id)
    }

    /// Number of lanes in use.
    pub fn lanes(&self) -> usize {
        self.placements
            .iter()
            .map(|p| p.lane + 1)
            .max()
            .unwrap_or(0)
    }

    /// Last day covered by any task.
    pub fn finish(&self) -> Option<NaiveDate> {
        self.placements.iter().map(|p| p.end).max()
    }
}

/// Compute the timeline for `tasks` starting at `anchor`.
///
/// Dependency ids that are not in `tasks` are ignored. Terminates for any
/// graph shape, cyclic or not.
pub fn layout(tasks: &[Task], anchor: NaiveDate) -> Timeline {
    let graph = TaskGraph::from_tasks(tasks);
    let n = graph.len();

    let mut in_degree: Vec<usize> = (0..n).map(|i| graph.dep_indices(i).len()).collect();
    let mut dates: Vec<Option<(NaiveDate, NaiveDate)>> = vec![None; n];
    let mut queued = vec![false; n];
    let mut ready: VecDeque<usize> = VecDeque::new();

    for (i, task) in tasks.iter().enumerate() {
        if task.start_date.is_some() || in_degree[i] == 0 {
            queued[i] = true;
            ready.push_back(i);
        }
    }

    while let Some(i) = ready.pop_front() {
        let task = &tasks[i];
        let start = match task.start_date {
            Some(fixed) => fixed,
            None => graph
                .dep_indices(i)
                .iter()
                .filter_map(|&d| dates[d].map(|(_, end)| end))
                .max()
                .map(|end| add_days(end, 1))
                .unwrap_or(anchor),
        };
        let end = add_days(start, task.duration_days() - 1);
        dates[i] = Some((start, end));

        for &j in graph.dependent_indices(i) {
            in_degree[j] = in_degree[j].saturating_sub(1);
            if in_degree[j] == 0 && !queued[j] && tasks[j].start_date.is_none() {
                queued[j] = true;
                ready.push_back(j);
            }
        }
    }

    let mut fallback = Vec::new();
    for (i, task) in tasks.iter().enumerate() {
        if dates[i].is_none() {
            let start = task.start_date.unwrap_or(anchor);
            dates[i] = Some((start, add_days(start, task.duration_days() - 1)));
            fallback.push(task.id.clone());
        }
    }

    if !fallback.is_empty() {
        let names: Vec<String> = tasks
            .iter()
            .filter(|t| fallback.contains(&t.id))
            .map(|t| format!("{} ({})", t.id, t.title))
            .collect();
        warn!(
            tasks = ?names,
            "dependency cycle detected; placing tasks at fallback dates"
        );
    }

    let lanes = pack_lanes(&dates);

    let placements = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let (start, end) = dates[i].unwrap_or((anchor, anchor));
            Placement {
                task: task.id.clone(),
                start,
                end,
                lane: lanes[i],
                fallback: fallback.contains(&task.id),
            }
        })
        .collect();

    debug!(tasks = n, fallback = fallback.len(), "layout computed");

    Timeline {
        anchor,
        placements,
        fallback,
    }
}

/// Greedy interval packing: each task goes to the lowest lane whose last
/// task ends before this one starts. Ties in start date keep plan order.
///
/// End dates are inclusive, so a task ending on the day another starts
/// occupies that day too and the two never share a lane.
fn pack_lanes(dates: &[Option<(NaiveDate, NaiveDate)>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| (dates[i].map(|(s, _)| s), i));

    let mut lane_ends: Vec<NaiveDate> = Vec::new();
    let mut lanes = vec![0; dates.len()];

    for i in order {
        let Some((start, end)) = dates[i] else {
            continue;
        };
        match lane_ends.iter().position(|&last| last < start) {
            Some(lane) => {
                lane_ends[lane] = end;
                lanes[i] = lane;
            }
            None => {
                lane_ends.push(end);
                lanes[i] = lane_ends.len() - 1;
            }
        }
    }

    lanes
}

/// Saturates at the last representable date.
pub(crate) fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MAX)
}
