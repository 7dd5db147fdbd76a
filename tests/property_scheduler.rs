// tests/property_scheduler.rs

mod common;
use crate::common::{date, PlanBuilder, TaskBuilder};

use std::collections::{HashMap, HashSet, VecDeque};

use proptest::prelude::*;

use agentplan::engine::{
    CoreRuntime, CoreStep, Dispatch, EngineConfig, RuntimeEvent, RuntimeOptions,
};
use agentplan::plan::lifecycle::{settle, LifecyclePolicy};
use agentplan::plan::task::{Task, TaskId};
use agentplan::schedule::{layout, ScheduleEditor};
use agentplan::types::{Agent, ExecutionStrategy, TaskStatus};

fn name(i: usize) -> String {
    format!("t{i}")
}

// Any dependency shape, cycles and self-references included.
fn any_plan(max_tasks: usize) -> impl Strategy<Value = Vec<Task>> {
    (1..=max_tasks).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(0..n, 0..3), n),
            proptest::collection::vec(1u32..4, n),
        )
            .prop_map(move |(deps, durations)| {
                let mut plan = PlanBuilder::new();
                for (i, (deps, duration)) in deps.into_iter().zip(durations).enumerate() {
                    let mut task = TaskBuilder::new(&name(i)).duration(duration);
                    for d in deps {
                        task = task.after(&name(d));
                    }
                    plan = plan.task(task);
                }
                plan.build()
            })
    })
}

// Dependencies only point backwards, so the graph is acyclic.
fn dag_plan(max_tasks: usize) -> impl Strategy<Value = Vec<Task>> {
    (1..=max_tasks).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n),
            proptest::collection::vec(any::<bool>(), n),
        )
            .prop_map(move |(deps, simulated)| {
                let mut plan = PlanBuilder::new();
                for (i, (deps, simulated)) in deps.into_iter().zip(simulated).enumerate() {
                    let agent = if simulated {
                        Agent::Logistics
                    } else {
                        Agent::Marketing
                    };
                    let mut task = TaskBuilder::new(&name(i)).agent(agent);
                    let unique: HashSet<usize> = deps.into_iter().filter(|_| i > 0).map(|d| d % i).collect();
                    for d in unique {
                        task = task.after(&name(d));
                    }
                    plan = plan.task(task);
                }
                plan.build()
            })
    })
}

// Flat plan where some tasks are grouped under containers.
fn container_plan() -> impl Strategy<Value = Vec<Task>> {
    (1usize..4, 1usize..8).prop_flat_map(|(containers, leaves)| {
        (
            proptest::collection::vec(0..containers, leaves),
            proptest::collection::vec(0u8..5, leaves),
        )
            .prop_map(move |(parents, statuses)| {
                let mut plan = PlanBuilder::new();
                for c in 0..containers {
                    plan = plan.task(TaskBuilder::new(&format!("c{c}")).agent(Agent::Orchestrator));
                }
                for (i, (parent, status)) in parents.into_iter().zip(statuses).enumerate() {
                    let status = match status {
                        0 => TaskStatus::Pending,
                        1 => TaskStatus::InProgress,
                        2 => TaskStatus::AwaitingApproval,
                        3 => TaskStatus::Completed,
                        _ => TaskStatus::Failed,
                    };
                    plan = plan.task(
                        TaskBuilder::new(&name(i))
                            .parent(&format!("c{parent}"))
                            .status(status),
                    );
                }
                plan.build()
            })
    })
}

#[derive(Debug, Clone)]
enum Edit {
    Reorder(usize, usize),
    Link(usize, usize),
    Reschedule(usize, u32),
}

fn edits() -> impl Strategy<Value = Vec<Edit>> {
    proptest::collection::vec(
        prop_oneof![
            (0..10usize, 0..10usize).prop_map(|(a, b)| Edit::Reorder(a, b)),
            (0..10usize, 0..10usize).prop_map(|(a, b)| Edit::Link(a, b)),
            (0..10usize, 0..20u32).prop_map(|(a, d)| Edit::Reschedule(a, d)),
        ],
        0..12,
    )
}

fn positions(tasks: &[Task]) -> HashMap<&TaskId, usize> {
    tasks.iter().enumerate().map(|(i, t)| (&t.id, i)).collect()
}

fn collect_dispatches(step: &CoreStep, in_flight: &mut HashSet<TaskId>, queue: &mut VecDeque<Dispatch>) {
    for dispatch in step.dispatched() {
        assert!(
            in_flight.insert(dispatch.task.id.clone()),
            "task {} dispatched twice",
            dispatch.task.id
        );
        queue.push_back(dispatch.clone());
    }
}

proptest! {
    #[test]
    fn layout_places_every_task_on_any_graph(tasks in any_plan(12)) {
        let anchor = date(2025, 1, 1);
        let timeline = layout(&tasks, anchor);

        prop_assert_eq!(timeline.placements.len(), tasks.len());

        let by_id: HashMap<_, _> = timeline.placements.iter().map(|p| (&p.task, p)).collect();
        for (task, placement) in tasks.iter().zip(&timeline.placements) {
            prop_assert!(placement.start >= anchor);
            prop_assert!(placement.end >= placement.start);
            if placement.fallback {
                continue;
            }
            for dep in &task.depends_on {
                if dep == &task.id {
                    continue;
                }
                if let Some(dep) = by_id.get(dep) {
                    prop_assert!(dep.end < placement.start);
                }
            }
        }

        // Overlapping intervals never share a lane.
        for a in &timeline.placements {
            for b in &timeline.placements {
                if a.task != b.task && a.lane == b.lane {
                    prop_assert!(a.end < b.start || b.end < a.start);
                }
            }
        }
    }

    #[test]
    fn acyclic_plans_need_no_fallback(tasks in dag_plan(12)) {
        let timeline = layout(&tasks, date(2025, 1, 1));
        prop_assert!(timeline.fallback.is_empty());
    }

    #[test]
    fn editor_never_leaves_forward_references(tasks in any_plan(8), edits in edits()) {
        let mut editor = ScheduleEditor::new(&tasks, date(2025, 1, 1));
        let n = tasks.len();

        for edit in edits {
            let ids: Vec<TaskId> = editor.tasks().iter().map(|t| t.id.clone()).collect();
            let _ = match edit {
                Edit::Reorder(from, to) => editor.reorder(from % n, to % n).map(|_| ()),
                Edit::Link(a, b) => editor.link(&ids[a % n], &ids[b % n]).map(|_| ()),
                Edit::Reschedule(a, days) => editor
                    .reschedule(&ids[a % n], date(2025, 1, 1) + chrono::Duration::days(i64::from(days))),
            };

            if !editor.can_undo() {
                continue;
            }
            let current = editor.tasks();
            let pos = positions(current);
            for (i, task) in current.iter().enumerate() {
                for dep in &task.depends_on {
                    if let Some(&p) = pos.get(dep) {
                        prop_assert!(p < i, "{} depends on later task {}", task.id, dep);
                    }
                }
            }
            prop_assert!(editor.timeline().fallback.is_empty());
        }

        while editor.undo() {}
        prop_assert_eq!(editor.tasks(), tasks.as_slice());
    }

    #[test]
    fn settled_containers_match_their_children(tasks in container_plan()) {
        let policy = LifecyclePolicy::default();
        let settled = settle(&tasks, &policy).tasks;

        for container in settled.iter().filter(|t| t.assigned_agent == Agent::Orchestrator) {
            let children: Vec<&Task> = settled
                .iter()
                .filter(|t| t.parent_id.as_ref() == Some(&container.id))
                .collect();
            if children.is_empty() {
                continue;
            }
            let done = children.iter().filter(|t| t.status == TaskStatus::Completed).count();
            let expected = ((200 * done + children.len()) / (2 * children.len())) as u8;
            prop_assert_eq!(container.progress, expected);
            prop_assert_eq!(
                container.status == TaskStatus::Completed,
                done == children.len()
            );
        }

        let again = settle(&settled, &policy);
        prop_assert_eq!(again.tasks, settled);
    }

    #[test]
    fn core_run_terminates_without_double_dispatch(
        tasks in dag_plan(10),
        failures in proptest::collection::vec(any::<bool>(), 1..16),
    ) {
        let mut core = CoreRuntime::new(tasks, EngineConfig::default(), RuntimeOptions::default());
        let mut in_flight = HashSet::new();
        let mut queue = VecDeque::new();
        collect_dispatches(&core.start(), &mut in_flight, &mut queue);

        let mut outcomes = failures.iter().cycle();
        let mut steps = 0;
        loop {
            steps += 1;
            prop_assert!(steps < 2_000, "run did not settle");

            if let Some(dispatch) = queue.pop_front() {
                in_flight.remove(&dispatch.task.id);
                let task = dispatch.task.id.clone();
                let attempt = dispatch.attempt;
                let event = match (outcomes.next(), dispatch.strategy) {
                    (Some(true), _) => RuntimeEvent::ExecutionFailed { task, attempt, error: "flaky".into() },
                    (_, ExecutionStrategy::Content) => RuntimeEvent::ContentGenerated { task, attempt, content: "ok".into() },
                    (_, ExecutionStrategy::Simulated) => RuntimeEvent::ProgressTick { task, attempt, progress: 100 },
                };
                let step = core.step(event);
                collect_dispatches(&step, &mut in_flight, &mut queue);
                continue;
            }

            let backlog = core.operator_backlog();
            if backlog.is_empty() {
                break;
            }
            for intent in backlog {
                let step = core.apply_intent(intent).expect("backlog intents are valid");
                collect_dispatches(&step, &mut in_flight, &mut queue);
            }
        }

        prop_assert!(core.guard().is_empty());
        for task in core.tasks().iter() {
            prop_assert!(task.retries <= 3);
            prop_assert!(matches!(
                task.status,
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Pending
            ));
            if task.status == TaskStatus::Pending {
                let blocked = task.depends_on.iter().any(|d| {
                    core.task(d).is_some_and(|t| t.status != TaskStatus::Completed)
                });
                prop_assert!(blocked, "{} never started", task.id);
            }
        }
    }
}
