// tests/graph_utils.rs

mod common;
use crate::common::{find, id, PlanBuilder, TaskBuilder};

use agentplan::plan::graph::{container_ids, deps_completed, TaskGraph};
use agentplan::types::TaskStatus;

#[test]
fn graph_links_dependencies_and_dependents() {
    let tasks = PlanBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b").after("a"))
        .task(TaskBuilder::new("c").after("a").after("b"))
        .build();
    let graph = TaskGraph::from_tasks(&tasks);

    assert_eq!(graph.len(), 3);
    assert_eq!(graph.dependencies_of(&id("c")), vec![&id("a"), &id("b")]);

    let mut dependents = graph.dependents_of(&id("a"));
    dependents.sort();
    assert_eq!(dependents, vec![&id("b"), &id("c")]);

    assert!(graph.dependencies_of(&id("a")).is_empty());
}

#[test]
fn unknown_and_self_dependencies_are_ignored() {
    let tasks = PlanBuilder::new()
        .task(TaskBuilder::new("a").after("a").after("ghost"))
        .task(TaskBuilder::new("b").after("a").after("a"))
        .build();
    let graph = TaskGraph::from_tasks(&tasks);

    assert!(graph.dependencies_of(&id("a")).is_empty());
    assert_eq!(graph.dependencies_of(&id("b")), vec![&id("a")]);
    assert!(!graph.contains(&id("ghost")));
}

#[test]
fn ancestors_and_descendants_are_transitive() {
    let tasks = PlanBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b").after("a"))
        .task(TaskBuilder::new("c").after("b"))
        .task(TaskBuilder::new("d"))
        .build();
    let graph = TaskGraph::from_tasks(&tasks);

    let ancestors = graph.ancestors(&id("c"));
    assert!(ancestors.contains(&id("a")));
    assert!(ancestors.contains(&id("b")));
    assert!(!ancestors.contains(&id("d")));
    assert!(!ancestors.contains(&id("c")));

    let descendants = graph.descendants(&id("a"));
    assert_eq!(descendants.len(), 2);

    assert!(graph.has_path(&id("c"), &id("a")));
    assert!(!graph.has_path(&id("a"), &id("c")));
    assert!(!graph.has_path(&id("d"), &id("a")));
}

#[test]
fn ancestors_terminate_on_cycles() {
    let tasks = PlanBuilder::new()
        .task(TaskBuilder::new("a").after("b"))
        .task(TaskBuilder::new("b").after("a"))
        .build();
    let graph = TaskGraph::from_tasks(&tasks);

    let ancestors = graph.ancestors(&id("a"));
    assert!(ancestors.contains(&id("b")));
    assert!(graph.has_path(&id("a"), &id("b")));
    assert!(graph.has_path(&id("b"), &id("a")));
}

#[test]
fn containers_are_tasks_named_as_parents() {
    let tasks = PlanBuilder::new()
        .task(TaskBuilder::new("launch"))
        .task(TaskBuilder::new("copy").parent("launch"))
        .task(TaskBuilder::new("venue").parent("launch"))
        .task(TaskBuilder::new("solo"))
        .build();
    let graph = TaskGraph::from_tasks(&tasks);

    assert!(graph.is_container(&id("launch")));
    assert!(!graph.is_container(&id("solo")));
    assert_eq!(graph.children_of(&id("launch")).len(), 2);

    let containers = container_ids(&tasks);
    assert_eq!(containers.len(), 1);
    assert!(containers.contains(&id("launch")));
}

#[test]
fn deps_completed_requires_every_known_dependency() {
    let tasks = PlanBuilder::new()
        .task(TaskBuilder::new("a").status(TaskStatus::Completed))
        .task(TaskBuilder::new("b").status(TaskStatus::InProgress))
        .task(TaskBuilder::new("c").after("a"))
        .task(TaskBuilder::new("d").after("a").after("b"))
        .task(TaskBuilder::new("e").after("missing"))
        .build();

    assert!(deps_completed(find(&tasks, "c"), &tasks));
    assert!(!deps_completed(find(&tasks, "d"), &tasks));
    assert!(deps_completed(find(&tasks, "e"), &tasks));
}
