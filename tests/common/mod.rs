#![allow(dead_code, unused_imports)]

pub use agentplan_test_utils::builders;
pub use agentplan_test_utils::{
    capture_logs, date, init_tracing, with_timeout, FakeDecomposer, FakeExecutor, FakeExecutorHandle,
    FakeGenerator, FakeOutcome, PlanBuilder, PlanFileBuilder, TaskBuilder,
};

use agentplan::plan::task::{Task, TaskId};

/// Look up a task by id, panicking with a readable message if absent.
pub fn find<'a>(tasks: &'a [Task], id: &str) -> &'a Task {
    tasks
        .iter()
        .find(|t| t.id.as_str() == id)
        .unwrap_or_else(|| panic!("task '{id}' not in plan"))
}

pub fn id(s: &str) -> TaskId {
    TaskId::new(s)
}
