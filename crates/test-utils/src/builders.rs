#![allow(dead_code)]

use agentplan::config::{
    ConfigSection, ContentSection, PlanFile, PlanSection, RawPlanFile, TaskConfig,
};
use agentplan::plan::task::{Task, TaskId};
use agentplan::types::{Agent, TaskStatus};
use chrono::NaiveDate;

/// Shorthand for a calendar date in tests.
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// Builder for a single `Task`.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    /// A pending marketing (content) task titled after its id.
    pub fn new(id: &str) -> Self {
        Self {
            task: Task::new(id, format!("Task {id}"), Agent::Marketing),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.task.title = title.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = description.to_string();
        self
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.task.assigned_agent = agent;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.depends_on.push(TaskId::new(dep));
        self
    }

    pub fn parent(mut self, parent: &str) -> Self {
        self.task.parent_id = Some(TaskId::new(parent));
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.task.progress = progress;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.task.retries = retries;
        self
    }

    pub fn start(mut self, start: NaiveDate) -> Self {
        self.task.start_date = Some(start);
        self
    }

    pub fn duration(mut self, days: u32) -> Self {
        self.task.estimated_duration = days;
        self
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.task.custom_prompt = Some(prompt.to_string());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for an ordered task list.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    tasks: Vec<Task>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: TaskBuilder) -> Self {
        self.tasks.push(task.build());
        self
    }

    pub fn build(self) -> Vec<Task> {
        self.tasks
    }
}

/// Builder for a validated `PlanFile`.
#[derive(Debug, Clone)]
pub struct PlanFileBuilder {
    raw: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawPlanFile {
                config: ConfigSection::default(),
                content: ContentSection::default(),
                plan: PlanSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, id: &str, agent: Agent, after: &[&str]) -> Self {
        self.raw.task.push(TaskConfig {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: String::new(),
            agent,
            after: after.iter().map(|s| s.to_string()).collect(),
            parent: None,
            start_date: None,
            duration: 1,
        });
        self
    }

    pub fn with_goal(mut self, goal: &str) -> Self {
        self.raw.plan.goal = Some(goal.to_string());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.raw.config.max_retries = n;
        self
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.raw).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
