// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::exec::SimulationSettings;
use crate::plan::lifecycle::LifecyclePolicy;
use crate::plan::task::{Task, TaskId, DEFAULT_DURATION_DAYS};
use crate::types::Agent;

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// max_retries = 3
/// anchor = "2025-03-03"
///
/// [content]
/// cmd = "./draft.sh"
///
/// [plan]
/// goal = "Launch the spring campaign"
///
/// [[task]]
/// id = "brief"
/// title = "Write the brief"
/// agent = "marketing"
///
/// [[task]]
/// id = "venue"
/// title = "Book the venue"
/// agent = "logistics"
/// after = ["brief"]
/// duration = 3
/// ```
///
/// Tasks are an array so that file order is plan order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub content: ContentSection,

    #[serde(default)]
    pub plan: PlanSection,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// Validated plan file.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub content: ContentSection,
    pub plan: PlanSection,
    pub task: Vec<TaskConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(raw: RawPlanFile) -> Self {
        Self {
            config: raw.config,
            content: raw.content,
            plan: raw.plan,
            task: raw.task,
        }
    }

    /// The `[[task]]` entries as fresh, pending tasks in file order.
    pub fn tasks(&self) -> Vec<Task> {
        self.task.iter().map(TaskConfig::to_task).collect()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            policy: LifecyclePolicy {
                max_retries: self.config.max_retries,
                container_tasks: self.config.container_tasks,
            },
            custom_prompt_rejection: self.config.custom_prompt_rejection,
            persist: self.config.persist,
        }
    }

    pub fn simulation(&self) -> SimulationSettings {
        SimulationSettings {
            min_duration: Duration::from_secs(self.config.simulated_min_secs),
            max_duration: Duration::from_secs(self.config.simulated_max_secs),
            tick: Duration::from_millis(self.config.tick_ms),
        }
    }

    /// State file location; relative paths are resolved against `base`
    /// (normally the plan file's directory).
    pub fn state_path(&self, base: &Path) -> PathBuf {
        if self.config.state_path.is_absolute() {
            self.config.state_path.clone()
        } else {
            base.join(&self.config.state_path)
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Failed attempts allowed per task before it is marked failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Project start date for the timeline; today when absent.
    #[serde(default)]
    pub anchor: Option<NaiveDate>,

    /// Interval between simulated progress ticks.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_simulated_min_secs")]
    pub simulated_min_secs: u64,

    #[serde(default = "default_simulated_max_secs")]
    pub simulated_max_secs: u64,

    /// Derive status/progress of tasks that other tasks name as `parent`.
    #[serde(default = "default_true")]
    pub container_tasks: bool,

    /// Let approval rejections carry a replacement instruction.
    #[serde(default = "default_true")]
    pub custom_prompt_rejection: bool,

    /// Save the plan state after every change and resume from it.
    #[serde(default)]
    pub persist: bool,

    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

fn default_max_retries() -> u32 {
    3
}

fn default_tick_ms() -> u64 {
    500
}

fn default_simulated_min_secs() -> u64 {
    2
}

fn default_simulated_max_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".agentplan/state.json")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            anchor: None,
            tick_ms: default_tick_ms(),
            simulated_min_secs: default_simulated_min_secs(),
            simulated_max_secs: default_simulated_max_secs(),
            container_tasks: true,
            custom_prompt_rejection: true,
            persist: false,
            state_path: default_state_path(),
        }
    }
}

/// `[content]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ContentSection {
    /// Shell command producing a draft on stdout. The built-in draft
    /// generator is used when unset.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// `[plan]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlanSection {
    #[serde(default)]
    pub goal: Option<String>,
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub agent: Agent,

    /// Ids this task waits for.
    #[serde(default)]
    pub after: Vec<String>,

    /// Container this task belongs to.
    #[serde(default)]
    pub parent: Option<String>,

    /// Fixed start date (`"YYYY-MM-DD"`).
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Estimated duration in days.
    #[serde(default = "default_duration")]
    pub duration: u32,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_DAYS
}

impl TaskConfig {
    pub fn to_task(&self) -> Task {
        let mut task = Task::new(self.id.as_str(), self.title.as_str(), self.agent);
        task.description = self.description.clone();
        task.depends_on = self.after.iter().map(|d| TaskId::new(d.as_str())).collect();
        task.parent_id = self.parent.as_deref().map(TaskId::new);
        task.start_date = self.start_date;
        task.estimated_duration = self.duration;
        task
    }
}
