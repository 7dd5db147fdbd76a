// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{AgentplanError, Result};
use crate::plan::task::MAX_DURATION_DAYS;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = AgentplanError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        report_cycles(&raw);
        Ok(PlanFile::new_unchecked(raw))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(plan)?;
    validate_global_config(plan)?;
    validate_tasks(plan)?;
    Ok(())
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(config_error(
            "plan must contain at least one [[task]] entry",
        ));
    }
    Ok(())
}

fn validate_global_config(plan: &RawPlanFile) -> Result<()> {
    let cfg = &plan.config;

    if cfg.max_retries == 0 {
        return Err(config_error("[config].max_retries must be >= 1 (got 0)"));
    }
    if cfg.tick_ms == 0 {
        return Err(config_error("[config].tick_ms must be >= 1 (got 0)"));
    }
    if cfg.simulated_min_secs > cfg.simulated_max_secs {
        return Err(config_error(format!(
            "[config].simulated_min_secs ({}) must not exceed simulated_max_secs ({})",
            cfg.simulated_min_secs, cfg.simulated_max_secs
        )));
    }
    if plan
        .content
        .cmd
        .as_deref()
        .is_some_and(|cmd| cmd.trim().is_empty())
    {
        return Err(config_error("[content].cmd must not be empty when set"));
    }

    Ok(())
}

fn validate_tasks(plan: &RawPlanFile) -> Result<()> {
    let mut ids = HashSet::new();
    for task in &plan.task {
        if task.id.trim().is_empty() {
            return Err(config_error(format!(
                "task '{}' has an empty id",
                task.title
            )));
        }
        if !ids.insert(task.id.as_str()) {
            return Err(config_error(format!("duplicate task id '{}'", task.id)));
        }
    }

    let parents: HashSet<&str> = plan
        .task
        .iter()
        .filter_map(|t| t.parent.as_deref())
        .collect();

    for task in &plan.task {
        if task.after.iter().any(|dep| dep == &task.id) {
            return Err(config_error(format!(
                "task '{}' cannot depend on itself in `after`",
                task.id
            )));
        }
        for dep in &task.after {
            if !ids.contains(dep.as_str()) {
                warn!(task = %task.id, dep = %dep, "unknown dependency will be ignored");
            }
        }

        if let Some(parent) = task.parent.as_deref() {
            if parent == task.id {
                return Err(config_error(format!(
                    "task '{}' cannot be its own parent",
                    task.id
                )));
            }
            if !ids.contains(parent) {
                return Err(config_error(format!(
                    "task '{}' has unknown parent '{}'",
                    task.id, parent
                )));
            }
        }

        if task.duration == 0 {
            return Err(config_error(format!(
                "task '{}' must have a duration of at least one day",
                task.id
            )));
        }
        if task.duration > MAX_DURATION_DAYS {
            return Err(config_error(format!(
                "task '{}' has a duration of {} days; the limit is {MAX_DURATION_DAYS}",
                task.id, task.duration
            )));
        }

        let is_container = plan.config.container_tasks && parents.contains(task.id.as_str());
        if task.agent.is_orchestrator() && !is_container {
            return Err(config_error(format!(
                "task '{}' is assigned to the orchestrator, which cannot execute work",
                task.id
            )));
        }
    }

    Ok(())
}

/// Warn about dependency cycles. Cyclic plans still load; the scheduler
/// places cycle members at fallback dates and they never activate.
fn report_cycles(plan: &RawPlanFile) {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for task in &plan.task {
        graph.add_node(task.id.as_str());
    }
    for task in &plan.task {
        for dep in &task.after {
            if graph.contains_node(dep.as_str()) {
                graph.add_edge(dep.as_str(), task.id.as_str(), ());
            }
        }
    }

    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            let mut members: Vec<&str> = component;
            members.sort_unstable();
            warn!(tasks = ?members, "dependency cycle in plan; these tasks will not start");
        }
    }
}

fn config_error(message: impl Into<String>) -> AgentplanError {
    AgentplanError::ConfigError(message.into())
}
