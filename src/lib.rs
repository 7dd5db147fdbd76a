// src/lib.rs

pub mod cli;
pub mod config;
pub mod decompose;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod schedule;
pub mod storage;
pub mod types;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::decompose::PlanFileDecomposer;
use crate::engine::{CoreRuntime, OperatorIntent, PlanState, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::{CommandGenerator, ContentGenerator, DraftGenerator, RealExecutorBackend};
use crate::plan::task::Task;
use crate::schedule::layout;
use crate::storage::{JsonFileStore, StateStore};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan file loading
/// - persisted state (resume unless `--fresh`)
/// - core runtime / async shell
/// - executor and decomposer
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let plan_path = PathBuf::from(&args.plan);
    let plan = load_and_validate(&plan_path)?;

    let anchor = args
        .anchor
        .or(plan.config.anchor)
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    if args.dry_run {
        print_dry_run(&plan, anchor);
        return Ok(());
    }

    let config = plan.engine_config();
    let options = RuntimeOptions {
        exit_when_idle: args.once,
        auto_operator: args.auto_approve,
    };

    let store = if config.persist {
        let path = plan.state_path(&plan_root_dir(&plan_path));
        info!(path = ?path, "plan state persistence enabled");
        Some(JsonFileStore::new(path))
    } else {
        None
    };

    let resumed = match (&store, args.fresh) {
        (Some(store), false) => match store.load() {
            Ok(state) => state.filter(|s| !s.tasks.is_empty() || s.goal.is_some()),
            Err(err) => {
                warn!(error = %err, "could not read saved plan state; starting fresh");
                None
            }
        },
        _ => None,
    };

    let goal = args.goal.clone().or_else(|| plan.plan.goal.clone());
    let mut initial_intents = Vec::new();

    let core = match resumed {
        Some(state) => {
            info!(tasks = state.tasks.len(), "resuming saved plan");
            CoreRuntime::restore(state, config, options)
        }
        None => match goal {
            Some(goal) => {
                initial_intents.push(OperatorIntent::SubmitGoal { goal });
                CoreRuntime::new(Vec::new(), config, options)
            }
            None => CoreRuntime::new(plan.tasks(), config, options),
        },
    };

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let generator: Arc<dyn ContentGenerator> = match plan.content.cmd.as_deref() {
        Some(cmd) => Arc::new(CommandGenerator::new(cmd)),
        None => Arc::new(DraftGenerator),
    };
    let executor = RealExecutorBackend::new(rt_tx.clone(), generator, plan.simulation());
    let decomposer = Arc::new(PlanFileDecomposer::new(plan.tasks()));

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let mut runtime = Runtime::new(core, rt_rx, rt_tx, executor, decomposer)
        .with_initial_intents(initial_intents);
    if let Some(store) = store {
        runtime = runtime.with_state_store(Box::new(store));
    }

    let final_state = runtime.run().await?;

    if args.once {
        print_summary(&final_state, anchor);
    }
    Ok(())
}

/// Directory relative state paths are resolved against.
///
/// - If the plan path has a non-empty parent (e.g. "plans/Agentplan.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Agentplan.toml" (parent = ""),
///   we fall back to the current working directory "."
fn plan_root_dir(plan_path: &Path) -> PathBuf {
    match plan_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Render the timeline of `tasks` as a plain-text table.
///
/// One row per task in plan order: lane, start, end (inclusive), status and
/// title. Tasks placed by the cycle fallback are marked.
pub fn render_timeline(tasks: &[Task], anchor: NaiveDate) -> String {
    let timeline = layout(tasks, anchor);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "timeline from {anchor} ({} lanes{})",
        timeline.lanes(),
        timeline
            .finish()
            .map(|d| format!(", finishes {d}"))
            .unwrap_or_default()
    );

    for (task, placement) in tasks.iter().zip(timeline.placements.iter()) {
        let _ = writeln!(
            out,
            "  [{}] {} .. {}  {:<17} {:<10} {}{}",
            placement.lane,
            placement.start,
            placement.end,
            task.status,
            task.id,
            task.title,
            if placement.fallback { "  (cycle)" } else { "" }
        );
    }

    out
}

fn print_dry_run(plan: &PlanFile, anchor: NaiveDate) {
    println!("agentplan dry-run");
    println!("  config.max_retries = {}", plan.config.max_retries);
    println!("  config.container_tasks = {}", plan.config.container_tasks);
    if let Some(goal) = plan.plan.goal.as_deref() {
        println!("  plan.goal = {goal}");
    }
    println!();

    println!("tasks ({}):", plan.task.len());
    for task in &plan.task {
        println!("  - {} ({})", task.id, task.agent);
        println!("      title: {}", task.title);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(parent) = task.parent.as_deref() {
            println!("      parent: {parent}");
        }
    }
    println!();

    print!("{}", render_timeline(&plan.tasks(), anchor));

    debug!("dry-run complete (no execution)");
}

fn print_summary(state: &PlanState, anchor: NaiveDate) {
    if let Some(error) = state.plan_error.as_deref() {
        println!("plan error: {error}");
    }
    print!("{}", render_timeline(&state.tasks, anchor));
    for approval in state.approvals.pending() {
        println!("awaiting approval #{}: {} ({})", approval.id.0, approval.title, approval.agent);
    }
    for agent in &state.errored_agents {
        println!("agent {agent} needs attention");
    }
}
