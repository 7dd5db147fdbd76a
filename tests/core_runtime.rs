// tests/core_runtime.rs

mod common;
use crate::common::{date, id, init_tracing, PlanBuilder, TaskBuilder};

use agentplan::engine::{
    CoreCommand, CoreRuntime, CoreStep, EngineConfig, OperatorIntent, RuntimeEvent,
    RuntimeOptions,
};
use agentplan::plan::approval::ApprovalDecision;
use agentplan::plan::lifecycle::TaskPatch;
use agentplan::plan::task::Task;
use agentplan::types::{Agent, AgentStatus, ExecutionStrategy, TaskStatus};

fn core(tasks: Vec<Task>) -> CoreRuntime {
    CoreRuntime::new(tasks, EngineConfig::default(), RuntimeOptions::default())
}

fn dispatched(step: &CoreStep) -> Vec<(String, u64)> {
    step.dispatched()
        .map(|d| (d.task.id.to_string(), d.attempt))
        .collect()
}

fn cancelled(step: &CoreStep) -> Vec<String> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Cancel(ids) => Some(ids),
            _ => None,
        })
        .flatten()
        .map(|t| t.to_string())
        .collect()
}

fn persisted(step: &CoreStep) -> bool {
    step.commands
        .iter()
        .any(|c| matches!(c, CoreCommand::Persist(_)))
}

fn status(core: &CoreRuntime, task: &str) -> TaskStatus {
    core.task(&id(task)).map(|t| t.status).unwrap()
}

fn content(task: &str, attempt: u64, text: &str) -> RuntimeEvent {
    RuntimeEvent::ContentGenerated {
        task: id(task),
        attempt,
        content: text.to_string(),
    }
}

fn failed(task: &str, attempt: u64) -> RuntimeEvent {
    RuntimeEvent::ExecutionFailed {
        task: id(task),
        attempt,
        error: "model unavailable".to_string(),
    }
}

fn tick(task: &str, attempt: u64, progress: u8) -> RuntimeEvent {
    RuntimeEvent::ProgressTick {
        task: id(task),
        attempt,
        progress,
    }
}

#[test]
fn start_dispatches_each_ready_task_once() {
    init_tracing();
    let mut core = core(
        PlanBuilder::new()
            .task(TaskBuilder::new("copy"))
            .task(TaskBuilder::new("ship").agent(Agent::Logistics))
            .task(TaskBuilder::new("later").after("copy"))
            .build(),
    );

    let step = core.start();
    assert!(step.keep_running);
    assert_eq!(
        dispatched(&step),
        vec![("copy".to_string(), 1), ("ship".to_string(), 2)]
    );
    let strategies: Vec<_> = step.dispatched().map(|d| d.strategy).collect();
    assert_eq!(
        strategies,
        vec![ExecutionStrategy::Content, ExecutionStrategy::Simulated]
    );

    // Any further event must not hand out a second execution.
    let patch = TaskPatch {
        title: Some("Copy v2".to_string()),
        ..TaskPatch::default()
    };
    let step = core.step(RuntimeEvent::Operator(OperatorIntent::EditTask {
        task: id("copy"),
        patch,
    }));
    assert!(dispatched(&step).is_empty());
    assert_eq!(core.guard().len(), 2);
    assert_eq!(core.agent_status(Agent::Marketing), AgentStatus::Working);
    assert_eq!(core.agent_status(Agent::Outreach), AgentStatus::Idle);
}

#[test]
fn content_waits_for_approval_then_unblocks_dependents() {
    let mut core = core(
        PlanBuilder::new()
            .task(TaskBuilder::new("copy"))
            .task(TaskBuilder::new("mail").agent(Agent::Outreach).after("copy"))
            .build(),
    );
    core.start();

    let step = core.step(content("copy", 1, "Big news"));
    assert!(dispatched(&step).is_empty());
    assert_eq!(status(&core, "copy"), TaskStatus::AwaitingApproval);
    assert_eq!(core.task(&id("copy")).unwrap().progress, 100);
    assert!(core.guard().is_empty());

    let approval = core.approvals().pending()[0].clone();
    assert_eq!(approval.content, "Big news");
    assert_eq!(approval.agent, Agent::Marketing);

    let step = core
        .apply_intent(OperatorIntent::ResolveApproval {
            approval: approval.id,
            decision: ApprovalDecision::Approve {
                edited_content: None,
            },
        })
        .unwrap();

    assert_eq!(status(&core, "copy"), TaskStatus::Completed);
    assert_eq!(dispatched(&step), vec![("mail".to_string(), 2)]);
}

#[test]
fn rejection_redispatches_with_the_new_instruction() {
    let mut core = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    core.start();
    core.step(content("copy", 1, "meh"));
    let approval = core.approvals().pending()[0].id;

    let step = core
        .apply_intent(OperatorIntent::ResolveApproval {
            approval,
            decision: ApprovalDecision::Reject {
                instruction: Some("Shorter, please".to_string()),
            },
        })
        .unwrap();

    let redo: Vec<_> = step.dispatched().collect();
    assert_eq!(redo.len(), 1);
    assert_eq!(redo[0].attempt, 2);
    assert_eq!(redo[0].task.custom_prompt.as_deref(), Some("Shorter, please"));
}

#[test]
fn instruction_edited_mid_flight_waits_for_the_next_attempt() {
    let mut core = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    let step = core.start();
    assert_eq!(step.dispatched().next().unwrap().task.custom_prompt, None);

    let patch = TaskPatch {
        custom_prompt: Some("Use a formal tone".to_string()),
        ..TaskPatch::default()
    };
    core.apply_intent(OperatorIntent::EditTask {
        task: id("copy"),
        patch,
    })
    .unwrap();

    // Attempt 1 ran without the instruction, so it is still owed.
    core.step(content("copy", 1, "casual draft"));
    let copy = core.task(&id("copy")).unwrap();
    assert_eq!(copy.status, TaskStatus::AwaitingApproval);
    assert_eq!(copy.custom_prompt.as_deref(), Some("Use a formal tone"));

    let approval = core.approvals().pending()[0].id;
    let step = core
        .apply_intent(OperatorIntent::ResolveApproval {
            approval,
            decision: ApprovalDecision::Reject { instruction: None },
        })
        .unwrap();
    let redo: Vec<_> = step.dispatched().collect();
    assert_eq!(redo.len(), 1);
    assert_eq!(redo[0].task.custom_prompt.as_deref(), Some("Use a formal tone"));

    // Attempt 2 used it, so it is consumed.
    core.step(content("copy", redo[0].attempt, "formal draft"));
    assert_eq!(core.task(&id("copy")).unwrap().custom_prompt, None);
}

#[test]
fn failures_are_retried_then_flag_the_agent() {
    let mut core = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    core.start();

    let step = core.step(failed("copy", 1));
    assert_eq!(dispatched(&step), vec![("copy".to_string(), 2)]);
    let step = core.step(failed("copy", 2));
    assert_eq!(dispatched(&step), vec![("copy".to_string(), 3)]);

    let step = core.step(failed("copy", 3));
    assert!(dispatched(&step).is_empty());
    let task = core.task(&id("copy")).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retries, 3);
    assert_eq!(core.agent_status(Agent::Marketing), AgentStatus::Error);
    assert!(core.activity().mentions("needs attention"));

    let step = core
        .apply_intent(OperatorIntent::Reassign {
            task: id("copy"),
            agent: Agent::Outreach,
        })
        .unwrap();
    assert_eq!(core.agent_status(Agent::Marketing), AgentStatus::Idle);
    assert_eq!(dispatched(&step), vec![("copy".to_string(), 4)]);
    assert_eq!(core.task(&id("copy")).unwrap().retries, 0);
}

#[test]
fn late_draft_after_manual_completion_is_discarded() {
    let mut core = core(
        PlanBuilder::new()
            .task(TaskBuilder::new("copy").status(TaskStatus::InProgress))
            .build(),
    );
    core.start();

    let step = core
        .apply_intent(OperatorIntent::CompleteTask {
            task: id("copy"),
            force: true,
        })
        .unwrap();
    assert_eq!(cancelled(&step), vec!["copy".to_string()]);
    assert_eq!(status(&core, "copy"), TaskStatus::Completed);

    core.step(content("copy", 1, "too late"));
    assert_eq!(status(&core, "copy"), TaskStatus::Completed);
    assert!(core.approvals().pending().is_empty());
    assert!(core.activity().mentions("stale draft"));
}

#[test]
fn result_from_a_superseded_attempt_is_ignored() {
    let mut core = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    core.start();
    core.apply_intent(OperatorIntent::Reassign {
        task: id("copy"),
        agent: Agent::Outreach,
    })
    .unwrap();

    // Attempt 1 belonged to the marketing run; attempt 2 is current.
    core.step(failed("copy", 1));
    let task = core.task(&id("copy")).unwrap();
    assert_eq!((task.status, task.retries), (TaskStatus::InProgress, 0));

    core.step(content("copy", 2, "fresh"));
    assert_eq!(status(&core, "copy"), TaskStatus::AwaitingApproval);
}

#[test]
fn simulated_work_finishes_through_the_operator() {
    let mut core = core(
        PlanBuilder::new()
            .task(TaskBuilder::new("ship").agent(Agent::Logistics))
            .build(),
    );
    core.start();

    core.step(tick("ship", 1, 40));
    assert_eq!(core.task(&id("ship")).unwrap().progress, 40);
    assert!(core.operator_backlog().is_empty());

    let step = core.step(tick("ship", 1, 100));
    assert!(dispatched(&step).is_empty());
    assert!(core.guard().is_empty());
    assert_eq!(status(&core, "ship"), TaskStatus::InProgress);

    let backlog = core.operator_backlog();
    assert_eq!(
        backlog,
        vec![OperatorIntent::CompleteTask {
            task: id("ship"),
            force: false,
        }]
    );
    core.apply_intent(backlog[0].clone()).unwrap();
    assert_eq!(status(&core, "ship"), TaskStatus::Completed);
}

#[test]
fn containers_and_orchestrator_tasks_are_never_dispatched() {
    let mut core = core(
        PlanBuilder::new()
            .task(TaskBuilder::new("epic").agent(Agent::Orchestrator))
            .task(TaskBuilder::new("copy").parent("epic"))
            .task(TaskBuilder::new("note").agent(Agent::Orchestrator))
            .build(),
    );

    let step = core.start();
    assert_eq!(dispatched(&step), vec![("copy".to_string(), 1)]);
    assert_eq!(status(&core, "epic"), TaskStatus::InProgress);
}

#[test]
fn container_completes_when_its_last_child_is_approved() {
    let mut core = core(
        PlanBuilder::new()
            .task(TaskBuilder::new("epic").agent(Agent::Orchestrator))
            .task(TaskBuilder::new("copy").parent("epic"))
            .task(TaskBuilder::new("wrap").after("epic"))
            .build(),
    );
    core.start();
    core.step(content("copy", 1, "done"));
    let approval = core.approvals().pending()[0].id;

    let step = core
        .apply_intent(OperatorIntent::ResolveApproval {
            approval,
            decision: ApprovalDecision::Approve {
                edited_content: None,
            },
        })
        .unwrap();

    assert_eq!(status(&core, "epic"), TaskStatus::Completed);
    assert_eq!(core.task(&id("epic")).unwrap().progress, 100);
    assert_eq!(dispatched(&step), vec![("wrap".to_string(), 2)]);
}

#[test]
fn rejected_intents_leave_the_plan_untouched() {
    let mut core = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    core.start();
    let revision = core.revision();

    assert!(core
        .apply_intent(OperatorIntent::CompleteTask {
            task: id("ghost"),
            force: true,
        })
        .is_err());

    let step = core.step(RuntimeEvent::Operator(OperatorIntent::Reassign {
        task: id("copy"),
        agent: Agent::Orchestrator,
    }));
    assert!(step.keep_running);
    assert!(step.commands.is_empty());
    assert_eq!(core.revision(), revision);
}

#[test]
fn persistence_snapshots_only_on_change() {
    let config = EngineConfig {
        persist: true,
        ..EngineConfig::default()
    };
    let mut core = CoreRuntime::new(
        PlanBuilder::new()
            .task(TaskBuilder::new("ship").agent(Agent::Logistics))
            .build(),
        config,
        RuntimeOptions::default(),
    );

    assert!(persisted(&core.start()));
    // A stale tick changes nothing.
    assert!(!persisted(&core.step(tick("ship", 99, 50))));
    assert!(persisted(&core.step(tick("ship", 1, 50))));

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);
    assert!(!persisted(&step));
}

#[test]
fn restore_resumes_in_progress_work() {
    let mut first = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    first.start();
    let saved = first.plan_state();

    let mut resumed =
        CoreRuntime::restore(saved, EngineConfig::default(), RuntimeOptions::default());
    assert!(resumed.guard().is_empty());

    let step = resumed.start();
    assert_eq!(dispatched(&step).len(), 1);
    assert_eq!(status(&resumed, "copy"), TaskStatus::InProgress);
}

#[test]
fn exit_when_idle_waits_for_executions() {
    let options = RuntimeOptions {
        exit_when_idle: true,
        auto_operator: false,
    };
    let mut core = CoreRuntime::new(
        PlanBuilder::new().task(TaskBuilder::new("copy")).build(),
        EngineConfig::default(),
        options,
    );

    let step = core.start();
    assert!(step.keep_running);

    // Without an unattended operator a pending approval counts as idle.
    let step = core.step(content("copy", 1, "draft"));
    assert!(!step.keep_running);
    assert!(step.commands.contains(&CoreCommand::RequestExit));
}

#[test]
fn auto_operator_keeps_the_run_alive_while_it_has_work() {
    let options = RuntimeOptions {
        exit_when_idle: true,
        auto_operator: true,
    };
    let mut core = CoreRuntime::new(
        PlanBuilder::new().task(TaskBuilder::new("copy")).build(),
        EngineConfig::default(),
        options,
    );
    core.start();

    let step = core.step(content("copy", 1, "draft"));
    assert!(step.keep_running);
    assert_eq!(core.operator_backlog().len(), 1);
    assert!(!core.is_idle());
}

#[test]
fn goal_decomposition_replaces_the_plan() {
    let mut core = core(Vec::new());
    core.start();

    let step = core
        .apply_intent(OperatorIntent::SubmitGoal {
            goal: "  Launch the cafe ".to_string(),
        })
        .unwrap();
    assert!(step.commands.contains(&CoreCommand::Decompose {
        goal: "Launch the cafe".to_string(),
    }));
    assert!(core.is_decomposing());
    assert!(core
        .apply_intent(OperatorIntent::SubmitGoal {
            goal: "Another".to_string(),
        })
        .is_err());

    let tasks = PlanBuilder::new()
        .task(TaskBuilder::new("copy").status(TaskStatus::Completed))
        .task(TaskBuilder::new("ship").agent(Agent::Logistics).after("copy"))
        .build();
    let step = core.step(RuntimeEvent::PlanDecomposed {
        goal: "Launch the cafe".to_string(),
        tasks,
    });

    assert!(!core.is_decomposing());
    assert_eq!(core.goal(), Some("Launch the cafe"));
    // Incoming tasks restart from scratch.
    assert_eq!(dispatched(&step), vec![("copy".to_string(), 1)]);
    assert_eq!(status(&core, "ship"), TaskStatus::Pending);
}

#[test]
fn failed_or_empty_decomposition_keeps_the_current_plan() {
    let mut core = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    core.start();

    core.apply_intent(OperatorIntent::SubmitGoal {
        goal: "Grow".to_string(),
    })
    .unwrap();
    core.step(RuntimeEvent::DecompositionFailed {
        goal: "Grow".to_string(),
        error: "timeout".to_string(),
    });
    assert_eq!(core.plan_error(), Some("timeout"));
    assert_eq!(core.tasks().len(), 1);

    core.apply_intent(OperatorIntent::SubmitGoal {
        goal: "Grow".to_string(),
    })
    .unwrap();
    assert_eq!(core.plan_error(), None);
    core.step(RuntimeEvent::PlanDecomposed {
        goal: "Grow".to_string(),
        tasks: Vec::new(),
    });
    assert!(core.plan_error().is_some());
    assert_eq!(core.tasks().len(), 1);
}

#[test]
fn reset_cancels_everything_in_flight() {
    let mut core = core(
        PlanBuilder::new()
            .task(TaskBuilder::new("copy"))
            .task(TaskBuilder::new("ship").agent(Agent::Logistics))
            .build(),
    );
    core.start();

    let step = core.apply_intent(OperatorIntent::ResetPlan).unwrap();
    let mut ids = cancelled(&step);
    ids.sort();
    assert_eq!(ids, vec!["copy".to_string(), "ship".to_string()]);
    assert!(core.tasks().is_empty());
    assert!(core.guard().is_empty());
    assert_eq!(core.goal(), None);
}

#[test]
fn committing_a_schedule_restarts_with_fresh_attempts() {
    let mut core = core(PlanBuilder::new().task(TaskBuilder::new("copy")).build());
    core.start();
    core.step(content("copy", 1, "draft"));
    assert_eq!(core.approvals().pending().len(), 1);

    let edited = PlanBuilder::new()
        .task(TaskBuilder::new("copy").start(date(2025, 5, 1)))
        .build();
    let step = core
        .apply_intent(OperatorIntent::CommitSchedule { tasks: edited })
        .unwrap();

    assert!(core.approvals().pending().is_empty());
    assert_eq!(dispatched(&step), vec![("copy".to_string(), 2)]);
}
