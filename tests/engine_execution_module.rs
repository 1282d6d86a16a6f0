use benchkeeper::diagnostics::DiagnosticsCollector;
use benchkeeper::engine::{EngineError, ExecutionEngine, RunOptions};
use benchkeeper::registry::{TaskRegistry, TaskSet};
use benchkeeper::state::{HealthEntry, OrchestratorState, RunStatus, DEFAULT_HISTORY_DEPTH};
use benchkeeper::task::{
    Context, RunMode, Severity, TaskEntry, TaskError, TaskOutput, TaskReport, TaskResult,
    TaskStatus,
};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::fs;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const ORIGIN: &str = "bench::tests::engine";

fn task_set(entries: Vec<(&str, TaskEntry)>) -> TaskSet {
    let mut registry = TaskRegistry::new([ORIGIN]);
    for (name, entry) in entries {
        registry.register(name, entry, ORIGIN).expect("register");
    }
    registry.discover()
}

fn counting_pass(counter: &Rc<Cell<usize>>) -> TaskEntry {
    let counter = Rc::clone(counter);
    TaskEntry::function(move |_ctx| {
        counter.set(counter.get() + 1);
        Ok(TaskResult::pass("ignored name")
            .with_message(Severity::Info, "all good")
            .into())
    })
}

#[test]
fn engine_second_run_skips_tasks_that_already_passed() {
    let calls = Rc::new(Cell::new(0));
    let tasks = task_set(vec![("Disk Space", counting_pass(&calls))]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config);
    let mut state = OrchestratorState::default();

    let first = engine
        .run(&mut state, &RunOptions::default())
        .expect("first run");
    let second = engine
        .run(&mut state, &RunOptions::default())
        .expect("second run");

    assert_eq!(calls.get(), 1);
    assert!(!first.outcomes[0].skipped);
    assert!(second.outcomes[0].skipped);
    assert_eq!(second.outcomes[0].status, TaskStatus::Pass);
    assert!(second.success());
    assert_eq!(state.health_history["Disk Space"].len(), 1);
    assert_eq!(state.last_run_status, Some(RunStatus::Success));
    assert!(state.completed_sections.contains("Disk Space"));
}

#[test]
fn engine_verification_modes_rerun_passing_tasks() {
    let calls = Rc::new(Cell::new(0));
    let tasks = task_set(vec![("Disk Space", counting_pass(&calls))]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config);
    let mut state = OrchestratorState::default();

    engine
        .run(&mut state, &RunOptions::default())
        .expect("run");
    for mode in [RunMode::Test, RunMode::Stress, RunMode::Security] {
        let options = RunOptions {
            mode,
            ..RunOptions::default()
        };
        engine.run(&mut state, &options).expect("forced run");
    }

    assert_eq!(calls.get(), 4);
}

#[test]
fn engine_drift_reruns_everything_and_commits_the_new_baseline() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tracked = temp.path().join("zshrc");
    fs::write(&tracked, "alias ll='ls -l'\n").expect("write");

    let calls = Rc::new(Cell::new(0));
    let tasks = task_set(vec![("Shell Profile", counting_pass(&calls))]);
    let config = Value::Null;
    let engine =
        ExecutionEngine::new(&tasks, &config).with_tracked_files(vec![tracked.clone()]);
    let mut state = OrchestratorState::default();

    let first = engine
        .run(&mut state, &RunOptions::default())
        .expect("first run");
    assert!(first.drift.is_drifted());
    assert!(first.baseline_committed);
    let baseline = state.file_hashes.clone();
    assert_eq!(baseline.len(), 1);

    engine
        .run(&mut state, &RunOptions::default())
        .expect("quiet run");
    assert_eq!(calls.get(), 1);

    fs::write(&tracked, "alias ll='ls -la'\n").expect("edit");
    let third = engine
        .run(&mut state, &RunOptions::default())
        .expect("drift run");

    assert_eq!(calls.get(), 2);
    assert_eq!(third.drift.changed, vec![tracked.display().to_string()]);
    assert_ne!(state.file_hashes, baseline);
}

#[test]
fn engine_turns_errors_and_panics_into_failures_and_keeps_going() {
    let after = Rc::new(Cell::new(0));
    let tasks = task_set(vec![
        (
            "Panicking",
            TaskEntry::function(|_ctx| -> Result<TaskOutput, TaskError> {
                panic!("resolver exploded")
            }),
        ),
        (
            "Erroring",
            TaskEntry::function(|_ctx| Err(TaskError::Failed("probe refused".to_string()))),
        ),
        ("After", counting_pass(&after)),
    ]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config);
    let mut state = OrchestratorState::default();

    let summary = engine
        .run(&mut state, &RunOptions::default())
        .expect("run");

    assert_eq!(after.get(), 1);
    assert_eq!(summary.status, RunStatus::Failure);
    assert_eq!(summary.failed().len(), 2);
    assert_eq!(state.status_of("Panicking"), Some(TaskStatus::Fail));
    assert_eq!(state.status_of("Erroring"), Some(TaskStatus::Fail));
    assert_eq!(state.status_of("After"), Some(TaskStatus::Pass));

    let panic_entry = &state.health_history["Panicking"][0];
    assert!(panic_entry
        .error
        .as_deref()
        .expect("error")
        .contains("resolver exploded"));
    assert!(state.failed_sections.contains("Erroring"));
    assert!(summary.render().ends_with("FAILURE"));
}

#[test]
fn engine_failed_tasks_run_again_next_time() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let tasks = task_set(vec![(
        "Flaky",
        TaskEntry::function(move |_ctx| {
            counter.set(counter.get() + 1);
            Ok(TaskResult::fail("Flaky").into())
        }),
    )]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config);
    let mut state = OrchestratorState::default();

    engine.run(&mut state, &RunOptions::default()).expect("run");
    engine.run(&mut state, &RunOptions::default()).expect("run");

    assert_eq!(calls.get(), 2);
    assert_eq!(state.health_history["Flaky"].len(), 2);
}

#[test]
fn engine_history_respects_configured_depth() {
    let tasks = task_set(vec![(
        "Always Fails",
        TaskEntry::function(|_ctx| Ok(TaskResult::fail("x").into())),
    )]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config).with_history_depth(3);
    let mut state = OrchestratorState::default();

    for _ in 0..5 {
        engine.run(&mut state, &RunOptions::default()).expect("run");
    }
    assert_eq!(state.health_history["Always Fails"].len(), 3);
    assert_eq!(engine.history_depth(), 3);
}

#[test]
fn engine_filters_select_by_substring_and_keep_the_baseline() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tracked = temp.path().join("hosts");
    fs::write(&tracked, "127.0.0.1 localhost\n").expect("write");

    let dns = Rc::new(Cell::new(0));
    let disk = Rc::new(Cell::new(0));
    let tasks = task_set(vec![
        ("DNS Check", counting_pass(&dns)),
        ("Disk Space", counting_pass(&disk)),
    ]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config).with_tracked_files(vec![tracked]);
    let mut state = OrchestratorState::default();

    let options = RunOptions {
        filters: vec!["dns".to_string()],
        ..RunOptions::default()
    };
    let summary = engine.run(&mut state, &options).expect("filtered run");

    assert_eq!(dns.get(), 1);
    assert_eq!(disk.get(), 0);
    assert!(!summary.baseline_committed);
    assert!(state.file_hashes.is_empty());
    assert_eq!(state.status_of("Disk Space"), Some(TaskStatus::Pending));

    let err = engine
        .run(
            &mut state,
            &RunOptions {
                filters: vec!["nope".to_string()],
                ..RunOptions::default()
            },
        )
        .expect_err("no match");
    assert_eq!(
        err,
        EngineError::NoMatchingTasks {
            filters: vec!["nope".to_string()]
        }
    );
}

#[test]
fn engine_prunes_state_for_unregistered_tasks() {
    let calls = Rc::new(Cell::new(0));
    let tasks = task_set(vec![("Current", counting_pass(&calls))]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config);
    let mut state = OrchestratorState::default();
    state.record_health(
        "Removed",
        HealthEntry::new(TaskStatus::Fail, chrono::Utc::now()),
        DEFAULT_HISTORY_DEPTH,
    );
    state.mark_section_failed("Removed");

    let summary = engine.run(&mut state, &RunOptions::default()).expect("run");

    assert_eq!(summary.pruned, vec!["Removed".to_string()]);
    assert!(state.status_of("Removed").is_none());
    assert!(summary.success());
}

#[test]
fn engine_interrupt_stops_between_tasks_and_keeps_old_baseline() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tracked = temp.path().join("gitconfig");
    fs::write(&tracked, "[core]\n").expect("write");

    let flag = Arc::new(AtomicBool::new(false));
    let trip = Arc::clone(&flag);
    let second = Rc::new(Cell::new(0));
    let tasks = task_set(vec![
        (
            "First",
            TaskEntry::function(move |_ctx| {
                trip.store(true, Ordering::SeqCst);
                Ok(TaskResult::pass("First").into())
            }),
        ),
        ("Second", counting_pass(&second)),
    ]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config)
        .with_tracked_files(vec![tracked])
        .with_cancel_flag(&flag);
    let mut state = OrchestratorState::default();

    let summary = engine.run(&mut state, &RunOptions::default()).expect("run");

    assert!(summary.interrupted);
    assert_eq!(summary.status, RunStatus::Incomplete);
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(second.get(), 0);
    assert!(!summary.baseline_committed);
    assert!(state.file_hashes.is_empty());
    assert_eq!(state.last_run_status, Some(RunStatus::Incomplete));
    assert_eq!(state.status_of("First"), Some(TaskStatus::Pass));
}

#[test]
fn engine_structured_reports_pass_through_with_details() {
    let tasks = task_set(vec![(
        "Toolchain",
        TaskEntry::function(|_ctx| {
            Ok(TaskReport::new(TaskStatus::Warn)
                .with_message("brew is outdated")
                .with_explanation("brew update has not run in 30 days")
                .with_recommendation("run brew update")
                .with_details(json!({"service_versions": {"brew": "4.2.0"}, "age_days": 30}))
                .into())
        }),
    )]);
    let config = Value::Null;
    let engine = ExecutionEngine::new(&tasks, &config);
    let mut state = OrchestratorState::default();

    let summary = engine.run(&mut state, &RunOptions::default()).expect("run");

    assert!(summary.success());
    assert_eq!(state.status_of("Toolchain"), Some(TaskStatus::Warn));
    assert!(state.completed_sections.contains("Toolchain"));
    assert_eq!(
        state.service_versions.get("brew").map(String::as_str),
        Some("4.2.0")
    );
    let entry = &state.health_history["Toolchain"][0];
    assert_eq!(entry.message.as_deref(), Some("brew is outdated"));
    assert_eq!(
        entry.explanation.as_deref(),
        Some("brew update has not run in 30 days")
    );
    assert_eq!(entry.extra.get("age_days").map(String::as_str), Some("30"));
    assert_eq!(
        entry.extra.get("recommendation").map(String::as_str),
        Some("run brew update")
    );
}

#[test]
fn engine_tasks_see_state_and_config_read_only() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let tasks = task_set(vec![(
        "Observer",
        TaskEntry::function(move |ctx: &Context<'_>| {
            sink.borrow_mut().push((
                ctx.state.status_of("Observer"),
                ctx.config.get("threshold").cloned(),
                ctx.mode,
            ));
            Ok(TaskResult::fail("Observer").into())
        }),
    )]);
    let config = json!({"threshold": 90});
    let engine = ExecutionEngine::new(&tasks, &config);
    let mut state = OrchestratorState::default();

    engine.run(&mut state, &RunOptions::default()).expect("run");
    engine.run(&mut state, &RunOptions::default()).expect("run");

    let seen = seen.borrow();
    assert_eq!(seen[0], (Some(TaskStatus::Pending), Some(json!(90)), RunMode::Run));
    assert_eq!(seen[1].0, Some(TaskStatus::Fail));
}

struct RecordingCollector {
    calls: RefCell<Vec<(String, String)>>,
}

impl DiagnosticsCollector for RecordingCollector {
    fn collect(&self, task: &str, error: &str, _ctx: &Context<'_>) -> Value {
        self.calls
            .borrow_mut()
            .push((task.to_string(), error.to_string()));
        json!({"failed_task": task})
    }
}

#[test]
fn engine_collects_diagnostics_only_for_failures() {
    let calls = Rc::new(Cell::new(0));
    let tasks = task_set(vec![
        ("Healthy", counting_pass(&calls)),
        (
            "Broken",
            TaskEntry::function(|_ctx| Err(TaskError::Failed("port 53 closed".to_string()))),
        ),
    ]);
    let config = Value::Null;
    let collector = RecordingCollector {
        calls: RefCell::new(Vec::new()),
    };
    let engine = ExecutionEngine::new(&tasks, &config).with_diagnostics(&collector);
    let mut state = OrchestratorState::default();

    let summary = engine.run(&mut state, &RunOptions::default()).expect("run");

    assert_eq!(
        *collector.calls.borrow(),
        vec![("Broken".to_string(), "port 53 closed".to_string())]
    );
    let broken = summary
        .outcomes
        .iter()
        .find(|outcome| outcome.name == "Broken")
        .expect("broken outcome");
    assert_eq!(broken.diagnostics, Some(json!({"failed_task": "Broken"})));
    assert!(summary.outcomes[0].diagnostics.is_none());
}
