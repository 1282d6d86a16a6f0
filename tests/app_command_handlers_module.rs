use benchkeeper::app::cli::{parse_cli_verb, split_global_flags, CliVerb};
use benchkeeper::app::command_handlers::run_cli_with_env;
use benchkeeper::app::command_support::AppEnv;
use benchkeeper::state::{OrchestratorState, StateStore};
use benchkeeper::task::TaskStatus;
use benchkeeper::tasks::marker::NAME as MARKER_TASK;
use benchkeeper::tasks::toolchain::NAME as TOOLCHAIN_TASK;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = "task_config:\n  required_binaries: [sh]\n";

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn test_env() -> (TempDir, AppEnv) {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_path = temp.path().join("config.yaml");
    fs::write(&config_path, CONFIG).expect("write config");
    let env = AppEnv::new(config_path, temp.path().join("state"), temp.path());
    (temp, env)
}

fn saved_state(env: &AppEnv) -> OrchestratorState {
    StateStore::new(env.paths.state_file())
        .try_load()
        .expect("valid state")
        .expect("state exists")
}

#[test]
fn app_cli_parses_verbs_and_global_flags() {
    assert_eq!(parse_cli_verb("auto-fix"), CliVerb::AutoFix);
    assert_eq!(parse_cli_verb("export-state"), CliVerb::ExportState);
    assert_eq!(parse_cli_verb("--help"), CliVerb::Help);
    assert_eq!(parse_cli_verb("autofix"), CliVerb::Unknown);

    let (verbose, rest) = split_global_flags(args(&["run", "-v", "--dry-run"]));
    assert!(verbose);
    assert_eq!(rest, args(&["run", "--dry-run"]));
}

#[test]
fn app_run_fails_then_auto_fix_heals_and_rerun_succeeds() {
    let (_temp, env) = test_env();

    let first = run_cli_with_env(args(&["run"]), &env).expect("run");
    assert!(!first.success);
    assert!(first.output.contains(MARKER_TASK));
    assert!(first.output.contains("FAILURE"));
    assert!(first.output.contains("diagnostics for"));

    let state = saved_state(&env);
    assert_eq!(state.status_of(MARKER_TASK), Some(TaskStatus::Fail));
    assert_eq!(state.status_of(TOOLCHAIN_TASK), Some(TaskStatus::Pass));
    let snapshots = fs::read_dir(env.paths.diagnostics_dir())
        .expect("diagnostics dir")
        .count();
    assert_eq!(snapshots, 1);

    let fixed = run_cli_with_env(args(&["auto-fix"]), &env).expect("auto-fix");
    assert!(fixed.success, "{}", fixed.output);
    assert!(fixed.output.contains("HEALED"));
    assert!(env.paths.heal_check_marker().is_file());
    assert_eq!(
        saved_state(&env).status_of(MARKER_TASK),
        Some(TaskStatus::Pass)
    );

    let again = run_cli_with_env(args(&["run"]), &env).expect("rerun");
    assert!(again.success, "{}", again.output);
    assert!(again.output.contains("(skipped)"));

    let nothing = run_cli_with_env(args(&["auto-fix"]), &env).expect("auto-fix");
    assert!(nothing.success);
    assert_eq!(nothing.output, "no failed tasks to fix");

    let events = fs::read_to_string(env.paths.event_log_path()).expect("event log");
    assert!(events.contains("run.start"));
    assert!(events.contains("remediation.auto_fix"));
}

#[test]
fn app_dry_runs_never_write_state_or_heal() {
    let (temp, env) = test_env();

    let run = run_cli_with_env(args(&["run", "--dry-run"]), &env).expect("dry run");
    assert!(!run.success);
    assert!(!env.paths.state_file().exists());
    assert!(!env.paths.event_log_path().exists());
    assert!(!temp.path().join("state").exists());

    let fix = run_cli_with_env(args(&["auto-fix", "--dry-run"]), &env).expect("dry fix");
    assert_eq!(fix.output, "no failed tasks to fix");

    run_cli_with_env(args(&["run"]), &env).expect("real run");
    let before = fs::read(env.paths.state_file()).expect("state");
    let events_before = fs::read_to_string(env.paths.event_log_path()).expect("event log");
    let fix = run_cli_with_env(args(&["auto-fix", "--dry-run"]), &env).expect("dry fix");
    assert!(fix.output.contains("dry run"));
    assert!(!env.paths.heal_check_marker().exists());
    assert_eq!(fs::read(env.paths.state_file()).expect("state"), before);
    assert_eq!(
        fs::read_to_string(env.paths.event_log_path()).expect("event log"),
        events_before
    );
}

#[test]
fn app_diagnose_reports_and_optionally_heals_one_task() {
    let (_temp, env) = test_env();

    let report = run_cli_with_env(args(&["diagnose", "marker heal check"]), &env)
        .expect("diagnose");
    assert!(!report.success);
    assert!(report.output.contains("status: FAIL"));
    assert!(report.output.contains("remediation plan:"));
    assert!(report.output.contains("--autofix"));
    assert_eq!(
        saved_state(&env).status_of(MARKER_TASK),
        Some(TaskStatus::Pending)
    );

    let healed = run_cli_with_env(
        args(&["diagnose", "Marker Heal Check", "--autofix"]),
        &env,
    )
    .expect("diagnose autofix");
    assert!(healed.success, "{}", healed.output);
    assert!(healed.output.contains("HEALED"));
    assert!(healed.output.contains("recent history:"));

    let err = run_cli_with_env(args(&["diagnose", "No Such Task"]), &env)
        .expect_err("unknown task");
    assert!(err.contains("unknown task"));
}

#[test]
fn app_reset_state_variants() {
    let (_temp, env) = test_env();
    run_cli_with_env(args(&["run"]), &env).expect("run");

    let only_failed =
        run_cli_with_env(args(&["reset-state", "--only-failed"]), &env).expect("reset failed");
    assert!(only_failed.output.contains("backup written to"));
    assert!(only_failed.output.contains(MARKER_TASK));
    let state = saved_state(&env);
    assert_eq!(state.status_of(MARKER_TASK), Some(TaskStatus::Pending));
    assert_eq!(state.status_of(TOOLCHAIN_TASK), Some(TaskStatus::Pass));
    assert_eq!(
        fs::read_dir(env.paths.backups_dir())
            .expect("backups")
            .count(),
        1
    );

    let full = run_cli_with_env(args(&["reset-state", "--no-backup"]), &env).expect("reset");
    assert!(!full.output.contains("backup"));
    assert_eq!(saved_state(&env), OrchestratorState::default());

    let err = run_cli_with_env(args(&["reset-state", "--backup", "--no-backup"]), &env)
        .expect_err("conflicting flags");
    assert!(err.contains("mutually exclusive"));
}

#[test]
fn app_export_state_records_the_report_path() {
    let (_temp, env) = test_env();
    run_cli_with_env(args(&["run"]), &env).expect("run");

    let exported =
        run_cli_with_env(args(&["export-state", "--fmt", "csv"]), &env).expect("export");
    assert!(exported.output.ends_with(".csv"));
    let body = fs::read_to_string(&exported.output).expect("read export");
    assert!(body.contains(MARKER_TASK));
    assert_eq!(
        saved_state(&env).last_report_path.as_deref(),
        Some(exported.output.as_str())
    );

    let err = run_cli_with_env(args(&["export-state", "--fmt=xml"]), &env)
        .expect_err("unknown format");
    assert!(err.contains("unknown export format"));
}

#[test]
fn app_listing_commands_read_recorded_state() {
    let (_temp, env) = test_env();
    run_cli_with_env(args(&["run"]), &env).expect("run");

    let failed =
        run_cli_with_env(args(&["list-tasks", "--status", "fail"]), &env).expect("list");
    assert!(failed.output.contains(MARKER_TASK));
    assert!(!failed.output.contains(TOOLCHAIN_TASK));

    let info = run_cli_with_env(args(&["task-info", TOOLCHAIN_TASK]), &env).expect("info");
    assert!(info.output.contains("kind: function"));
    assert!(info.output.contains("status: PASS"));
    assert!(info.output.contains("benchkeeper::tasks::toolchain"));

    let health = run_cli_with_env(args(&["task-info", MARKER_TASK, "--check"]), &env)
        .expect("health check");
    assert!(!health.success);
    assert!(health.output.contains("health check: FAIL"));
    fs::write(env.paths.heal_check_marker(), "").expect("write marker");
    let health = run_cli_with_env(args(&["task-info", MARKER_TASK, "--check"]), &env)
        .expect("health check");
    assert!(health.success, "{}", health.output);
    assert!(health.output.contains("health check: PASS"));
    assert_eq!(
        saved_state(&env).status_of(MARKER_TASK),
        Some(TaskStatus::Fail)
    );

    let history = run_cli_with_env(args(&["history", "--task", MARKER_TASK]), &env)
        .expect("history");
    assert!(history.output.contains("(1 entries)"));
    assert!(history.output.contains("FAIL"));
}

#[test]
fn app_run_rejects_bad_arguments() {
    let (_temp, env) = test_env();

    let err = run_cli_with_env(args(&["run", "--task", "nothing-matches"]), &env)
        .expect_err("no match");
    assert!(err.contains("no task matches"));

    let err = run_cli_with_env(args(&["run", "--mode", "chaos"]), &env).expect_err("bad mode");
    assert!(err.contains("unknown mode"));

    let err = run_cli_with_env(args(&["run", "--bogus"]), &env).expect_err("bad flag");
    assert!(err.contains("unexpected argument"));

    let err = run_cli_with_env(args(&["frobnicate"]), &env).expect_err("unknown command");
    assert!(err.contains("unknown command"));
}

#[test]
fn app_generate_config_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let env = AppEnv::new(
        temp.path().join("cfg/config.yaml"),
        temp.path().join("state"),
        temp.path(),
    );

    let created = run_cli_with_env(args(&["generate-config"]), &env).expect("generate");
    assert!(created.output.contains("wrote default settings"));
    assert!(env.config_path.is_file());

    let err = run_cli_with_env(args(&["generate-config"]), &env).expect_err("exists");
    assert!(err.contains("--force"));
    run_cli_with_env(args(&["generate-config", "--force"]), &env).expect("forced");
}
