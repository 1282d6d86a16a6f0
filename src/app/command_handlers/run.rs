use crate::app::command_support::{AppEnv, ArgList, CommandOutcome, Session};
use crate::diagnostics::{persist_snapshot, DiagnosticsCollector};
use crate::engine::{ExecutionEngine, RunOptions};
use crate::runtime::interrupt_flag;
use crate::task::RunMode;
use chrono::Utc;

const USAGE: &str = "run [--dry-run] [--mode run|test|stress|security] [--task <filter>]...";

pub fn parse_run_options(args: &[String]) -> Result<RunOptions, String> {
    let mut args = ArgList::new(args);
    let dry_run = args.take_flag("--dry-run");
    let mode = match args.take_value("--mode")? {
        Some(raw) => RunMode::parse(&raw)?,
        None => RunMode::Run,
    };
    let filters = args.take_values("--task")?;
    args.finish(USAGE)?;
    Ok(RunOptions {
        mode,
        dry_run,
        autofix: false,
        filters,
    })
}

pub fn cmd_run(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let options = parse_run_options(args)?;
    let mut session = Session::open_with(env, options.dry_run)?;
    let diagnostics = session.diagnostics(env);
    let tracked_files = session.tracked_files(env);

    session.log_event(
        env,
        "info",
        "run.start",
        &format!("mode={} dry_run={}", options.mode, options.dry_run),
    );

    let summary = {
        let mut engine = ExecutionEngine::new(&session.tasks, &session.task_config)
            .with_tracked_files(tracked_files)
            .with_history_depth(session.settings.history_depth)
            .with_cancel_flag(interrupt_flag());
        if let Some(collector) = diagnostics.as_ref() {
            engine = engine.with_diagnostics(collector as &dyn DiagnosticsCollector);
        }
        engine
            .run(&mut session.state, &options)
            .map_err(|e| e.to_string())?
    };

    let mut lines = vec![summary.render()];
    if !options.dry_run {
        let now = Utc::now();
        for outcome in &summary.outcomes {
            let Some(snapshot) = outcome.diagnostics.as_ref() else {
                continue;
            };
            match persist_snapshot(&env.paths.diagnostics_dir(), &outcome.name, now, snapshot) {
                Ok(path) => lines.push(format!(
                    "diagnostics for {}: {}",
                    outcome.name,
                    path.display()
                )),
                Err(err) => tracing::warn!(
                    task = %outcome.name,
                    error = %err,
                    "failed to persist diagnostics"
                ),
            }
        }
    }

    session.save(options.dry_run)?;
    session.log_event(
        env,
        if summary.success() { "info" } else { "warn" },
        "run.finish",
        &format!(
            "status={} tasks={} failed={}",
            summary.status,
            summary.outcomes.len(),
            summary.failed().len()
        ),
    );

    let output = lines.join("\n");
    if summary.success() {
        Ok(CommandOutcome::ok(output))
    } else {
        Ok(CommandOutcome::failed(output))
    }
}
