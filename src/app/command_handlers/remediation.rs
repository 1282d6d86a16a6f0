use crate::app::command_support::{AppEnv, ArgList, CommandOutcome, Session};
use crate::diagnostics::{persist_snapshot, DiagnosticsCollector};
use crate::engine::invoke_guarded;
use crate::remediation::RemediationEngine;
use crate::report::render_health_entry;
use crate::task::{Context, RunMode, TaskStatus};
use chrono::Utc;

const DIAGNOSE_USAGE: &str = "diagnose <task> [--autofix] [--dry-run]";
const AUTO_FIX_USAGE: &str = "auto-fix [--dry-run]";
const DIAGNOSE_HISTORY_ENTRIES: usize = 3;

pub fn cmd_diagnose(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let autofix = args.take_flag("--autofix");
    let dry_run = args.take_flag("--dry-run");
    let name = args.take_positional(DIAGNOSE_USAGE)?;
    args.finish(DIAGNOSE_USAGE)?;

    let mut session = Session::open_with(env, dry_run)?;
    let diagnostics = session.diagnostics(env);
    let executor = session.executor(env);
    let task = session
        .tasks
        .find(&name)
        .ok_or_else(|| format!("unknown task `{name}`"))?;
    session.state.ensure_tasks(session.tasks.names());

    let now = Utc::now();
    let (result, snapshot) = {
        let ctx = Context::new(
            RunMode::Diagnose,
            dry_run,
            &session.state,
            &session.task_config,
        )
        .with_autofix(autofix)
        .with_now(now);
        let result = invoke_guarded(&task.name, &task.entry, &ctx);
        let snapshot = match (result.status, diagnostics.as_ref()) {
            (TaskStatus::Fail, Some(collector)) => Some(collector.collect(
                &task.name,
                &result.headline().unwrap_or_default(),
                &ctx,
            )),
            _ => None,
        };
        (result, snapshot)
    };
    let mut lines = vec![
        format!("task: {}", task.name),
        format!("status: {}", result.status),
    ];
    for message in &result.messages {
        lines.push(format!("message: {message}"));
    }
    if let Some(error) = result.error.as_deref() {
        lines.push(format!("error: {error}"));
    }
    if let Some(details) = result.details.as_ref() {
        let rendered =
            serde_json::to_string_pretty(details).unwrap_or_else(|_| details.to_string());
        lines.push(format!("details: {rendered}"));
    }
    if let Some(explanation) = result.explanation.as_deref() {
        lines.push(format!("explanation: {explanation}"));
    }
    if let Some(recommendation) = result.recommendation.as_deref() {
        lines.push(format!("recommendation: {recommendation}"));
    }
    if let Some(plan) = result.remediation_plan.as_ref() {
        lines.push(format!(
            "remediation plan: {} ({} action(s))",
            plan.description,
            plan.actions.len()
        ));
    }

    if let Some(snapshot) = snapshot.as_ref().filter(|_| !dry_run) {
        match persist_snapshot(&env.paths.diagnostics_dir(), &task.name, now, snapshot) {
            Ok(path) => lines.push(format!("diagnostics: {}", path.display())),
            Err(err) => tracing::warn!(error = %err, "failed to persist diagnostics"),
        }
    }

    let mut success = result.status != TaskStatus::Fail;
    if !success {
        if autofix {
            let engine = RemediationEngine::new(&session.tasks, &session.task_config, executor)
                .with_history_depth(session.settings.history_depth);
            let report =
                engine.heal_with_plan(&mut session.state, task, result.remediation_plan, dry_run);
            session.log_event(
                env,
                if report.healed() { "info" } else { "warn" },
                "remediation.task",
                &report.render(),
            );
            success = report.healed() || (dry_run && !report.unresolved());
            lines.push(report.render());
        } else {
            lines.push(format!(
                "run `diagnose \"{}\" --autofix` to attempt remediation",
                task.name
            ));
        }
    }

    let history = session
        .state
        .health_trend(&task.name, DIAGNOSE_HISTORY_ENTRIES);
    if !history.is_empty() {
        lines.push("recent history:".to_string());
        for entry in history {
            lines.push(format!("  {}", render_health_entry(entry)));
        }
    }

    session.save(dry_run)?;
    let output = lines.join("\n");
    Ok(if success {
        CommandOutcome::ok(output)
    } else {
        CommandOutcome::failed(output)
    })
}

pub fn cmd_auto_fix(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let dry_run = args.take_flag("--dry-run");
    args.finish(AUTO_FIX_USAGE)?;

    let mut session = Session::open_with(env, dry_run)?;
    let executor = session.executor(env);
    session.state.ensure_tasks(session.tasks.names());

    let summary = {
        let engine = RemediationEngine::new(&session.tasks, &session.task_config, executor)
            .with_history_depth(session.settings.history_depth);
        engine.auto_fix(&mut session.state, dry_run)
    };

    if summary.reports.is_empty() {
        return Ok(CommandOutcome::ok("no failed tasks to fix"));
    }

    session.save(dry_run)?;
    session.log_event(
        env,
        if summary.unhealed() == 0 { "info" } else { "warn" },
        "remediation.auto_fix",
        &format!(
            "dry_run={} healed={} unhealed={}",
            dry_run,
            summary.healed(),
            summary.unhealed()
        ),
    );

    let output = summary.render();
    Ok(if summary.unhealed() == 0 {
        CommandOutcome::ok(output)
    } else {
        CommandOutcome::failed(output)
    })
}
