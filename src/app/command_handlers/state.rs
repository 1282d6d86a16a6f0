use crate::app::command_support::{AppEnv, ArgList, CommandOutcome, Session};
use crate::report::{
    export_state, render_health_entry, render_history, render_task_table, ExportFormat,
};
use crate::state::{OrchestratorState, MAX_HISTORY_DEPTH};
use crate::engine::health_check_guarded;
use crate::task::{Context, RunMode, TaskStatus};
use chrono::Utc;

const RESET_USAGE: &str = "reset-state [--only-failed] [--backup|--no-backup]";
const EXPORT_USAGE: &str = "export-state [--fmt json|csv|yaml]";
const LIST_USAGE: &str = "list-tasks [--status pass|fail|warn|pending]";
const TASK_INFO_USAGE: &str = "task-info <task> [--check]";
const HISTORY_USAGE: &str = "history [--task <name>]";
const TASK_INFO_HISTORY_ENTRIES: usize = 5;

pub fn cmd_reset_state(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let only_failed = args.take_flag("--only-failed");
    let backup_flag = args.take_flag("--backup");
    let no_backup = args.take_flag("--no-backup");
    args.finish(RESET_USAGE)?;
    if backup_flag && no_backup {
        return Err("--backup and --no-backup are mutually exclusive".to_string());
    }

    let mut session = Session::open(env)?;
    let mut lines = Vec::new();
    if !no_backup {
        match session
            .store
            .backup(&env.paths.backups_dir(), Utc::now())
            .map_err(|e| e.to_string())?
        {
            Some(path) => lines.push(format!("backup written to {}", path.display())),
            None => lines.push("no existing state to back up".to_string()),
        }
    }

    if only_failed {
        let reset = session.state.reset_failed();
        if reset.is_empty() {
            lines.push("no failed tasks to reset".to_string());
        } else {
            lines.push(format!("reset {} failed task(s) to PENDING:", reset.len()));
            lines.extend(reset.iter().map(|name| format!("  {name}")));
        }
        env.log_event("info", "state.reset_failed", &format!("reset={}", reset.len()));
    } else {
        session.state = OrchestratorState::default();
        lines.push("state reset to defaults".to_string());
        env.log_event("warn", "state.reset", "state reset to defaults");
    }

    session.save(false)?;
    Ok(CommandOutcome::ok(lines.join("\n")))
}

pub fn cmd_export_state(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let format = match args.take_value("--fmt")? {
        Some(raw) => ExportFormat::parse(&raw)?,
        None => ExportFormat::Json,
    };
    args.finish(EXPORT_USAGE)?;

    let mut session = Session::open(env)?;
    let path = export_state(
        &session.state,
        &env.paths.exports_dir(),
        format,
        Utc::now(),
    )
    .map_err(|e| e.to_string())?;
    session
        .state
        .set_last_report_path(path.display().to_string());
    session.save(false)?;
    Ok(CommandOutcome::ok(path.display().to_string()))
}

pub fn cmd_list_tasks(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let filter = match args.take_value("--status")? {
        Some(raw) => Some(TaskStatus::parse(&raw)?),
        None => None,
    };
    args.finish(LIST_USAGE)?;

    let session = Session::open(env)?;
    let mut state = session.state.clone();
    state.ensure_tasks(session.tasks.names());
    Ok(CommandOutcome::ok(render_task_table(&state, filter)))
}

pub fn cmd_task_info(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let check = args.take_flag("--check");
    let name = args.take_positional(TASK_INFO_USAGE)?;
    args.finish(TASK_INFO_USAGE)?;

    let session = Session::open(env)?;
    let task = session
        .tasks
        .find(&name)
        .ok_or_else(|| format!("unknown task `{name}`"))?;

    let mut lines = vec![
        format!("task: {}", task.name),
        format!("kind: {}", task.entry.kind()),
        format!("origin: {}", task.origin),
    ];
    if !task.entry.description().is_empty() {
        lines.push(format!("description: {}", task.entry.description()));
    }
    match session.state.record_of(&task.name) {
        Some(record) => {
            lines.push(format!("status: {}", record.status));
            if let Some(at) = record.last_update {
                lines.push(format!("last update: {}", at.to_rfc3339()));
            }
            if let Some(at) = record.last_healthy {
                lines.push(format!("last healthy: {}", at.to_rfc3339()));
            }
        }
        None => lines.push("status: PENDING (never run)".to_string()),
    }

    // live health check only; never recorded
    let mut healthy = true;
    if check {
        let health = {
            let ctx = Context::new(RunMode::Diagnose, true, &session.state, &session.task_config)
                .with_now(Utc::now());
            health_check_guarded(&task.name, &task.entry, &ctx)
        };
        healthy = health.status != TaskStatus::Fail;
        lines.push(match health.headline() {
            Some(headline) => format!("health check: {} ({headline})", health.status),
            None => format!("health check: {}", health.status),
        });
    }

    let history = session
        .state
        .health_trend(&task.name, TASK_INFO_HISTORY_ENTRIES);
    if !history.is_empty() {
        lines.push("recent history:".to_string());
        for entry in history {
            lines.push(format!("  {}", render_health_entry(entry)));
        }
    }
    let output = lines.join("\n");
    Ok(if healthy {
        CommandOutcome::ok(output)
    } else {
        CommandOutcome::failed(output)
    })
}

pub fn cmd_history(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let task = args.take_value("--task")?;
    args.finish(HISTORY_USAGE)?;

    let session = Session::open(env)?;
    let resolved = task.map(|name| match session.tasks.find(&name) {
        Some(found) => found.name.clone(),
        None => name,
    });
    Ok(CommandOutcome::ok(render_history(
        &session.state,
        resolved.as_deref(),
        MAX_HISTORY_DEPTH,
    )))
}
