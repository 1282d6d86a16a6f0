use crate::shared::fs_atomic::{atomic_write_file_with_mode, OWNER_ONLY_MODE};
use crate::shared::ids::slugify;
use crate::shared::process::{CommandRunner, SystemRunner};
use crate::shared::sanitize::{trim_large_fields, TrimLimits};
use crate::task::Context;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_LOG_TAIL_LINES: usize = 100;

/// Produces an opaque snapshot of system context for a failed task. The orchestrator only
/// stores and forwards what it returns.
pub trait DiagnosticsCollector {
    fn collect(&self, task: &str, error: &str, ctx: &Context<'_>) -> Value;
}

pub struct SystemDiagnostics<R: CommandRunner = SystemRunner> {
    runner: R,
    limits: TrimLimits,
    event_log: Option<PathBuf>,
}

impl SystemDiagnostics<SystemRunner> {
    pub fn new(limits: TrimLimits) -> Self {
        Self::with_runner(SystemRunner, limits)
    }
}

impl<R: CommandRunner> SystemDiagnostics<R> {
    pub fn with_runner(runner: R, limits: TrimLimits) -> Self {
        Self {
            runner,
            limits,
            event_log: None,
        }
    }

    pub fn with_event_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.event_log = Some(path.into());
        self
    }

    fn probe(&self, argv: &[&str]) -> Value {
        let argv: Vec<String> = argv.iter().map(|arg| arg.to_string()).collect();
        match self.runner.run(&argv, PROBE_TIMEOUT) {
            Ok(output) => Value::String(output.stdout.trim().to_string()),
            Err(err) => json!({ "error": err.to_string() }),
        }
    }

    fn event_log_tail(&self) -> Value {
        let Some(path) = self.event_log.as_ref() else {
            return Value::Null;
        };
        match fs::read_to_string(path) {
            Ok(raw) => {
                let lines: Vec<&str> = raw.lines().collect();
                let start = lines.len().saturating_sub(EVENT_LOG_TAIL_LINES);
                Value::String(lines[start..].join("\n"))
            }
            Err(_) => Value::Null,
        }
    }
}

impl<R: CommandRunner> DiagnosticsCollector for SystemDiagnostics<R> {
    fn collect(&self, task: &str, error: &str, ctx: &Context<'_>) -> Value {
        let user = std::env::var("USER")
            .map(Value::String)
            .unwrap_or_else(|_| self.probe(&["whoami"]));
        let raw = json!({
            "timestamp": ctx.now.to_rfc3339(),
            "failed_task": task,
            "error": error,
            "context": {
                "mode": ctx.mode.as_str(),
                "dry_run": ctx.dry_run,
                "autofix": ctx.autofix,
            },
            "system": {
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "family": std::env::consts::FAMILY,
                "hostname": self.probe(&["hostname"]),
                "uptime": self.probe(&["uptime"]),
                "user": user,
            },
            "event_log_tail": self.event_log_tail(),
        });

        let Value::Object(snapshot) = raw else {
            return raw;
        };
        let (mut trimmed, stats) = trim_large_fields(&snapshot, &self.limits);
        trimmed.insert(
            "trim_stats".to_string(),
            serde_json::to_value(stats).unwrap_or(Value::Null),
        );
        Value::Object(trimmed)
    }
}

pub fn persist_snapshot(
    dir: &Path,
    task: &str,
    now: DateTime<Utc>,
    snapshot: &Value,
) -> std::io::Result<PathBuf> {
    let path = dir.join(format!(
        "{}-{}.json",
        slugify(task),
        now.format("%Y%m%d-%H%M%S")
    ));
    let body = serde_json::to_vec_pretty(snapshot).map_err(std::io::Error::other)?;
    atomic_write_file_with_mode(&path, &body, OWNER_ONLY_MODE)?;
    Ok(path)
}

