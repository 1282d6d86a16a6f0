pub mod normalize;

pub use normalize::{normalize, NormalizedResult};

use crate::diagnostics::DiagnosticsCollector;
use crate::drift::{compute_hashes, DriftReport};
use crate::registry::{DiscoveredTask, TaskSet};
use crate::state::{OrchestratorState, RunStatus, DEFAULT_HISTORY_DEPTH};
use crate::task::{
    Context, RemediationPlan, RunMode, TaskEntry, TaskError, TaskOutput, TaskStatus,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no task matches {filters:?}")]
    NoMatchingTasks { filters: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    pub dry_run: bool,
    pub autofix: bool,
    pub filters: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Run,
            dry_run: false,
            autofix: false,
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub name: String,
    pub status: TaskStatus,
    pub changed: bool,
    pub skipped: bool,
    pub message: Option<String>,
    pub remediation_plan: Option<RemediationPlan>,
    pub diagnostics: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcomes: Vec<TaskOutcome>,
    pub drift: DriftReport,
    pub baseline_committed: bool,
    pub interrupted: bool,
    pub pruned: Vec<String>,
    pub status: RunStatus,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn failed(&self) -> Vec<&TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == TaskStatus::Fail)
            .collect()
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.drift.is_drifted() {
            lines.push(format!("drift detected: {}", self.drift.summary()));
        }
        for outcome in &self.outcomes {
            let mut line = format!(
                "{:<32} {:<7} changed={}",
                outcome.name, outcome.status, outcome.changed
            );
            if outcome.skipped {
                line.push_str(" (skipped)");
            } else if let Some(message) = outcome.message.as_deref() {
                line.push_str(&format!(" {message}"));
            }
            lines.push(line);
        }
        if self.interrupted {
            lines.push("run interrupted; remaining tasks were not started".to_string());
        }
        lines.push(match self.status {
            RunStatus::Success => "SUCCESS".to_string(),
            RunStatus::Failure | RunStatus::Incomplete => "FAILURE".to_string(),
        });
        lines.join("\n")
    }
}

pub fn needs_run(last_status: Option<TaskStatus>, drifted: bool, mode: RunMode) -> bool {
    last_status != Some(TaskStatus::Pass) || drifted || mode.forces_reverify()
}

pub fn invoke_guarded(name: &str, entry: &TaskEntry, ctx: &Context<'_>) -> NormalizedResult {
    guarded(name, || entry.invoke(ctx))
}

pub fn health_check_guarded(
    name: &str,
    entry: &TaskEntry,
    ctx: &Context<'_>,
) -> NormalizedResult {
    guarded(name, || entry.health_check(ctx))
}

fn guarded<F>(name: &str, body: F) -> NormalizedResult
where
    F: FnOnce() -> Result<TaskOutput, TaskError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(output)) => normalize(name, output),
        Ok(Err(err)) => NormalizedResult::failure(name, err.to_string()),
        Err(payload) => {
            let reason = panic_text(payload.as_ref());
            tracing::error!(task = name, reason = %reason, "task panicked");
            NormalizedResult::failure(name, format!("task panicked: {reason}"))
        }
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "unknown panic payload".to_string()
}

pub fn record_result(
    state: &mut OrchestratorState,
    result: &NormalizedResult,
    now: DateTime<Utc>,
    history_depth: usize,
) {
    state.record_health(&result.name, result.to_health_entry(now), history_depth);
    if let Some(reported) = result
        .details
        .as_ref()
        .and_then(|details| details.get("service_versions"))
        .and_then(Value::as_object)
    {
        let mut versions = state.service_versions.clone();
        for (service, version) in reported {
            if let Some(version) = version.as_str() {
                versions.insert(service.clone(), version.to_string());
            }
        }
        state.set_service_versions(versions);
    }
    match result.status {
        TaskStatus::Fail => state.mark_section_failed(&result.name),
        TaskStatus::Pass | TaskStatus::Warn => state.mark_section_complete(&result.name),
        TaskStatus::Pending => {}
    }
}

pub struct ExecutionEngine<'a> {
    tasks: &'a TaskSet,
    config: &'a Value,
    tracked_files: Vec<PathBuf>,
    history_depth: usize,
    diagnostics: Option<&'a dyn DiagnosticsCollector>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(tasks: &'a TaskSet, config: &'a Value) -> Self {
        Self {
            tasks,
            config,
            tracked_files: Vec::new(),
            history_depth: DEFAULT_HISTORY_DEPTH,
            diagnostics: None,
            cancel: None,
        }
    }

    pub fn with_tracked_files(mut self, files: Vec<PathBuf>) -> Self {
        self.tracked_files = files;
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_diagnostics(mut self, collector: &'a dyn DiagnosticsCollector) -> Self {
        self.diagnostics = Some(collector);
        self
    }

    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn run(
        &self,
        state: &mut OrchestratorState,
        options: &RunOptions,
    ) -> Result<RunSummary, EngineError> {
        let selected = self.tasks.matching(&options.filters);
        if selected.is_empty() && !options.filters.is_empty() {
            return Err(EngineError::NoMatchingTasks {
                filters: options.filters.clone(),
            });
        }

        let pruned = state.ensure_tasks(self.tasks.names());
        if !pruned.is_empty() {
            tracing::info!(pruned = ?pruned, "dropped state for unregistered tasks");
        }

        // one drift evaluation per run; every task sees the same signal
        let current_hashes = compute_hashes(&self.tracked_files);
        let drift = DriftReport::compare(&state.file_hashes, &current_hashes);
        let drifted = drift.is_drifted();
        if drifted {
            tracing::info!(drift = %drift.summary(), "tracked files drifted");
        }

        let mut outcomes = Vec::with_capacity(selected.len());
        let mut interrupted = false;
        for task in selected {
            if self.cancelled() {
                tracing::warn!(task = %task.name, "interrupt received; stopping run");
                interrupted = true;
                break;
            }
            outcomes.push(self.run_one(state, task, options, drifted));
        }

        let baseline_committed = !interrupted && options.filters.is_empty();
        if baseline_committed {
            state.file_hashes = current_hashes;
        }

        let status = if interrupted {
            RunStatus::Incomplete
        } else if outcomes
            .iter()
            .any(|outcome| outcome.status == TaskStatus::Fail)
        {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        state.last_run_status = Some(status);

        Ok(RunSummary {
            outcomes,
            drift,
            baseline_committed,
            interrupted,
            pruned,
            status,
        })
    }

    fn run_one(
        &self,
        state: &mut OrchestratorState,
        task: &DiscoveredTask,
        options: &RunOptions,
        drifted: bool,
    ) -> TaskOutcome {
        let last_status = state.status_of(&task.name);
        if !needs_run(last_status, drifted, options.mode) {
            tracing::debug!(task = %task.name, "skipping; last run passed and nothing drifted");
            return TaskOutcome {
                name: task.name.clone(),
                status: last_status.unwrap_or(TaskStatus::Pass),
                changed: false,
                skipped: true,
                message: None,
                remediation_plan: None,
                diagnostics: None,
            };
        }

        let now = Utc::now();
        let (result, diagnostics) = {
            let ctx = Context::new(options.mode, options.dry_run, state, self.config)
                .with_autofix(options.autofix)
                .with_now(now);
            let result = invoke_guarded(&task.name, &task.entry, &ctx);
            let diagnostics = match (result.status, self.diagnostics) {
                (TaskStatus::Fail, Some(collector)) => {
                    let error = result.headline().unwrap_or_default();
                    Some(collector.collect(&task.name, &error, &ctx))
                }
                _ => None,
            };
            (result, diagnostics)
        };

        tracing::info!(
            task = %task.name,
            status = %result.status,
            changed = result.changed,
            "task finished"
        );
        record_result(state, &result, now, self.history_depth);

        TaskOutcome {
            name: task.name.clone(),
            status: result.status,
            changed: result.changed,
            skipped: false,
            message: result.headline(),
            remediation_plan: result.remediation_plan,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_run_skips_only_clean_passes() {
        assert!(!needs_run(Some(TaskStatus::Pass), false, RunMode::Run));
        assert!(needs_run(Some(TaskStatus::Pass), true, RunMode::Run));
        assert!(needs_run(Some(TaskStatus::Pass), false, RunMode::Security));
        assert!(needs_run(Some(TaskStatus::Warn), false, RunMode::Run));
        assert!(needs_run(Some(TaskStatus::Pending), false, RunMode::Run));
        assert!(needs_run(None, false, RunMode::Run));
    }
}
