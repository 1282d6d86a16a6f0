pub mod allowlist;
pub mod executor;

pub use allowlist::ShellAllowList;
pub use executor::{
    ActionExecutor, ActionOutcome, Platform, SystemActionExecutor, SERVICE_TIMEOUT, SHELL_TIMEOUT,
};

use crate::engine::{invoke_guarded, record_result, NormalizedResult};
use crate::registry::{DiscoveredTask, TaskSet};
use crate::state::{OrchestratorState, DEFAULT_HISTORY_DEPTH};
use crate::task::{Context, RemediationPlan, RunMode, TaskStatus};
use chrono::Utc;
use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RemediationError {
    #[error("unknown task `{name}`")]
    UnknownTask { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealOutcome {
    AlreadyHealthy,
    NoPlan,
    ManualRequired { action_index: usize, instructions: String },
    ActionFailed { action_index: usize, reason: String },
    DryRun { planned: Vec<String> },
    Healed,
    Unhealed { status: TaskStatus, message: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealReport {
    pub task: String,
    pub plan: Option<RemediationPlan>,
    pub actions: Vec<ActionOutcome>,
    pub outcome: HealOutcome,
}

impl HealReport {
    pub fn healed(&self) -> bool {
        self.outcome == HealOutcome::Healed
    }

    pub fn unresolved(&self) -> bool {
        !matches!(
            self.outcome,
            HealOutcome::Healed | HealOutcome::AlreadyHealthy | HealOutcome::DryRun { .. }
        )
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        let verdict = match &self.outcome {
            HealOutcome::AlreadyHealthy => "already passing".to_string(),
            HealOutcome::NoPlan => "no remediation plan; manual intervention required".to_string(),
            HealOutcome::ManualRequired { action_index, .. } => {
                format!("halted at action {}; manual intervention required", action_index + 1)
            }
            HealOutcome::ActionFailed {
                action_index,
                reason,
            } => format!("action {} failed: {reason}", action_index + 1),
            HealOutcome::DryRun { planned } => {
                format!("dry run; {} action(s) planned", planned.len())
            }
            HealOutcome::Healed => "HEALED".to_string(),
            HealOutcome::Unhealed { status, message } => match message {
                Some(message) => format!("UNHEALED (re-run reported {status}: {message})"),
                None => format!("UNHEALED (re-run reported {status})"),
            },
        };
        lines.push(format!("{}: {verdict}", self.task));
        if let Some(plan) = self.plan.as_ref() {
            lines.push(format!("  plan: {}", plan.description));
        }
        for action in &self.actions {
            lines.push(format!("  - {}", action.describe()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoFixSummary {
    pub reports: Vec<HealReport>,
}

impl AutoFixSummary {
    pub fn healed(&self) -> usize {
        self.reports.iter().filter(|report| report.healed()).count()
    }

    pub fn unhealed(&self) -> usize {
        self.reports.iter().filter(|report| report.unresolved()).count()
    }

    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self.reports.iter().map(HealReport::render).collect();
        lines.push(format!(
            "healed: {}  unhealed: {}",
            self.healed(),
            self.unhealed()
        ));
        lines.join("\n")
    }
}

pub struct RemediationEngine<'a, E: ActionExecutor> {
    tasks: &'a TaskSet,
    config: &'a Value,
    executor: E,
    history_depth: usize,
}

impl<'a, E: ActionExecutor> RemediationEngine<'a, E> {
    pub fn new(tasks: &'a TaskSet, config: &'a Value, executor: E) -> Self {
        Self {
            tasks,
            config,
            executor,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn auto_fix(&self, state: &mut OrchestratorState, dry_run: bool) -> AutoFixSummary {
        let failing: Vec<&DiscoveredTask> = self
            .tasks
            .iter()
            .filter(|task| state.status_of(&task.name) == Some(TaskStatus::Fail))
            .collect();
        let reports = failing
            .into_iter()
            .map(|task| self.heal_discovered(state, task, dry_run))
            .collect();
        AutoFixSummary { reports }
    }

    pub fn heal_task(
        &self,
        state: &mut OrchestratorState,
        name: &str,
        dry_run: bool,
    ) -> Result<HealReport, RemediationError> {
        let task = self
            .tasks
            .find(name)
            .ok_or_else(|| RemediationError::UnknownTask {
                name: name.to_string(),
            })?;
        Ok(self.heal_discovered(state, task, dry_run))
    }

    fn heal_discovered(
        &self,
        state: &mut OrchestratorState,
        task: &DiscoveredTask,
        dry_run: bool,
    ) -> HealReport {
        let now = Utc::now();
        let diagnosis = {
            let ctx = Context::new(RunMode::Diagnose, dry_run, state, self.config)
                .with_autofix(true)
                .with_now(now);
            invoke_guarded(&task.name, &task.entry, &ctx)
        };

        if diagnosis.status != TaskStatus::Pass {
            return self.heal_with_plan(state, task, diagnosis.remediation_plan, dry_run);
        }

        // a passing diagnosis is only trusted once the real run agrees
        let confirmation = {
            let ctx = Context::new(RunMode::Run, dry_run, state, self.config).with_now(now);
            invoke_guarded(&task.name, &task.entry, &ctx)
        };
        if confirmation.status != TaskStatus::Pass {
            tracing::warn!(
                task = %task.name,
                status = %confirmation.status,
                "diagnosis passed but the task run does not"
            );
            return self.heal_with_plan(state, task, confirmation.remediation_plan, dry_run);
        }

        if !dry_run {
            record_result(state, &confirmation, now, self.history_depth);
        }
        HealReport {
            task: task.name.clone(),
            plan: None,
            actions: Vec::new(),
            outcome: HealOutcome::AlreadyHealthy,
        }
    }

    /// Executes `plan` in order, stopping at the first action that does not succeed, and
    /// commits PASS only when re-running the task itself reports PASS.
    pub fn heal_with_plan(
        &self,
        state: &mut OrchestratorState,
        task: &DiscoveredTask,
        plan: Option<RemediationPlan>,
        dry_run: bool,
    ) -> HealReport {
        let Some(plan) = plan.filter(|plan| !plan.actions.is_empty()) else {
            tracing::info!(task = %task.name, "no remediation plan offered");
            return HealReport {
                task: task.name.clone(),
                plan: None,
                actions: Vec::new(),
                outcome: HealOutcome::NoPlan,
            };
        };

        let mut actions = Vec::with_capacity(plan.actions.len());
        let mut halted = None;
        for (index, action) in plan.actions.iter().enumerate() {
            let outcome = self.executor.execute(action, dry_run);
            let proceeds = outcome.proceeds();
            if !proceeds {
                halted = Some(match &outcome {
                    ActionOutcome::ManualRequired { instructions } => HealOutcome::ManualRequired {
                        action_index: index,
                        instructions: instructions.clone(),
                    },
                    other => HealOutcome::ActionFailed {
                        action_index: index,
                        reason: other.describe(),
                    },
                });
            }
            actions.push(outcome);
            if !proceeds {
                break;
            }
        }

        if let Some(outcome) = halted {
            tracing::warn!(task = %task.name, outcome = ?outcome, "remediation halted");
            if !dry_run {
                let note = match &outcome {
                    HealOutcome::ManualRequired { instructions, .. } => {
                        format!("manual intervention required: {instructions}")
                    }
                    HealOutcome::ActionFailed { reason, .. } => {
                        format!("remediation halted: {reason}")
                    }
                    _ => "remediation halted".to_string(),
                };
                self.record_unhealed(state, &task.name, note);
            }
            return HealReport {
                task: task.name.clone(),
                plan: Some(plan),
                actions,
                outcome,
            };
        }

        if dry_run {
            let planned = actions
                .iter()
                .filter_map(|outcome| match outcome {
                    ActionOutcome::WouldRun { command } => Some(command.clone()),
                    _ => None,
                })
                .collect();
            return HealReport {
                task: task.name.clone(),
                plan: Some(plan),
                actions,
                outcome: HealOutcome::DryRun { planned },
            };
        }

        let now = Utc::now();
        let verification = {
            let ctx = Context::new(RunMode::Run, false, state, self.config).with_now(now);
            invoke_guarded(&task.name, &task.entry, &ctx)
        };

        let outcome = if verification.status == TaskStatus::Pass {
            tracing::info!(task = %task.name, "task healed and re-verified");
            record_result(state, &verification, now, self.history_depth);
            HealOutcome::Healed
        } else {
            tracing::warn!(
                task = %task.name,
                status = %verification.status,
                "remediation actions succeeded but the task still does not pass"
            );
            let message = verification.headline();
            let mut unhealed = verification.clone();
            unhealed.status = TaskStatus::Fail;
            unhealed.error = Some(format!(
                "verification after remediation reported {}",
                verification.status
            ));
            record_result(state, &unhealed, now, self.history_depth);
            HealOutcome::Unhealed {
                status: verification.status,
                message,
            }
        };

        HealReport {
            task: task.name.clone(),
            plan: Some(plan),
            actions,
            outcome,
        }
    }

    fn record_unhealed(&self, state: &mut OrchestratorState, name: &str, note: String) {
        let result = NormalizedResult::failure(name, note);
        record_result(state, &result, Utc::now(), self.history_depth);
    }
}
