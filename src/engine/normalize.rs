use crate::state::HealthEntry;
use crate::task::{RemediationPlan, TaskOutput, TaskStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    pub name: String,
    pub status: TaskStatus,
    pub changed: bool,
    pub messages: Vec<String>,
    pub details: Option<Value>,
    pub explanation: Option<String>,
    pub recommendation: Option<String>,
    pub error: Option<String>,
    pub remediation_plan: Option<RemediationPlan>,
}

impl NormalizedResult {
    pub fn failure(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: TaskStatus::Fail,
            changed: false,
            messages: Vec::new(),
            details: None,
            explanation: None,
            recommendation: None,
            error: Some(error.into()),
            remediation_plan: None,
        }
    }

    pub fn message(&self) -> Option<String> {
        if self.messages.is_empty() {
            return None;
        }
        Some(self.messages.join("; "))
    }

    pub fn headline(&self) -> Option<String> {
        self.error.clone().or_else(|| self.message())
    }

    pub fn to_health_entry(&self, now: DateTime<Utc>) -> HealthEntry {
        let mut entry = HealthEntry::new(self.status, now);
        if let Some(message) = self.message() {
            entry = entry.with_message(&message);
        }
        if let Some(error) = self.error.as_deref() {
            entry = entry.with_error(error);
        }
        if let Some(explanation) = self.explanation.as_deref() {
            entry = entry.with_explanation(explanation);
        }
        if let Some(recommendation) = self.recommendation.as_deref() {
            entry = entry.with_extra("recommendation", &Value::String(recommendation.to_string()));
        }
        if self.changed {
            entry = entry.with_extra("changed", &Value::Bool(true));
        }
        match &self.details {
            Some(Value::Object(fields)) => {
                for (key, value) in fields {
                    entry = entry.with_extra(key, value);
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => entry = entry.with_extra("details", other),
        }
        entry
    }
}

/// Maps native results to PASS/FAIL and passes structured reports through, flattening
/// severity-tagged messages into `[LEVEL] text` lines. The registry name always wins over
/// whatever name the task put in its own result.
pub fn normalize(name: &str, output: TaskOutput) -> NormalizedResult {
    match output {
        TaskOutput::Result(result) => NormalizedResult {
            name: name.to_string(),
            status: if result.success {
                TaskStatus::Pass
            } else {
                TaskStatus::Fail
            },
            changed: result.changed,
            messages: result
                .messages
                .iter()
                .map(|(severity, text)| format!("[{}] {text}", severity.label()))
                .collect(),
            details: result.details,
            explanation: None,
            recommendation: None,
            error: None,
            remediation_plan: result.remediation_plan,
        },
        TaskOutput::Report(report) => NormalizedResult {
            name: name.to_string(),
            status: report.status,
            changed: report.changed,
            messages: report.messages,
            details: report.details,
            explanation: report.explanation,
            recommendation: report.recommendation,
            error: None,
            remediation_plan: report.remediation_plan,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{RemediationAction, Severity, TaskReport, TaskResult};
    use serde_json::json;

    #[test]
    fn native_results_map_success_to_pass_fail() {
        let pass = normalize(
            "Registered",
            TaskResult::pass("internal").with_message(Severity::Warning, "slow").into(),
        );
        assert_eq!(pass.name, "Registered");
        assert_eq!(pass.status, TaskStatus::Pass);
        assert_eq!(pass.messages, vec!["[WARNING] slow".to_string()]);

        let fail = normalize("Registered", TaskResult::fail("internal").into());
        assert_eq!(fail.status, TaskStatus::Fail);
    }

    #[test]
    fn reports_pass_status_and_plan_through() {
        let plan = RemediationPlan::new("fix").with_action(RemediationAction::manual("call ops"));
        let report = TaskReport::new(TaskStatus::Warn)
            .with_message("degraded")
            .with_explanation("resolver slow")
            .with_remediation_plan(plan.clone());
        let normalized = normalize("DNS", report.into());
        assert_eq!(normalized.status, TaskStatus::Warn);
        assert_eq!(normalized.message().as_deref(), Some("degraded"));
        assert_eq!(normalized.remediation_plan, Some(plan));
    }

    #[test]
    fn health_entry_flattens_details_into_extras() {
        let result = normalize(
            "DNS",
            TaskReport::new(TaskStatus::Fail)
                .with_details(json!({"resolver": "1.1.1.1", "latency_ms": 900}))
                .with_recommendation("restart resolver")
                .into(),
        );
        let entry = result.to_health_entry(Utc::now());
        assert_eq!(entry.extra.get("resolver").map(String::as_str), Some("1.1.1.1"));
        assert_eq!(entry.extra.get("latency_ms").map(String::as_str), Some("900"));
        assert_eq!(
            entry.extra.get("recommendation").map(String::as_str),
            Some("restart resolver")
        );
    }
}
