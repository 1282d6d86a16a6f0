use crate::task::plan::RemediationPlan;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Hint,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Unknown or legacy severity names degrade to `Info`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Severity::Debug,
            "hint" => Severity::Hint,
            "info" => Severity::Info,
            "warning" => Severity::Warning,
            "error" => Severity::Error,
            _ => Severity::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Hint => "hint",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Hint => "HINT",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Severity::parse_lenient(&raw))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Pass,
    Fail,
    Warn,
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TaskStatus::Pending),
            "PASS" => Ok(TaskStatus::Pass),
            "FAIL" => Ok(TaskStatus::Fail),
            "WARN" => Ok(TaskStatus::Warn),
            other => Err(format!(
                "unknown task status `{other}`; expected pass, fail, warn or pending"
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Pass => "PASS",
            TaskStatus::Fail => "FAIL",
            TaskStatus::Warn => "WARN",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub name: String,
    pub success: bool,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub messages: Vec<(Severity, String)>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_plan: Option<RemediationPlan>,
}

impl TaskResult {
    pub fn new(name: impl Into<String>, success: bool) -> Self {
        Self {
            name: name.into(),
            success,
            changed: false,
            messages: Vec::new(),
            details: None,
            remediation_plan: None,
        }
    }

    pub fn pass(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn fail(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    pub fn with_message(mut self, severity: Severity, message: impl Into<String>) -> Self {
        self.messages.push((severity, message.into()));
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_remediation_plan(mut self, plan: RemediationPlan) -> Self {
        self.remediation_plan = Some(plan);
        self
    }

    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(|(_, text)| text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub status: TaskStatus,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_plan: Option<RemediationPlan>,
}

impl TaskReport {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            changed: false,
            details: None,
            messages: Vec::new(),
            explanation: None,
            recommendation: None,
            remediation_plan: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_remediation_plan(mut self, plan: RemediationPlan) -> Self {
        self.remediation_plan = Some(plan);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Result(TaskResult),
    Report(TaskReport),
}

impl From<TaskResult> for TaskOutput {
    fn from(value: TaskResult) -> Self {
        TaskOutput::Result(value)
    }
}

impl From<TaskReport> for TaskOutput {
    fn from(value: TaskReport) -> Self {
        TaskOutput::Report(value)
    }
}
