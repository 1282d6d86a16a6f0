pub mod error;
pub mod store;
pub mod validate;

pub use error::StateError;
pub use store::{load_state, save_state, StateStore, MAX_STATE_BYTES};
pub use validate::validate_state;

use crate::shared::sanitize::{truncate_text, truncate_value};
use crate::task::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const STATE_SCHEMA_VERSION: &str = "2.0";
pub const DEFAULT_HISTORY_DEPTH: usize = 10;
pub const MAX_HISTORY_DEPTH: usize = 100;
pub const MAX_KEY_CHARS: usize = 128;
pub const MAX_VALUE_CHARS: usize = 8192;

pub fn task_key(name: &str) -> String {
    truncate_text(name, MAX_KEY_CHARS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failure,
    Incomplete,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::Failure => write!(f, "FAILURE"),
            RunStatus::Incomplete => write!(f, "INCOMPLETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskStatusRecord {
    pub status: TaskStatus,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_healthy: Option<DateTime<Utc>>,
}

impl TaskStatusRecord {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            last_update: None,
            last_healthy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEntry {
    pub timestamp: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl HealthEntry {
    pub fn new(status: TaskStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            status,
            message: None,
            error: None,
            explanation: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(truncate_text(message, MAX_VALUE_CHARS));
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(truncate_text(error, MAX_VALUE_CHARS));
        self
    }

    pub fn with_explanation(mut self, explanation: &str) -> Self {
        self.explanation = Some(truncate_text(explanation, MAX_VALUE_CHARS));
        self
    }

    pub fn with_extra(mut self, key: &str, value: &Value) -> Self {
        let key = truncate_text(key, MAX_KEY_CHARS);
        if matches!(
            key.as_str(),
            "timestamp" | "status" | "message" | "error" | "explanation"
        ) {
            return self;
        }
        self.extra.insert(key, truncate_value(value, MAX_VALUE_CHARS));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorState {
    pub version: String,
    #[serde(default)]
    pub last_run_status: Option<RunStatus>,
    pub completed_sections: BTreeSet<String>,
    pub failed_sections: BTreeSet<String>,
    pub task_status: BTreeMap<String, TaskStatusRecord>,
    pub file_hashes: BTreeMap<String, String>,
    pub health_history: BTreeMap<String, Vec<HealthEntry>>,
    #[serde(default)]
    pub service_versions: BTreeMap<String, String>,
    #[serde(default)]
    pub last_report_path: Option<String>,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self {
            version: STATE_SCHEMA_VERSION.to_string(),
            last_run_status: None,
            completed_sections: BTreeSet::new(),
            failed_sections: BTreeSet::new(),
            task_status: BTreeMap::new(),
            file_hashes: BTreeMap::new(),
            health_history: BTreeMap::new(),
            service_versions: BTreeMap::new(),
            last_report_path: None,
        }
    }
}

impl OrchestratorState {
    pub fn status_of(&self, name: &str) -> Option<TaskStatus> {
        self.task_status
            .get(&task_key(name))
            .map(|record| record.status)
    }

    pub fn record_of(&self, name: &str) -> Option<&TaskStatusRecord> {
        self.task_status.get(&task_key(name))
    }

    pub fn mark_section_complete(&mut self, name: &str) {
        let key = task_key(name);
        self.failed_sections.remove(&key);
        self.completed_sections.insert(key);
    }

    pub fn mark_section_failed(&mut self, name: &str) {
        let key = task_key(name);
        self.completed_sections.remove(&key);
        self.failed_sections.insert(key);
    }

    pub fn record_health(&mut self, name: &str, entry: HealthEntry, depth: usize) {
        let key = task_key(name);
        let depth = depth.clamp(1, MAX_HISTORY_DEPTH);

        let record = self
            .task_status
            .entry(key.clone())
            .or_insert_with(TaskStatusRecord::pending);
        record.status = entry.status;
        record.last_update = Some(entry.timestamp);
        if entry.status == TaskStatus::Pass {
            record.last_healthy = Some(entry.timestamp);
        }

        let history = self.health_history.entry(key).or_default();
        history.push(entry);
        if history.len() > depth {
            let overflow = history.len() - depth;
            history.drain(..overflow);
        }
    }

    pub fn ensure_tasks<'n, I>(&mut self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let keys: BTreeSet<String> = names.into_iter().map(task_key).collect();
        for key in &keys {
            self.task_status
                .entry(key.clone())
                .or_insert_with(TaskStatusRecord::pending);
            self.health_history.entry(key.clone()).or_default();
        }

        let stale: Vec<String> = self
            .task_status
            .keys()
            .chain(self.health_history.keys())
            .filter(|key| !keys.contains(*key))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for key in &stale {
            self.task_status.remove(key);
            self.health_history.remove(key);
        }
        stale
    }

    pub fn health_trend(&self, name: &str, limit: usize) -> &[HealthEntry] {
        match self.health_history.get(&task_key(name)) {
            Some(history) => {
                let start = history.len().saturating_sub(limit);
                &history[start..]
            }
            None => &[],
        }
    }

    pub fn failed_tasks(&self) -> Vec<String> {
        self.task_status
            .iter()
            .filter(|(_, record)| record.status == TaskStatus::Fail)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn reset_failed(&mut self) -> Vec<String> {
        let failed = self.failed_tasks();
        for name in &failed {
            if let Some(record) = self.task_status.get_mut(name) {
                record.status = TaskStatus::Pending;
            }
        }
        self.failed_sections.clear();
        failed
    }

    pub fn set_service_versions(&mut self, versions: BTreeMap<String, String>) {
        self.service_versions = versions;
    }

    pub fn set_last_report_path(&mut self, path: impl Into<String>) {
        self.last_report_path = Some(path.into());
    }
}
