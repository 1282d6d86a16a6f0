use crate::shared::fs_atomic::{atomic_write_file_with_mode, OWNER_ONLY_MODE};
use crate::state::{task_key, HealthEntry, OrchestratorState};
use crate::task::TaskStatus;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to encode json export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode yaml export: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to write export {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Yaml,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            other => Err(format!(
                "unknown export format `{other}`; expected json, csv or yaml"
            )),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Yaml => "yaml",
        }
    }
}

pub const CSV_HEADER: &str = "task,status,last_update,last_healthy,history_entries,last_message";

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value.map(|at| at.to_rfc3339()).unwrap_or_default()
}

fn render_csv(state: &OrchestratorState) -> String {
    let mut lines = vec![CSV_HEADER.to_string()];
    for (name, record) in &state.task_status {
        let history = state
            .health_history
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let last_message = history
            .last()
            .and_then(|entry| entry.message.as_deref().or(entry.error.as_deref()))
            .unwrap_or_default();
        lines.push(
            [
                csv_field(name),
                record.status.to_string(),
                format_time(record.last_update),
                format_time(record.last_healthy),
                history.len().to_string(),
                csv_field(last_message),
            ]
            .join(","),
        );
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn render_export(
    state: &OrchestratorState,
    format: ExportFormat,
) -> Result<String, ReportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(state)?),
        ExportFormat::Yaml => Ok(serde_yaml::to_string(state)?),
        ExportFormat::Csv => Ok(render_csv(state)),
    }
}

pub fn export_state(
    state: &OrchestratorState,
    exports_dir: &Path,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> Result<PathBuf, ReportError> {
    let body = render_export(state, format)?;
    let path = exports_dir.join(format!(
        "state-export-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        format.extension()
    ));
    atomic_write_file_with_mode(&path, body.as_bytes(), OWNER_ONLY_MODE).map_err(|source| {
        ReportError::Write {
            path: path.display().to_string(),
            source,
        }
    })?;
    Ok(path)
}

pub fn render_task_table(state: &OrchestratorState, filter: Option<TaskStatus>) -> String {
    let rows: Vec<String> = state
        .task_status
        .iter()
        .filter(|(_, record)| filter.map_or(true, |status| record.status == status))
        .map(|(name, record)| {
            let updated = record
                .last_update
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string());
            format!("{name:<32} {:<7} {updated}", record.status)
        })
        .collect();
    if rows.is_empty() {
        return "no tasks recorded".to_string();
    }
    let mut lines = vec![format!("{:<32} {:<7} {}", "TASK", "STATUS", "LAST UPDATE")];
    lines.extend(rows);
    lines.join("\n")
}

pub fn render_health_entry(entry: &HealthEntry) -> String {
    let mut line = format!(
        "{} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.status
    );
    if let Some(message) = entry.message.as_deref() {
        line.push_str(&format!(" {message}"));
    }
    if let Some(error) = entry.error.as_deref() {
        line.push_str(&format!(" error={error}"));
    }
    if let Some(explanation) = entry.explanation.as_deref() {
        line.push_str(&format!(" explanation={explanation}"));
    }
    line
}

pub fn render_history(state: &OrchestratorState, task: Option<&str>, limit: usize) -> String {
    let names: Vec<&String> = match task {
        Some(name) => {
            let wanted = task_key(name);
            state
                .health_history
                .keys()
                .filter(|key| **key == wanted)
                .collect()
        }
        None => state.health_history.keys().collect(),
    };

    let mut lines = Vec::new();
    for name in names {
        let entries = state.health_trend(name, limit);
        lines.push(format!("{name} ({} entries)", entries.len()));
        for entry in entries {
            lines.push(format!("  {}", render_health_entry(entry)));
        }
    }
    if lines.is_empty() {
        return match task {
            Some(name) => format!("no history recorded for `{name}`"),
            None => "no history recorded".to_string(),
        };
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_fields_are_quoted_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn export_format_parses_aliases() {
        assert_eq!(ExportFormat::parse("YML"), Ok(ExportFormat::Yaml));
        assert!(ExportFormat::parse("xml").is_err());
    }
}
