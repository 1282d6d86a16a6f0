use super::{expand_home, ConfigError};
use crate::shared::sanitize::TrimLimits;
use crate::state::{DEFAULT_HISTORY_DEPTH, MAX_HISTORY_DEPTH};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationSettings {
    #[serde(default = "default_shell_timeout_seconds")]
    pub shell_timeout_seconds: u64,
    #[serde(default = "default_service_timeout_seconds")]
    pub service_timeout_seconds: u64,
}

impl Default for RemediationSettings {
    fn default() -> Self {
        Self {
            shell_timeout_seconds: default_shell_timeout_seconds(),
            service_timeout_seconds: default_service_timeout_seconds(),
        }
    }
}

impl RemediationSettings {
    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_seconds)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_string_len")]
    pub max_string_len: usize,
    #[serde(default = "default_max_list_items")]
    pub max_list_items: usize,
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_string_len: default_max_string_len(),
            max_list_items: default_max_list_items(),
            max_log_lines: default_max_log_lines(),
        }
    }
}

impl DiagnosticsSettings {
    pub fn trim_limits(&self) -> TrimLimits {
        TrimLimits {
            max_string_len: self.max_string_len,
            max_list_items: self.max_list_items,
            max_log_lines: self.max_log_lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    #[serde(default)]
    pub tracked_files: Vec<PathBuf>,
    #[serde(default)]
    pub remediation: RemediationSettings,
    #[serde(default)]
    pub diagnostics: DiagnosticsSettings,
    #[serde(default)]
    pub task_config: serde_yaml::Mapping,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            tracked_files: Vec::new(),
            remediation: RemediationSettings::default(),
            diagnostics: DiagnosticsSettings::default(),
            task_config: serde_yaml::Mapping::new(),
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_HISTORY_DEPTH).contains(&self.history_depth) {
            return Err(ConfigError::Settings(format!(
                "`history_depth` must be between 1 and {MAX_HISTORY_DEPTH}"
            )));
        }

        for path in &self.tracked_files {
            if !path.is_absolute() && !path.starts_with("~") {
                return Err(ConfigError::Settings(format!(
                    "tracked file `{}` must be absolute or start with `~/`",
                    path.display()
                )));
            }
        }

        for (field, value) in [
            (
                "remediation.shell_timeout_seconds",
                self.remediation.shell_timeout_seconds,
            ),
            (
                "remediation.service_timeout_seconds",
                self.remediation.service_timeout_seconds,
            ),
        ] {
            if value == 0 || value > MAX_TIMEOUT_SECONDS {
                return Err(ConfigError::Settings(format!(
                    "`{field}` must be between 1 and {MAX_TIMEOUT_SECONDS}"
                )));
            }
        }

        for (field, value) in [
            ("diagnostics.max_string_len", self.diagnostics.max_string_len),
            ("diagnostics.max_list_items", self.diagnostics.max_list_items),
            ("diagnostics.max_log_lines", self.diagnostics.max_log_lines),
        ] {
            if value == 0 {
                return Err(ConfigError::Settings(format!(
                    "`{field}` must be greater than zero"
                )));
            }
        }

        Ok(())
    }

    pub fn resolved_tracked_files(&self, home: &Path) -> Vec<PathBuf> {
        self.tracked_files
            .iter()
            .map(|path| expand_home(path, home))
            .collect()
    }

    pub fn task_config_value(&self) -> Result<Value, ConfigError> {
        serde_json::to_value(&self.task_config).map_err(|err| {
            ConfigError::Settings(format!("`task_config` is not representable as json: {err}"))
        })
    }
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

fn default_shell_timeout_seconds() -> u64 {
    30
}

fn default_service_timeout_seconds() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_max_string_len() -> usize {
    3000
}

fn default_max_list_items() -> usize {
    50
}

fn default_max_log_lines() -> usize {
    100
}
