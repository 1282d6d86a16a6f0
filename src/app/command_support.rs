use crate::config::{default_config_path, home_dir, load_settings, ConfigError, Settings};
use crate::diagnostics::SystemDiagnostics;
use crate::registry::TaskSet;
use crate::remediation::{ShellAllowList, SystemActionExecutor};
use crate::runtime::{bootstrap_state_root, default_state_root_path, StatePaths};
use crate::shared::logging::append_event_log;
use crate::state::{OrchestratorState, StateStore};
use crate::tasks::builtin_registry;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEnv {
    pub config_path: PathBuf,
    pub paths: StatePaths,
    pub home: PathBuf,
}

impl AppEnv {
    pub fn new(
        config_path: impl Into<PathBuf>,
        state_root: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            paths: StatePaths::new(state_root),
            home: home.into(),
        }
    }

    pub fn from_home() -> Result<Self, String> {
        let home = home_dir().map_err(map_config_err)?;
        let config_path = default_config_path().map_err(map_config_err)?;
        let state_root = default_state_root_path().map_err(|e| e.to_string())?;
        Ok(Self::new(config_path, state_root, home))
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.paths.state_file())
    }

    pub fn log_event(&self, level: &str, event: &str, message: &str) {
        append_event_log(&self.paths.event_log_path(), level, event, message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub output: String,
    pub success: bool,
}

impl CommandOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
        }
    }
}

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub struct Session {
    pub settings: Settings,
    pub task_config: Value,
    pub store: StateStore,
    pub state: OrchestratorState,
    pub tasks: TaskSet,
    pub dry_run: bool,
}

impl Session {
    pub fn open(env: &AppEnv) -> Result<Self, String> {
        Self::open_with(env, false)
    }

    /// Dry runs leave the state root untouched: no directories, no event log.
    pub fn open_with(env: &AppEnv, dry_run: bool) -> Result<Self, String> {
        if !dry_run {
            bootstrap_state_root(&env.paths).map_err(|e| e.to_string())?;
        }
        let settings = load_settings(&env.config_path).map_err(map_config_err)?;
        let task_config = settings.task_config_value().map_err(map_config_err)?;

        let registry = builtin_registry(&env.paths).map_err(|e| e.to_string())?;
        let tasks = registry.discover();
        for rejected in tasks.rejected().iter().filter(|_| !dry_run) {
            env.log_event(
                "warn",
                "registry.rejected",
                &format!(
                    "excluded task `{}` from untrusted origin `{}`",
                    rejected.name, rejected.origin
                ),
            );
        }

        let store = env.store();
        let state = store.load();
        Ok(Self {
            settings,
            task_config,
            store,
            state,
            tasks,
            dry_run,
        })
    }

    pub fn log_event(&self, env: &AppEnv, level: &str, event: &str, message: &str) {
        if !self.dry_run {
            env.log_event(level, event, message);
        }
    }

    pub fn tracked_files(&self, env: &AppEnv) -> Vec<PathBuf> {
        self.settings.resolved_tracked_files(&env.home)
    }

    pub fn executor(&self, env: &AppEnv) -> SystemActionExecutor {
        SystemActionExecutor::new(ShellAllowList::builtin(&env.paths.heal_check_marker()))
            .with_timeouts(
                self.settings.remediation.shell_timeout(),
                self.settings.remediation.service_timeout(),
            )
    }

    pub fn diagnostics(&self, env: &AppEnv) -> Option<SystemDiagnostics> {
        if !self.settings.diagnostics.enabled {
            return None;
        }
        Some(
            SystemDiagnostics::new(self.settings.diagnostics.trim_limits())
                .with_event_log(env.paths.event_log_path()),
        )
    }

    pub fn save(&self, dry_run: bool) -> Result<(), String> {
        if self.store.save(&self.state, dry_run) {
            Ok(())
        } else {
            Err(format!(
                "failed to save state to {}",
                self.store.path().display()
            ))
        }
    }
}

pub struct ArgList {
    args: Vec<String>,
}

impl ArgList {
    pub fn new(args: &[String]) -> Self {
        Self {
            args: args.to_vec(),
        }
    }

    pub fn take_flag(&mut self, flag: &str) -> bool {
        let before = self.args.len();
        self.args.retain(|arg| arg != flag);
        self.args.len() != before
    }

    pub fn take_values(&mut self, name: &str) -> Result<Vec<String>, String> {
        let prefix = format!("{name}=");
        let mut values = Vec::new();
        let mut rest = Vec::new();
        let mut iter = std::mem::take(&mut self.args).into_iter();
        while let Some(arg) = iter.next() {
            if arg == name {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("{name} requires a value"))?;
                values.push(value);
            } else if let Some(value) = arg.strip_prefix(&prefix) {
                values.push(value.to_string());
            } else {
                rest.push(arg);
            }
        }
        self.args = rest;
        Ok(values)
    }

    pub fn take_value(&mut self, name: &str) -> Result<Option<String>, String> {
        let mut values = self.take_values(name)?;
        if values.len() > 1 {
            return Err(format!("{name} may only be given once"));
        }
        Ok(values.pop())
    }

    pub fn take_positional(&mut self, usage: &str) -> Result<String, String> {
        let index = self
            .args
            .iter()
            .position(|arg| !arg.starts_with("--"))
            .ok_or_else(|| format!("usage: {usage}"))?;
        Ok(self.args.remove(index))
    }

    pub fn finish(self, usage: &str) -> Result<(), String> {
        match self.args.first() {
            Some(extra) => Err(format!("unexpected argument `{extra}`\nusage: {usage}")),
            None => Ok(()),
        }
    }
}
