use crate::remediation::allowlist::ShellAllowList;
use crate::shared::ids::ServiceName;
use crate::shared::process::{command_form, CommandRunner, SystemRunner};
use crate::task::{ActionType, RemediationAction};
use std::time::Duration;

pub const SHELL_TIMEOUT: Duration = Duration::from_secs(30);
pub const SERVICE_TIMEOUT: Duration = Duration::from_secs(15);
const ELEVATION_PREFIX: [&str; 2] = ["sudo", "-n"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded { command: String },
    WouldRun { command: String },
    Failed { command: String, reason: String },
    Rejected { reason: String },
    ManualRequired { instructions: String },
}

impl ActionOutcome {
    pub fn proceeds(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Succeeded { .. } | ActionOutcome::WouldRun { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            ActionOutcome::Succeeded { command } => format!("ran `{command}`"),
            ActionOutcome::WouldRun { command } => format!("would run `{command}`"),
            ActionOutcome::Failed { command, reason } => format!("`{command}` failed: {reason}"),
            ActionOutcome::Rejected { reason } => format!("rejected: {reason}"),
            ActionOutcome::ManualRequired { instructions } => {
                format!("requires human action: {instructions}")
            }
        }
    }
}

pub trait ActionExecutor {
    fn execute(&self, action: &RemediationAction, dry_run: bool) -> ActionOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            _ => Platform::Other,
        }
    }

    fn restart_argv(self, service: &ServiceName) -> Option<Vec<String>> {
        let name = service.as_str().to_string();
        match self {
            Platform::Linux => Some(vec!["systemctl".to_string(), "restart".to_string(), name]),
            Platform::MacOs => Some(vec![
                "brew".to_string(),
                "services".to_string(),
                "restart".to_string(),
                name,
            ]),
            Platform::Other => None,
        }
    }
}

pub struct SystemActionExecutor<R: CommandRunner = SystemRunner> {
    runner: R,
    allow_list: ShellAllowList,
    platform: Platform,
    shell_timeout: Duration,
    service_timeout: Duration,
}

impl SystemActionExecutor<SystemRunner> {
    pub fn new(allow_list: ShellAllowList) -> Self {
        Self::with_runner(SystemRunner, allow_list)
    }
}

impl<R: CommandRunner> SystemActionExecutor<R> {
    pub fn with_runner(runner: R, allow_list: ShellAllowList) -> Self {
        Self {
            runner,
            allow_list,
            platform: Platform::current(),
            shell_timeout: SHELL_TIMEOUT,
            service_timeout: SERVICE_TIMEOUT,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_timeouts(mut self, shell: Duration, service: Duration) -> Self {
        self.shell_timeout = shell;
        self.service_timeout = service;
        self
    }

    pub fn resolve(
        &self,
        action: &RemediationAction,
    ) -> Result<(Vec<String>, Duration), ActionOutcome> {
        let (argv, timeout) = match action.action_type {
            ActionType::Manual => {
                return Err(ActionOutcome::ManualRequired {
                    instructions: action.payload.clone(),
                })
            }
            ActionType::ShellCmd => {
                let Some(argv) = self.allow_list.resolve(&action.payload) else {
                    tracing::warn!(
                        target: "security",
                        payload = %action.payload,
                        "refusing shell_cmd payload outside the allow-list"
                    );
                    return Err(ActionOutcome::Rejected {
                        reason: format!("`{}` is not an allow-listed command", action.payload),
                    });
                };
                (argv.to_vec(), self.shell_timeout)
            }
            ActionType::RestartService => {
                let service = ServiceName::parse(&action.payload).map_err(|err| {
                    tracing::warn!(
                        target: "security",
                        payload = %action.payload,
                        "refusing restart_service with an invalid service name"
                    );
                    ActionOutcome::Rejected {
                        reason: format!("invalid service `{}`: {err}", action.payload),
                    }
                })?;
                let Some(argv) = self.platform.restart_argv(&service) else {
                    return Err(ActionOutcome::Rejected {
                        reason: "no service manager known for this platform".to_string(),
                    });
                };
                (argv, self.service_timeout)
            }
        };

        if action.requires_elevated {
            let mut elevated: Vec<String> =
                ELEVATION_PREFIX.iter().map(|arg| arg.to_string()).collect();
            elevated.extend(argv);
            return Ok((elevated, timeout));
        }
        Ok((argv, timeout))
    }
}

impl<R: CommandRunner> ActionExecutor for SystemActionExecutor<R> {
    fn execute(&self, action: &RemediationAction, dry_run: bool) -> ActionOutcome {
        let (argv, timeout) = match self.resolve(action) {
            Ok(resolved) => resolved,
            Err(outcome) => return outcome,
        };
        let command = command_form(&argv);
        if dry_run {
            return ActionOutcome::WouldRun { command };
        }

        tracing::info!(command = %command, "running remediation action");
        match self.runner.run(&argv, timeout) {
            Ok(_) => ActionOutcome::Succeeded { command },
            Err(err) => ActionOutcome::Failed {
                command,
                reason: err.to_string(),
            },
        }
    }
}
