use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ShellCmd,
    RestartService,
    Manual,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::ShellCmd => write!(f, "shell_cmd"),
            ActionType::RestartService => write!(f, "restart_service"),
            ActionType::Manual => write!(f, "manual"),
        }
    }
}

/// One step of a remediation plan.
///
/// `shell_cmd` payloads are lookup keys into a fixed allow-list, never command text
/// to be split or interpreted. `restart_service` payloads must be plain identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub action_type: ActionType,
    pub payload: String,
    #[serde(default)]
    pub requires_elevated: bool,
}

impl RemediationAction {
    pub fn shell(payload: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::ShellCmd,
            payload: payload.into(),
            requires_elevated: false,
        }
    }

    pub fn restart_service(service: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::RestartService,
            payload: service.into(),
            requires_elevated: false,
        }
    }

    pub fn manual(instructions: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::Manual,
            payload: instructions.into(),
            requires_elevated: false,
        }
    }

    pub fn elevated(mut self) -> Self {
        self.requires_elevated = true;
        self
    }
}

/// Ordered actions proposed by a failing task. Not transactional: execution stops at the
/// first failed action and earlier actions are not rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub description: String,
    #[serde(default)]
    pub actions: Vec<RemediationAction>,
}

impl RemediationPlan {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: RemediationAction) -> Self {
        self.actions.push(action);
        self
    }
}
