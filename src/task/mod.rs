pub mod plan;
pub mod result;

pub use plan::{ActionType, RemediationAction, RemediationPlan};
pub use result::{Severity, TaskOutput, TaskReport, TaskResult, TaskStatus};

use crate::shared::process::ProcessError;
use crate::state::OrchestratorState;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    Run,
    Test,
    Stress,
    Security,
    Diagnose,
}

impl RunMode {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(RunMode::Run),
            "test" => Ok(RunMode::Test),
            "stress" => Ok(RunMode::Stress),
            "security" => Ok(RunMode::Security),
            "diagnose" => Ok(RunMode::Diagnose),
            other => Err(format!(
                "unknown mode `{other}`; expected run, test, stress, security or diagnose"
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Run => "run",
            RunMode::Test => "test",
            RunMode::Stress => "stress",
            RunMode::Security => "security",
            RunMode::Diagnose => "diagnose",
        }
    }

    pub fn forces_reverify(self) -> bool {
        matches!(self, RunMode::Test | RunMode::Stress | RunMode::Security)
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub mode: RunMode,
    pub dry_run: bool,
    pub autofix: bool,
    pub state: &'a OrchestratorState,
    pub config: &'a Value,
    pub now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    pub fn new(
        mode: RunMode,
        dry_run: bool,
        state: &'a OrchestratorState,
        config: &'a Value,
    ) -> Self {
        Self {
            mode,
            dry_run,
            autofix: false,
            state,
            config,
            now: Utc::now(),
        }
    }

    pub fn with_autofix(mut self, autofix: bool) -> Self {
        self.autofix = autofix;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub trait Task {
    fn run(&self, ctx: &Context<'_>) -> Result<TaskOutput, TaskError>;

    fn health_check(&self, ctx: &Context<'_>) -> Result<TaskOutput, TaskError>;

    fn description(&self) -> &str {
        ""
    }
}

pub type TaskFn = Box<dyn Fn(&Context<'_>) -> Result<TaskOutput, TaskError>>;

pub enum TaskEntry {
    Function { func: TaskFn, description: String },
    Object(Box<dyn Task>),
}

impl TaskEntry {
    pub fn function<F>(func: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<TaskOutput, TaskError> + 'static,
    {
        TaskEntry::Function {
            func: Box::new(func),
            description: String::new(),
        }
    }

    pub fn object<T>(task: T) -> Self
    where
        T: Task + 'static,
    {
        TaskEntry::Object(Box::new(task))
    }

    pub fn with_description(self, text: impl Into<String>) -> Self {
        match self {
            TaskEntry::Function { func, .. } => TaskEntry::Function {
                func,
                description: text.into(),
            },
            other => other,
        }
    }

    pub fn invoke(&self, ctx: &Context<'_>) -> Result<TaskOutput, TaskError> {
        match self {
            TaskEntry::Function { func, .. } => func(ctx),
            TaskEntry::Object(task) => task.run(ctx),
        }
    }

    pub fn health_check(&self, ctx: &Context<'_>) -> Result<TaskOutput, TaskError> {
        match self {
            TaskEntry::Function { func, .. } => func(ctx),
            TaskEntry::Object(task) => task.health_check(ctx),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            TaskEntry::Function { description, .. } => description,
            TaskEntry::Object(task) => task.description(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskEntry::Function { .. } => "function",
            TaskEntry::Object(_) => "object",
        }
    }
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry")
            .field("kind", &self.kind())
            .field("description", &self.description())
            .finish()
    }
}
