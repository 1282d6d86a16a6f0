use crate::registry::{RegistryError, TaskRegistry};
use crate::task::{
    Context, RemediationAction, RemediationPlan, Severity, Task, TaskEntry, TaskError,
    TaskOutput, TaskResult,
};
use serde_json::json;
use std::path::{Path, PathBuf};

pub const ORIGIN: &str = module_path!();
pub const NAME: &str = "Marker Heal Check";

pub fn touch_payload(marker: &Path) -> String {
    format!("touch {}", marker.display())
}

#[derive(Debug, Clone)]
pub struct MarkerHealCheck {
    marker: PathBuf,
}

impl MarkerHealCheck {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    fn check(&self, with_plan: bool) -> TaskResult {
        if self.marker.is_file() {
            return TaskResult::pass(NAME).with_message(
                Severity::Info,
                format!("marker present at {}", self.marker.display()),
            );
        }

        let mut result = TaskResult::fail(NAME)
            .with_message(
                Severity::Error,
                format!("marker missing at {}", self.marker.display()),
            )
            .with_details(json!({ "marker": self.marker.display().to_string() }));
        if with_plan {
            result = result.with_remediation_plan(
                RemediationPlan::new("recreate the heal-check marker")
                    .with_action(RemediationAction::shell(touch_payload(&self.marker))),
            );
        }
        result
    }
}

impl Task for MarkerHealCheck {
    fn run(&self, _ctx: &Context<'_>) -> Result<TaskOutput, TaskError> {
        Ok(self.check(true).into())
    }

    fn health_check(&self, _ctx: &Context<'_>) -> Result<TaskOutput, TaskError> {
        Ok(self.check(false).into())
    }

    fn description(&self) -> &str {
        "verifies the orchestrator's heal-check marker file exists"
    }
}

pub fn register(registry: &mut TaskRegistry, marker: PathBuf) -> Result<(), RegistryError> {
    registry.register(NAME, TaskEntry::object(MarkerHealCheck::new(marker)), ORIGIN)
}
