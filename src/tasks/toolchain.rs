use crate::registry::{RegistryError, TaskRegistry};
use crate::shared::process::run_bounded;
use crate::task::{Context, Severity, TaskEntry, TaskError, TaskOutput, TaskResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ORIGIN: &str = module_path!();
pub const NAME: &str = "Toolchain Presence";
const DEFAULT_REQUIRED: &[&str] = &["git"];
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

fn required_binaries(config: &Value) -> Vec<String> {
    match config.get("required_binaries").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        None => DEFAULT_REQUIRED.iter().map(|name| name.to_string()).collect(),
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn probe_version(location: &Path) -> Option<String> {
    let argv = vec![location.display().to_string(), "--version".to_string()];
    let output = run_bounded(&argv, VERSION_PROBE_TIMEOUT).ok()?;
    output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

pub fn find_on_path(binary: &str) -> Option<PathBuf> {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        return None;
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

pub fn toolchain_presence(ctx: &Context<'_>) -> Result<TaskOutput, TaskError> {
    let required = required_binaries(ctx.config);
    let mut found = serde_json::Map::new();
    let mut versions = serde_json::Map::new();
    let mut missing = Vec::new();
    for binary in &required {
        match find_on_path(binary) {
            Some(location) => {
                if !ctx.dry_run {
                    if let Some(version) = probe_version(&location) {
                        versions.insert(binary.clone(), json!(version));
                    }
                }
                found.insert(binary.clone(), json!(location.display().to_string()));
            }
            None => missing.push(binary.clone()),
        }
    }

    let mut result = TaskResult::new(NAME, missing.is_empty()).with_details(json!({
        "found": found,
        "missing": missing,
        "service_versions": versions,
    }));
    for binary in &missing {
        result = result.with_message(Severity::Warning, format!("`{binary}` not found on PATH"));
    }
    if missing.is_empty() {
        result = result.with_message(
            Severity::Info,
            format!("{} required binaries present", required.len()),
        );
    }
    Ok(result.into())
}

pub fn register(registry: &mut TaskRegistry) -> Result<(), RegistryError> {
    registry.register(
        NAME,
        TaskEntry::function(toolchain_presence)
            .with_description("checks required binaries are available on PATH"),
        ORIGIN,
    )
}
