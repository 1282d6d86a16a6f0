pub mod marker;
pub mod toolchain;

pub use marker::MarkerHealCheck;
pub use toolchain::toolchain_presence;

use crate::registry::{RegistryError, TaskRegistry};
use crate::runtime::StatePaths;

pub const TRUSTED_TASK_MODULES: &[&str] = &[marker::ORIGIN, toolchain::ORIGIN];

pub fn builtin_registry(paths: &StatePaths) -> Result<TaskRegistry, RegistryError> {
    let mut registry = TaskRegistry::new(TRUSTED_TASK_MODULES.iter().copied());
    marker::register(&mut registry, paths.heal_check_marker())?;
    toolchain::register(&mut registry)?;
    Ok(registry)
}
