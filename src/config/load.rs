use super::{ConfigError, Settings};
use std::path::Path;

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file; using defaults");
        return Ok(Settings::default());
    }
    let settings = Settings::from_path(path)?;
    settings.validate()?;
    Ok(settings)
}
