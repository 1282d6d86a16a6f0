use super::{ConfigError, Settings};
use crate::shared::fs_atomic::atomic_write_file;
use std::path::{Path, PathBuf};

pub fn save_settings(
    settings: &Settings,
    path: &Path,
    force: bool,
) -> Result<PathBuf, ConfigError> {
    settings.validate()?;
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.display().to_string(),
        });
    }

    let body = serde_yaml::to_string(settings).map_err(|source| ConfigError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    atomic_write_file(path, body.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path.to_path_buf())
}
