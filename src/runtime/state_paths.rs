use super::RuntimeError;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_STATE_ROOT_DIR: &str = ".local/state/benchkeeper";
pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![
            self.backups_dir(),
            self.diagnostics_dir(),
            self.exports_dir(),
            self.logs_dir(),
            self.markers_dir(),
        ]
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE_NAME)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.root.join("diagnostics")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn markers_dir(&self) -> PathBuf {
        self.root.join("markers")
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.logs_dir().join("events.log")
    }

    pub fn heal_check_marker(&self) -> PathBuf {
        self.markers_dir().join("heal-check.marker")
    }
}

pub fn default_state_root_path() -> Result<PathBuf, RuntimeError> {
    let home = std::env::var_os("HOME").ok_or(RuntimeError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(DEFAULT_STATE_ROOT_DIR))
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), RuntimeError> {
    fs::create_dir_all(&paths.root).map_err(|source| RuntimeError::CreateDir {
        path: paths.root.display().to_string(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&paths.root, fs::Permissions::from_mode(0o700)).map_err(
            |source| RuntimeError::Permissions {
                path: paths.root.display().to_string(),
                source,
            },
        )?;
    }
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| RuntimeError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
