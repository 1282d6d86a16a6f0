use crate::shared::fs_atomic::{atomic_write_file_with_mode, OWNER_ONLY_MODE};
use crate::state::{validate_state, OrchestratorState, StateError};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

pub const MAX_STATE_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_load(&self) -> Result<Option<OrchestratorState>, StateError> {
        let path_text = self.path.display().to_string();
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: path_text,
                    source,
                })
            }
        };

        let size = file
            .metadata()
            .map_err(|source| StateError::Read {
                path: path_text.clone(),
                source,
            })?
            .len();
        if size > MAX_STATE_BYTES {
            return Err(StateError::TooLarge {
                path: path_text,
                size,
                limit: MAX_STATE_BYTES,
            });
        }

        let mut raw = Vec::new();
        file.take(MAX_STATE_BYTES + 1)
            .read_to_end(&mut raw)
            .map_err(|source| StateError::Read {
                path: path_text.clone(),
                source,
            })?;
        if raw.len() as u64 > MAX_STATE_BYTES {
            return Err(StateError::TooLarge {
                path: path_text,
                size: raw.len() as u64,
                limit: MAX_STATE_BYTES,
            });
        }

        let state: OrchestratorState =
            serde_json::from_slice(&raw).map_err(|source| StateError::Parse {
                path: path_text.clone(),
                source,
            })?;
        validate_state(&state).map_err(|reason| StateError::Invalid {
            path: path_text,
            reason,
        })?;
        Ok(Some(state))
    }

    /// Never fails: an absent, unreadable or untrusted document yields the default state.
    pub fn load(&self) -> OrchestratorState {
        match self.try_load() {
            Ok(Some(state)) => state,
            Ok(None) => OrchestratorState::default(),
            Err(err) => {
                tracing::warn!(
                    target: "security",
                    path = %self.path.display(),
                    error = %err,
                    "discarding untrusted state document; using defaults"
                );
                OrchestratorState::default()
            }
        }
    }

    pub fn render(state: &OrchestratorState) -> Result<String, StateError> {
        serde_json::to_string_pretty(state).map_err(|source| StateError::Encode { source })
    }

    pub fn try_save(&self, state: &OrchestratorState) -> Result<(), StateError> {
        let mut body = Self::render(state)?;
        body.push('\n');
        atomic_write_file_with_mode(&self.path, body.as_bytes(), OWNER_ONLY_MODE).map_err(
            |source| StateError::Write {
                path: self.path.display().to_string(),
                source,
            },
        )
    }

    /// Persists atomically with owner-only permissions. A dry run prints the document
    /// and touches nothing.
    pub fn save(&self, state: &OrchestratorState, dry_run: bool) -> bool {
        if dry_run {
            match Self::render(state) {
                Ok(body) => {
                    println!("[dry-run] would write {}:\n{body}", self.path.display());
                    return true;
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to render state");
                    return false;
                }
            }
        }

        match self.try_save(state) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "state saved");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to save state");
                false
            }
        }
    }

    pub fn backup(
        &self,
        backups_dir: &Path,
        now: DateTime<Utc>,
    ) -> Result<Option<PathBuf>, StateError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        let target = backups_dir.join(format!(
            "state.backup.{}.json",
            now.format("%Y%m%d-%H%M%S")
        ));
        atomic_write_file_with_mode(&target, &raw, OWNER_ONLY_MODE).map_err(|source| {
            StateError::Write {
                path: target.display().to_string(),
                source,
            }
        })?;
        Ok(Some(target))
    }
}

pub fn load_state(path: &Path) -> OrchestratorState {
    StateStore::new(path).load()
}

pub fn save_state(state: &OrchestratorState, path: &Path, dry_run: bool) -> bool {
    StateStore::new(path).save(state, dry_run)
}
