use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const OWNER_ONLY_MODE: u32 = 0o600;

/// A fully written and fsynced temp file sitting next to its destination.
///
/// Dropping a staged write without calling [`StagedWrite::commit`] removes the
/// temp file and leaves the destination untouched.
#[derive(Debug)]
pub struct StagedWrite {
    tmp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    pub fn stage(path: &Path, content: &[u8], mode: Option<u32>) -> std::io::Result<Self> {
        let parent = parent_dir(path);
        fs::create_dir_all(&parent)?;
        let tmp_path = parent.join(temp_file_name(path));

        let mut options = fs::OpenOptions::new();
        options.create_new(true).write(true);
        #[cfg(unix)]
        {
            options.mode(mode.unwrap_or(0o666));
        }
        let mut file = options.open(&tmp_path)?;

        // From here on the temp file exists; the guard removes it on any early return.
        let staged = Self {
            tmp_path,
            target: path.to_path_buf(),
            committed: false,
        };
        file.write_all(content)?;
        file.flush()?;
        file.sync_all()?;
        #[cfg(unix)]
        {
            if let Some(mode) = mode {
                fs::set_permissions(&staged.tmp_path, fs::Permissions::from_mode(mode))?;
            }
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(staged)
    }

    pub fn temp_path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn commit(mut self) -> std::io::Result<()> {
        fs::rename(&self.tmp_path, &self.target)?;
        self.committed = true;
        if let Err(err) = sync_parent_dir(&parent_dir(&self.target)) {
            tracing::debug!(
                path = %self.target.display(),
                error = %err,
                "directory fsync after rename failed"
            );
        }
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

pub fn atomic_write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    StagedWrite::stage(path, content, None)?.commit()
}

pub fn atomic_write_file_with_mode(path: &Path, content: &[u8], mode: u32) -> std::io::Result<()> {
    StagedWrite::stage(path, content, Some(mode))?.commit()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn temp_file_name(path: &Path) -> String {
    format!(
        ".{}.tmp-{}-{}",
        path.file_name().and_then(|v| v.to_str()).unwrap_or("state"),
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    )
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> std::io::Result<()> {
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_parent: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_name_is_hidden_and_keyed_by_target() {
        let name = temp_file_name(Path::new("/tmp/x/state.json"));
        assert!(name.starts_with(".state.json.tmp-"));
    }

    #[test]
    fn bare_file_name_stages_in_current_dir() {
        assert_eq!(parent_dir(Path::new("state.json")), PathBuf::from("."));
    }
}
