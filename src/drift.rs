use crate::state::validate::HASH_PREFIX;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

pub type FileHashes = BTreeMap<String, String>;

/// Hashes file contents as `sha256:<hex>`. Symlinks, non-regular files and unreadable
/// paths yield `None`.
pub fn hash_file(path: &Path) -> Option<String> {
    let metadata = fs::symlink_metadata(path).ok()?;
    if metadata.file_type().is_symlink() || !metadata.is_file() {
        tracing::debug!(path = %path.display(), "skipping non-regular tracked path");
        return None;
    }

    let mut file = open_no_follow(path).ok()?;
    // the path may have been swapped between the lstat above and the open
    if !file.metadata().ok()?.is_file() {
        return None;
    }

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).ok()?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Some(format!("{HASH_PREFIX}{}", to_hex(&hasher.finalize())))
}

#[cfg(unix)]
fn open_no_follow(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW)
        .open(path)
}

#[cfg(not(unix))]
fn open_no_follow(path: &Path) -> std::io::Result<fs::File> {
    fs::File::open(path)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    const HEX: &[u8; 16] = b"0123456789abcdef";
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Pure: reads the listed files and returns their hashes. Paths that cannot be hashed are
/// absent from the result.
pub fn compute_hashes<P: AsRef<Path>>(files: &[P]) -> FileHashes {
    files
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            hash_file(path).map(|hash| (path.display().to_string(), hash))
        })
        .collect()
}

pub fn check_drift(previous: &FileHashes, current: &FileHashes) -> bool {
    previous != current
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub changed: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl DriftReport {
    pub fn compare(previous: &FileHashes, current: &FileHashes) -> Self {
        let mut report = DriftReport::default();
        for (path, hash) in current {
            match previous.get(path) {
                Some(old) if old != hash => report.changed.push(path.clone()),
                Some(_) => {}
                None => report.added.push(path.clone()),
            }
        }
        report.removed = previous
            .keys()
            .filter(|path| !current.contains_key(*path))
            .cloned()
            .collect();
        report
    }

    pub fn is_drifted(&self) -> bool {
        !(self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} changed, {} added, {} removed",
            self.changed.len(),
            self.added.len(),
            self.removed.len()
        )
    }
}
