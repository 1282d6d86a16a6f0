use crate::config::ConfigError;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".config/benchkeeper";
pub const SETTINGS_FILE_NAME: &str = "config.yaml";

pub fn home_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(CONFIG_DIR).join(SETTINGS_FILE_NAME))
}

pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        let home = Path::new("/home/dev");
        assert_eq!(
            expand_home(Path::new("~/.zshrc"), home),
            PathBuf::from("/home/dev/.zshrc")
        );
        assert_eq!(
            expand_home(Path::new("/etc/hosts"), home),
            PathBuf::from("/etc/hosts")
        );
        assert_eq!(
            expand_home(Path::new("~other/file"), home),
            PathBuf::from("~other/file")
        );
    }
}
