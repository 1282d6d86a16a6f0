pub mod error;
pub mod load;
pub mod paths;
pub mod save;
pub mod settings;

pub use error::ConfigError;
pub use load::load_settings;
pub use paths::{default_config_path, expand_home, home_dir, CONFIG_DIR, SETTINGS_FILE_NAME};
pub use save::save_settings;
pub use settings::{DiagnosticsSettings, RemediationSettings, Settings};
