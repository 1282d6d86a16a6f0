pub mod interrupt;
pub mod state_paths;

pub use crate::shared::errors::RuntimeError;
pub use interrupt::{install_interrupt_handler, interrupt_flag};
pub use state_paths::{
    bootstrap_state_root, default_state_root_path, StatePaths, DEFAULT_STATE_ROOT_DIR,
    STATE_FILE_NAME,
};
