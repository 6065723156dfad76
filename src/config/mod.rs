pub mod error;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use paths::{bootstrap_state_root, default_state_root_path, StatePaths};
pub use settings::{load_settings, OracleSettings, Settings};
