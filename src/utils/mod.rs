//! Configuration and logging utilities

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigurationManager, ConfirmationConfig, NodeDefaults, SceneConfig, ValidationResult};
pub use logging::init_logging;
