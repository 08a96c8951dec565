pub mod config;
pub mod error;

pub use config::{AutoSaveSettings, PersisterSettings, DEFAULT_MAX_HISTORY_STEPS};
pub use error::ConfigError;
