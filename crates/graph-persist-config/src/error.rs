//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating persister settings.
///
/// Every variant is fatal to the call that produced it; settings are never
/// silently replaced by defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `file_path` was empty.
    #[error("file path cannot be empty")]
    MissingFilePath,

    /// A load was requested without a source path.
    #[error("path to file cannot be empty")]
    MissingLoadPath,

    /// `max_history_steps` was zero.
    #[error("max history steps must be at least 1")]
    ZeroHistorySteps,

    /// Auto-save is enabled but one of its required properties is unset.
    #[error("auto-save is enabled but not configured properly: {0}")]
    AutoSave(&'static str),

    /// The settings file could not be read.
    #[error("failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file could not be written.
    #[error("failed to write settings file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for `PersisterSettings`.
    #[error("failed to parse settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
