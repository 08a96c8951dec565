/// Persister configuration: load, save, and validate.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of undo steps kept per persister.
pub const DEFAULT_MAX_HISTORY_STEPS: usize = 100;

/// Top-level persister configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersisterSettings {
    /// Full path of the file written by `save` and read by `load`.
    pub file_path: PathBuf,
    /// Subscribe to change notifications and commit every user edit.
    pub track_changes: bool,
    /// Maximum number of entries per history stack. Oldest entries are evicted.
    pub max_history_steps: usize,
    /// Periodic background save to a secondary file.
    pub auto_save: Option<AutoSaveSettings>,
}

impl Default for PersisterSettings {
    fn default() -> Self {
        Self {
            file_path: PathBuf::new(),
            track_changes: false,
            max_history_steps: DEFAULT_MAX_HISTORY_STEPS,
            auto_save: None,
        }
    }
}

/// Auto-save configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    /// Secondary file the background task writes to.
    pub file_path: Option<PathBuf>,
    pub enabled: bool,
    /// Delay between the end of one save and the start of the next, in milliseconds.
    pub interval_ms: u64,
}

impl AutoSaveSettings {
    /// Creates enabled auto-save settings.
    pub fn new(file_path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            file_path: Some(file_path.into()),
            enabled: true,
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The save interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        match &self.file_path {
            Some(p) if !p.as_os_str().is_empty() => {}
            _ => return Err(ConfigError::AutoSave("file path is missing")),
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::AutoSave("interval must be greater than zero"));
        }
        Ok(())
    }
}

impl PersisterSettings {
    /// Creates settings for the given file with every other field defaulted.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    pub fn with_track_changes(mut self, track_changes: bool) -> Self {
        self.track_changes = track_changes;
        self
    }

    pub fn with_max_history_steps(mut self, steps: usize) -> Self {
        self.max_history_steps = steps;
        self
    }

    pub fn with_auto_save(mut self, auto_save: AutoSaveSettings) -> Self {
        self.auto_save = Some(auto_save);
        self
    }

    /// Returns the auto-save settings only when auto-save is switched on.
    pub fn active_auto_save(&self) -> Option<&AutoSaveSettings> {
        self.auto_save.as_ref().filter(|a| a.enabled)
    }

    /// Checks that the settings describe a usable persister.
    ///
    /// # Errors
    ///
    /// Returns the first problem found; nothing is defaulted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingFilePath);
        }
        if self.max_history_steps == 0 {
            return Err(ConfigError::ZeroHistorySteps);
        }
        if let Some(auto_save) = &self.auto_save {
            auto_save.validate()?;
        }
        Ok(())
    }

    /// Loads and validates settings from a JSON file.
    ///
    /// Missing fields take their defaults; a missing or broken file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: PersisterSettings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        tracing::debug!("Loaded persister settings from {}", path.display());
        Ok(settings)
    }

    /// Saves settings to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(std::io::Error::other)
            .map_err(write_err)?;
        std::fs::write(path, json).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PersisterSettings::default();
        assert!(settings.file_path.as_os_str().is_empty());
        assert!(!settings.track_changes);
        assert_eq!(settings.max_history_steps, 100);
        assert!(settings.auto_save.is_none());
    }

    #[test]
    fn test_new_keeps_defaults() {
        let settings = PersisterSettings::new("data.bin");
        assert_eq!(settings.file_path, PathBuf::from("data.bin"));
        assert_eq!(settings.max_history_steps, DEFAULT_MAX_HISTORY_STEPS);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let settings = PersisterSettings::default();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingFilePath)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_history_steps() {
        let settings = PersisterSettings::new("data.bin").with_max_history_steps(0);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::ZeroHistorySteps)
        ));
    }

    #[test]
    fn test_validate_rejects_enabled_auto_save_without_path() {
        let settings = PersisterSettings::new("data.bin").with_auto_save(AutoSaveSettings {
            file_path: None,
            enabled: true,
            interval_ms: 1000,
        });
        assert!(matches!(settings.validate(), Err(ConfigError::AutoSave(_))));
    }

    #[test]
    fn test_validate_rejects_enabled_auto_save_with_zero_interval() {
        let settings = PersisterSettings::new("data.bin").with_auto_save(AutoSaveSettings {
            file_path: Some(PathBuf::from("auto.bin")),
            enabled: true,
            interval_ms: 0,
        });
        assert!(matches!(settings.validate(), Err(ConfigError::AutoSave(_))));
    }

    #[test]
    fn test_disabled_auto_save_is_not_validated() {
        let settings = PersisterSettings::new("data.bin").with_auto_save(AutoSaveSettings {
            file_path: None,
            enabled: false,
            interval_ms: 0,
        });
        assert!(settings.validate().is_ok());
        assert!(settings.active_auto_save().is_none());
    }

    #[test]
    fn test_auto_save_new_converts_interval() {
        let auto = AutoSaveSettings::new("auto.bin", Duration::from_secs(2));
        assert!(auto.enabled);
        assert_eq!(auto.interval_ms, 2000);
        assert_eq!(auto.interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_serde_round_trip() {
        let settings = PersisterSettings::new("data.bin")
            .with_track_changes(true)
            .with_max_history_steps(7)
            .with_auto_save(AutoSaveSettings::new("auto.bin", Duration::from_millis(250)));
        let json = serde_json::to_string_pretty(&settings).unwrap();
        let parsed: PersisterSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let json = r#"{"file_path": "state.bin"}"#;
        let parsed: PersisterSettings = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.file_path, PathBuf::from("state.bin"));
        assert!(!parsed.track_changes);
        assert_eq!(parsed.max_history_steps, 100);
    }
}
