/// Configuration for the history system.
use graph_persist_config::{PersisterSettings, DEFAULT_MAX_HISTORY_STEPS};

/// Configuration for a `HistoryManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Max entries per stack. Once exceeded, the oldest entry is evicted.
    pub max_history_steps: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_steps: DEFAULT_MAX_HISTORY_STEPS,
        }
    }
}

impl HistoryConfig {
    pub fn with_capacity(max_history_steps: usize) -> Self {
        Self { max_history_steps }
    }

    /// Effective capacity; a zero setting still keeps one entry.
    pub(crate) fn capacity(&self) -> usize {
        self.max_history_steps.max(1)
    }
}

impl From<&PersisterSettings> for HistoryConfig {
    fn from(settings: &PersisterSettings) -> Self {
        Self::with_capacity(settings.max_history_steps)
    }
}
