/// Bounded undo/redo history over opaque snapshots.
///
/// Provides a `HistoryManager` holding two capacity-limited stacks of
/// `(snapshot, history_id)` entries. The manager never looks inside a
/// snapshot; it only moves entries between the stacks and reports when
/// either stack becomes empty or non-empty.
pub mod config;
pub mod entry;
pub mod error;
pub mod manager;

pub use config::HistoryConfig;
pub use entry::{HistoryEntry, HistoryEvent};
pub use error::HistoryError;
pub use manager::HistoryManager;
