//! History error types.

use thiserror::Error;

/// Errors returned when a history stack is exhausted.
///
/// Callers are expected to consult `can_undo`/`can_redo` first; hitting
/// one of these is a programming error on the caller's side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// No more undo steps available.
    #[error("nothing to undo")]
    NothingToUndo,

    /// No more redo steps available.
    #[error("nothing to redo")]
    NothingToRedo,
}
