/// Core undo/redo manager with bounded stacks.
///
/// Both stacks behave like ring buffers: once a push exceeds the configured
/// capacity the oldest entry is dropped. Availability changes are queued as
/// `HistoryEvent`s and handed to the owner through `take_events`, so the
/// owner can dispatch them after releasing whatever lock guards the manager.
use std::collections::VecDeque;

use crate::config::HistoryConfig;
use crate::entry::{HistoryEntry, HistoryEvent};
use crate::error::HistoryError;

/// Manages undo/redo history for a single tracked object.
///
/// The manager is not synchronized; owners that share it across threads
/// wrap it in their own lock so that push, undo and redo never interleave.
pub struct HistoryManager<S> {
    /// Undo stack, oldest at the front.
    undo_stack: VecDeque<HistoryEntry<S>>,
    /// Redo stack, oldest at the front.
    redo_stack: VecDeque<HistoryEntry<S>>,
    config: HistoryConfig,
    /// Availability changes not yet collected by the owner.
    pending_events: Vec<HistoryEvent>,
}

impl<S> std::fmt::Debug for HistoryManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("undo_len", &self.undo_stack.len())
            .field("redo_len", &self.redo_stack.len())
            .field("max_history_steps", &self.config.max_history_steps)
            .field("pending_events", &self.pending_events)
            .finish()
    }
}

impl<S> Default for HistoryManager<S> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl<S> HistoryManager<S> {
    /// Creates an empty manager.
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(config.capacity().min(64)),
            redo_stack: VecDeque::with_capacity(config.capacity().min(64)),
            config,
            pending_events: Vec::new(),
        }
    }

    /// Records a new state.
    ///
    /// Redo history is only valid right after an undo, so it is discarded.
    pub fn push(&mut self, snapshot: S, history_id: impl Into<String>) {
        let entry = HistoryEntry::new(snapshot, history_id);
        self.tracking_availability(|mgr| {
            let capacity = mgr.config.capacity();
            push_bounded(&mut mgr.undo_stack, entry, capacity);
            mgr.redo_stack.clear();
        });
    }

    /// Steps one entry back.
    ///
    /// `current` is the state being left; it moves onto the redo stack so
    /// that a later `redo` can return to it. Returns the popped undo entry.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NothingToUndo` without touching either stack
    /// if the undo stack is empty.
    pub fn undo(
        &mut self,
        current: S,
        current_id: impl Into<String>,
    ) -> Result<HistoryEntry<S>, HistoryError> {
        if self.undo_stack.is_empty() {
            return Err(HistoryError::NothingToUndo);
        }
        let current = HistoryEntry::new(current, current_id);
        self.tracking_availability(|mgr| {
            let capacity = mgr.config.capacity();
            push_bounded(&mut mgr.redo_stack, current, capacity);
            mgr.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)
        })
    }

    /// Steps one entry forward. Mirror image of `undo`.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NothingToRedo` without touching either stack
    /// if the redo stack is empty.
    pub fn redo(
        &mut self,
        current: S,
        current_id: impl Into<String>,
    ) -> Result<HistoryEntry<S>, HistoryError> {
        if self.redo_stack.is_empty() {
            return Err(HistoryError::NothingToRedo);
        }
        let current = HistoryEntry::new(current, current_id);
        self.tracking_availability(|mgr| {
            let capacity = mgr.config.capacity();
            push_bounded(&mut mgr.undo_stack, current, capacity);
            mgr.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)
        })
    }

    /// Whether undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Entry the next `undo` would return, left in place.
    ///
    /// Owners that apply the snapshot before committing the step use this,
    /// so a failed apply leaves both stacks as they were.
    pub fn peek_undo(&self) -> Option<&HistoryEntry<S>> {
        self.undo_stack.back()
    }

    /// Entry the next `redo` would return, left in place.
    pub fn peek_redo(&self) -> Option<&HistoryEntry<S>> {
        self.redo_stack.back()
    }

    /// Id of the entry the next `undo` would return.
    pub fn peek_undo_id(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.history_id.as_str())
    }

    /// Id of the entry the next `redo` would return.
    pub fn peek_redo_id(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.history_id.as_str())
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Drops every entry from both stacks.
    pub fn clear(&mut self) {
        self.tracking_availability(|mgr| {
            mgr.undo_stack.clear();
            mgr.redo_stack.clear();
        });
    }

    /// Drains the availability events raised since the last call.
    pub fn take_events(&mut self) -> Vec<HistoryEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Runs `op` and queues one event per stack whose emptiness flipped.
    fn tracking_availability<R>(&mut self, op: impl FnOnce(&mut Self) -> R) -> R {
        let could_undo = self.can_undo();
        let could_redo = self.can_redo();

        let result = op(self);

        if could_undo != self.can_undo() {
            self.pending_events
                .push(HistoryEvent::UndoAvailabilityChanged(self.can_undo()));
        }
        if could_redo != self.can_redo() {
            self.pending_events
                .push(HistoryEvent::RedoAvailabilityChanged(self.can_redo()));
        }
        result
    }
}

/// Pushes onto `stack`, evicting from the front until `capacity` holds.
fn push_bounded<S>(
    stack: &mut VecDeque<HistoryEntry<S>>,
    entry: HistoryEntry<S>,
    capacity: usize,
) {
    stack.push_back(entry);
    while stack.len() > capacity {
        if let Some(evicted) = stack.pop_front() {
            tracing::debug!(
                "History capacity {capacity} exceeded, evicting entry '{}'",
                evicted.history_id
            );
        }
    }
}
