/// Core types stored on and emitted by the history stacks.

/// A snapshot together with the caller-supplied id it was committed under.
///
/// The id is opaque to the history system. An empty id marks the live tip,
/// i.e. a state that was never explicitly committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry<S> {
    pub snapshot: S,
    pub history_id: String,
}

impl<S> HistoryEntry<S> {
    pub fn new(snapshot: S, history_id: impl Into<String>) -> Self {
        Self {
            snapshot,
            history_id: history_id.into(),
        }
    }

    pub fn into_parts(self) -> (S, String) {
        (self.snapshot, self.history_id)
    }
}

/// Emitted once each time a stack flips between empty and non-empty.
///
/// The payload is the new availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    UndoAvailabilityChanged(bool),
    RedoAvailabilityChanged(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_into_parts() {
        let entry = HistoryEntry::new(42_u32, "first");
        let (snapshot, id) = entry.into_parts();
        assert_eq!(snapshot, 42);
        assert_eq!(id, "first");
    }

    #[test]
    fn test_entry_accepts_owned_id() {
        let entry = HistoryEntry::new("snap", String::from("id-1"));
        assert_eq!(entry.history_id, "id-1");
        assert_eq!(entry.snapshot, "snap");
    }
}
