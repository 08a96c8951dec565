use thiserror::Error;

use crate::error::{CodecError, MergeError};
use crate::tracked::Tracked;

/// Why a slot of a record sequence could not be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("capacity {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    #[error("sequence cannot hold an empty slot")]
    EmptySlot,

    #[error("expected {expected} slots, found {found}")]
    LengthMismatch { expected: usize, found: usize },
}

impl SlotError {
    pub(crate) fn into_merge(self, field: &'static str, index: usize) -> MergeError {
        match self {
            SlotError::CapacityExceeded { capacity } => MergeError::CapacityExceeded {
                field,
                capacity,
                index,
            },
            SlotError::EmptySlot => MergeError::ShapeMismatch {
                field,
                reason: "growable sequence cannot hold an empty slot",
            },
            SlotError::LengthMismatch { .. } => MergeError::ShapeMismatch {
                field,
                reason: "fixed sequence length differs",
            },
        }
    }

    pub(crate) fn into_codec(self, field: &'static str) -> CodecError {
        let reason = match self {
            SlotError::CapacityExceeded { .. } => "too many slots for fixed capacity",
            SlotError::EmptySlot => "empty slot in growable sequence",
            SlotError::LengthMismatch { .. } => "slot count differs from fixed length",
        };
        CodecError::Sequence { field, reason }
    }
}

/// Storage for a record-sequence field.
///
/// Growable sequences (`Vec<Tracked<U>>`) resize to follow the source of a
/// merge. Fixed-capacity sequences (`Box<[Option<Tracked<U>>]>` and arrays)
/// keep their length: surplus slots become `None` and writing past the end
/// fails.
pub trait RecordSequence: Send + Sync + 'static {
    type Element;

    const FIXED: bool;

    fn slot_count(&self) -> usize;

    fn slot(&self, index: usize) -> Option<&Tracked<Self::Element>>;

    /// Assigns slot `index`, appending when `index == slot_count()` on a
    /// growable sequence.
    fn put(&mut self, index: usize, node: Option<Tracked<Self::Element>>)
        -> Result<(), SlotError>;

    /// Drops (growable) or empties (fixed) every slot from `len` on.
    fn truncate_slots(&mut self, len: usize);

    fn from_slots(slots: Vec<Option<Tracked<Self::Element>>>) -> Result<Self, SlotError>
    where
        Self: Sized;
}

impl<U: Send + Sync + 'static> RecordSequence for Vec<Tracked<U>> {
    type Element = U;

    const FIXED: bool = false;

    fn slot_count(&self) -> usize {
        self.len()
    }

    fn slot(&self, index: usize) -> Option<&Tracked<U>> {
        self.get(index)
    }

    fn put(&mut self, index: usize, node: Option<Tracked<U>>) -> Result<(), SlotError> {
        let node = node.ok_or(SlotError::EmptySlot)?;
        if index < self.len() {
            self[index] = node;
        } else if index == self.len() {
            self.push(node);
        } else {
            return Err(SlotError::CapacityExceeded {
                capacity: self.len(),
            });
        }
        Ok(())
    }

    fn truncate_slots(&mut self, len: usize) {
        self.truncate(len);
    }

    fn from_slots(slots: Vec<Option<Tracked<U>>>) -> Result<Self, SlotError> {
        slots
            .into_iter()
            .map(|slot| slot.ok_or(SlotError::EmptySlot))
            .collect()
    }
}

fn put_fixed<U>(
    slots: &mut [Option<Tracked<U>>],
    index: usize,
    node: Option<Tracked<U>>,
) -> Result<(), SlotError> {
    let capacity = slots.len();
    let slot = slots
        .get_mut(index)
        .ok_or(SlotError::CapacityExceeded { capacity })?;
    *slot = node;
    Ok(())
}

fn clear_from<U>(slots: &mut [Option<Tracked<U>>], len: usize) {
    for slot in slots.iter_mut().skip(len) {
        *slot = None;
    }
}

impl<U: Send + Sync + 'static> RecordSequence for Box<[Option<Tracked<U>>]> {
    type Element = U;

    const FIXED: bool = true;

    fn slot_count(&self) -> usize {
        self.len()
    }

    fn slot(&self, index: usize) -> Option<&Tracked<U>> {
        self.get(index).and_then(Option::as_ref)
    }

    fn put(&mut self, index: usize, node: Option<Tracked<U>>) -> Result<(), SlotError> {
        put_fixed(self, index, node)
    }

    fn truncate_slots(&mut self, len: usize) {
        clear_from(self, len);
    }

    fn from_slots(slots: Vec<Option<Tracked<U>>>) -> Result<Self, SlotError> {
        Ok(slots.into_boxed_slice())
    }
}

impl<U: Send + Sync + 'static, const N: usize> RecordSequence for [Option<Tracked<U>>; N] {
    type Element = U;

    const FIXED: bool = true;

    fn slot_count(&self) -> usize {
        N
    }

    fn slot(&self, index: usize) -> Option<&Tracked<U>> {
        self.get(index).and_then(Option::as_ref)
    }

    fn put(&mut self, index: usize, node: Option<Tracked<U>>) -> Result<(), SlotError> {
        put_fixed(self, index, node)
    }

    fn truncate_slots(&mut self, len: usize) {
        clear_from(self, len);
    }

    fn from_slots(slots: Vec<Option<Tracked<U>>>) -> Result<Self, SlotError> {
        let found = slots.len();
        slots
            .try_into()
            .map_err(|_| SlotError::LengthMismatch { expected: N, found })
    }
}
