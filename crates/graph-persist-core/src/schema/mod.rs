//! Schema discovery for record types.
//!
//! Record types describe their fields once through a `RecordBuilder`. The
//! registry turns those descriptions into a plain-data `Schema` (ordered,
//! indexed field descriptors) plus typed accessors used by the merge engine
//! and the codec. Both are cached per type for the life of the process.

mod record;
mod registry;
mod sequence;

use std::any::TypeId;

pub use record::{Record, RecordBuilder};
pub(crate) use record::{FieldAccess, RecordLayout};
pub use registry::SchemaRegistry;
pub(crate) use registry::{layout_of, Discovery};
pub use sequence::{RecordSequence, SlotError};

/// How a field is stored and merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Value without identity, compared and assigned by value.
    Scalar,
    /// Ordered collection of scalars, replaced wholesale.
    ScalarSequence,
    /// Optional reference to another record instance.
    Nested { type_name: &'static str },
    /// Ordered collection of record instances, merged position by position.
    RecordSequence {
        element: &'static str,
        /// Fixed-capacity sequences null trailing slots instead of shrinking.
        fixed: bool,
    },
}

impl FieldKind {
    /// Whether values of this field are record instances with identity.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            FieldKind::Nested { .. } | FieldKind::RecordSequence { .. }
        )
    }
}

/// One field of a record, as seen by codecs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// 1-based position after sorting the record's fields by name.
    pub index: u32,
    pub name: &'static str,
    pub kind: FieldKind,
    /// Codecs store these by node reference so shared instances stay shared.
    pub by_reference: bool,
}

/// The discovered fields of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub type_name: &'static str,
    /// Sorted by name; `fields[i].index == i + 1`.
    pub fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_index(&self, index: u32) -> Option<&FieldDescriptor> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.fields.get(position)
    }
}

/// Every record type reachable from a root type.
#[derive(Debug, Clone)]
pub struct Schema {
    root_type: TypeId,
    /// In discovery order; the root comes first.
    records: Vec<RecordSchema>,
}

impl Schema {
    pub(crate) fn new(root_type: TypeId, records: Vec<RecordSchema>) -> Self {
        Self { root_type, records }
    }

    /// Schema of the root type.
    pub fn root(&self) -> &RecordSchema {
        &self.records[0]
    }

    pub fn records(&self) -> &[RecordSchema] {
        &self.records
    }

    pub fn record(&self, type_name: &str) -> Option<&RecordSchema> {
        self.records.iter().find(|r| r.type_name == type_name)
    }

    /// Whether this schema was discovered from `T`.
    pub fn is_root<T: 'static>(&self) -> bool {
        self.root_type == TypeId::of::<T>()
    }
}
