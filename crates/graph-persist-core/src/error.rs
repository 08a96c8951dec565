//! Error types for schema discovery, merging, encoding, and the persister.

use graph_persist_config::ConfigError;
use graph_persist_mod_history::HistoryError;
use thiserror::Error;

/// A record descriptor that cannot be turned into a schema.
///
/// Raised by discovery before anything is cached, so a broken type never
/// leaves a partial schema behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Field names must be non-empty ASCII identifiers.
    #[error("type '{type_name}' declares an invalid field name '{field}'")]
    InvalidFieldName {
        type_name: &'static str,
        field: &'static str,
    },

    /// Two fields of the same record share a name.
    #[error("type '{type_name}' declares field '{field}' more than once")]
    DuplicateField {
        type_name: &'static str,
        field: &'static str,
    },

    /// The registry holds a layout for this type id that is not of this type.
    #[error("registered layout for '{type_name}' does not match the requested type")]
    LayoutMismatch { type_name: &'static str },
}

/// A snapshot whose shape disagrees with the live object it is merged into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A fixed-capacity sequence was asked to grow.
    #[error("field '{field}' has fixed capacity {capacity}, cannot assign slot {index}")]
    CapacityExceeded {
        field: &'static str,
        capacity: usize,
        index: usize,
    },

    /// Source and target disagree in a way no merge can reconcile.
    #[error("shape mismatch in field '{field}': {reason}")]
    ShapeMismatch {
        field: &'static str,
        reason: &'static str,
    },
}

/// Failures of the encode/decode/clone primitives.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("binary encoding failed: {0}")]
    Bincode(#[from] bincode::Error),

    /// The codec was handed a root whose type is not the schema's root.
    #[error("schema was built for '{expected}', not '{found}'")]
    SchemaMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The input does not start with the graph file header.
    #[error("not a graph file")]
    BadMagic,

    /// The file was written by an incompatible format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    /// A stored field index names a different field than the current type.
    #[error("field #{index} of '{type_name}' is '{expected}', stored as '{found}'")]
    FieldMismatch {
        type_name: &'static str,
        index: u32,
        expected: &'static str,
        found: String,
    },

    /// A stored field index the current type does not have.
    #[error("'{type_name}' has no field #{index}")]
    UnknownField { type_name: &'static str, index: u32 },

    /// A reference points past the node table.
    #[error("reference to missing node #{0}")]
    DanglingReference(u32),

    /// A node is referenced with two different types, or its stored type
    /// name does not match the field that refers to it.
    #[error("node #{node} is a '{found}', expected '{expected}'")]
    NodeTypeMismatch {
        node: u32,
        expected: &'static str,
        found: String,
    },

    /// A stored value has the wrong kind for the field reading it.
    #[error("expected {expected} value, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },

    /// A stored value is the right kind but out of range for the field type.
    #[error("value out of range for {0}")]
    OutOfRange(&'static str),

    /// A stored sequence cannot be rebuilt as the field's sequence type.
    #[error("field '{field}': {reason}")]
    Sequence {
        field: &'static str,
        reason: &'static str,
    },
}

/// Errors surfaced by `Persister`.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Codec(CodecError),

    /// File errors are passed through untouched.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An operation needs a tracked object but none was attached.
    #[error("no tracked object is attached")]
    NotAttached,

    /// The persister was disposed.
    #[error("persister has been disposed")]
    Disposed,
}

impl From<CodecError> for PersistError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => PersistError::Io(e),
            CodecError::Schema(e) => PersistError::Schema(e),
            other => PersistError::Codec(other),
        }
    }
}

impl PersistError {
    /// Whether this is a configuration error (bad settings or descriptors).
    pub fn is_config(&self) -> bool {
        matches!(self, PersistError::Config(_) | PersistError::Schema(_))
    }
}
