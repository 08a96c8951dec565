//! Undo/redo and persistence for graphs of tracked records.
//!
//! Records describe their fields once ([`Record::describe`]); the library
//! derives a [`Schema`] from that and uses it to deep-clone, merge, encode
//! and decode whole object graphs, cycles and shared instances included.
//! [`Persister`] ties it together: it snapshots a live graph into a bounded
//! history, merges snapshots back in place on undo/redo, saves and loads
//! files through a [`Codec`], and can commit and auto-save on its own.

pub mod codec;
pub mod error;
pub mod event;
pub mod graph;
pub mod merge;
pub mod persister;
pub mod schema;
pub mod tracked;
pub mod value;

pub use codec::{BincodeCodec, Codec};
pub use error::{CodecError, MergeError, PersistError, SchemaError};
pub use event::{EventHub, SubscriptionId};
pub use graph::{FieldImage, GraphImage, NodeImage, FORMAT_VERSION};
pub use merge::{merge, MergeReport};
pub use persister::Persister;
pub use schema::{
    FieldDescriptor, FieldKind, Record, RecordBuilder, RecordSchema, RecordSequence, Schema,
    SchemaRegistry, SlotError,
};
pub use tracked::{ChangeNotifier, ChangeOrigin, PropertyChanged, Tracked};
pub use value::{Scalar, Value};

pub use graph_persist_config::{AutoSaveSettings, ConfigError, PersisterSettings};
pub use graph_persist_mod_history::HistoryError;
