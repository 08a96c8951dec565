//! Whole-graph traversals: deep cloning, capture into a flat
//! [`GraphImage`], restore from one, and notifier collection.
//!
//! Every traversal keys visited instances by identity and records an
//! instance before descending into its fields, so cycles terminate and an
//! instance reachable along several paths is produced exactly once.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, SchemaError};
use crate::schema::{layout_of, Record, Schema};
use crate::tracked::{ChangeNotifier, NodeKey, Tracked};
use crate::value::Value;

/// Version written into every image.
pub const FORMAT_VERSION: u32 = 1;

/// A flattened object graph: a node table plus the index of the root.
///
/// References between nodes are `Value::Ref` indices into `nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphImage {
    pub version: u32,
    pub root: u32,
    pub nodes: Vec<NodeImage>,
}

impl GraphImage {
    pub fn root_node(&self) -> Option<&NodeImage> {
        self.nodes.get(usize::try_from(self.root).ok()?)
    }
}

/// One record instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeImage {
    pub type_name: String,
    pub fields: Vec<FieldImage>,
}

/// One stored field. `index` is authoritative; `name` guards against
/// reading a file written for a different field layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldImage {
    pub index: u32,
    pub name: String,
    pub value: Value,
}

fn check_root<T: Record>(schema: &Schema) -> Result<(), CodecError> {
    if schema.is_root::<T>() {
        Ok(())
    } else {
        Err(CodecError::SchemaMismatch {
            expected: schema.root().type_name,
            found: T::type_name(),
        })
    }
}

/// Copies the graph under `root` into fresh instances with the same shape,
/// including shared instances and cycles.
pub fn deep_clone<T: Record>(schema: &Schema, root: &Tracked<T>) -> Result<Tracked<T>, CodecError> {
    check_root::<T>(schema)?;
    CloneContext::default().clone_node(root)
}

/// Flattens the graph under `root` into an image.
pub fn capture<T: Record>(schema: &Schema, root: &Tracked<T>) -> Result<GraphImage, CodecError> {
    check_root::<T>(schema)?;
    let mut encoder = Encoder::default();
    let root = encoder.node_ref(root)?;
    Ok(GraphImage {
        version: FORMAT_VERSION,
        root,
        nodes: encoder.nodes,
    })
}

/// Rebuilds a graph from an image.
pub fn restore<T: Record>(schema: &Schema, image: &GraphImage) -> Result<Tracked<T>, CodecError> {
    check_root::<T>(schema)?;
    if image.version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(image.version));
    }
    Decoder::new(image).node::<T>(image.root)
}

/// Notifiers of every instance reachable from `root`, each once.
pub(crate) fn reachable_notifiers<T: Record>(
    root: &Tracked<T>,
) -> Result<Vec<Arc<ChangeNotifier>>, SchemaError> {
    let mut walker = NodeWalker::default();
    walker.walk(root)?;
    Ok(walker.notifiers)
}

#[derive(Default)]
pub(crate) struct CloneContext {
    copies: HashMap<NodeKey, Box<dyn Any>>,
}

impl CloneContext {
    pub(crate) fn clone_node<U: Record>(
        &mut self,
        source: &Tracked<U>,
    ) -> Result<Tracked<U>, CodecError> {
        if let Some(copy) = self.copies.get(&source.key()) {
            return copy
                .downcast_ref::<Tracked<U>>()
                .cloned()
                .ok_or_else(|| mismatch::<U>().into());
        }

        let copy = Tracked::new(U::default());
        self.copies.insert(source.key(), Box::new(copy.clone()));
        let layout = layout_of::<U>()?;
        {
            let original = source.read();
            let mut target = copy.write();
            for field in layout.fields() {
                field.clone_into(&original, &mut target, self)?;
            }
        }
        Ok(copy)
    }
}

fn mismatch<U: Record>() -> SchemaError {
    SchemaError::LayoutMismatch {
        type_name: U::type_name(),
    }
}

#[derive(Default)]
pub(crate) struct Encoder {
    ids: HashMap<NodeKey, u32>,
    nodes: Vec<NodeImage>,
}

impl Encoder {
    /// Index of `node` in the table, encoding it on first sight.
    pub(crate) fn node_ref<U: Record>(&mut self, node: &Tracked<U>) -> Result<u32, CodecError> {
        if let Some(id) = self.ids.get(&node.key()) {
            return Ok(*id);
        }

        let position = self.nodes.len();
        let id = u32::try_from(position).map_err(|_| CodecError::OutOfRange("node table"))?;
        self.ids.insert(node.key(), id);
        self.nodes.push(NodeImage {
            type_name: U::type_name().to_string(),
            fields: Vec::new(),
        });

        let layout = layout_of::<U>()?;
        let mut fields = Vec::with_capacity(layout.schema.fields.len());
        {
            let record = node.read();
            for (descriptor, field) in layout.schema.fields.iter().zip(layout.fields()) {
                fields.push(FieldImage {
                    index: descriptor.index,
                    name: descriptor.name.to_string(),
                    value: field.encode(&record, self)?,
                });
            }
        }
        self.nodes[position].fields = fields;
        Ok(id)
    }
}

pub(crate) struct Decoder<'a> {
    image: &'a GraphImage,
    built: HashMap<u32, Box<dyn Any>>,
}

impl<'a> Decoder<'a> {
    fn new(image: &'a GraphImage) -> Self {
        Self {
            image,
            built: HashMap::new(),
        }
    }

    /// The instance stored at `id`, rebuilding it on first request.
    pub(crate) fn node<U: Record>(&mut self, id: u32) -> Result<Tracked<U>, CodecError> {
        let image = self.image;
        let stored = usize::try_from(id)
            .ok()
            .and_then(|i| image.nodes.get(i))
            .ok_or(CodecError::DanglingReference(id))?;
        let type_mismatch = || CodecError::NodeTypeMismatch {
            node: id,
            expected: U::type_name(),
            found: stored.type_name.clone(),
        };

        if let Some(node) = self.built.get(&id) {
            return node
                .downcast_ref::<Tracked<U>>()
                .cloned()
                .ok_or_else(type_mismatch);
        }
        if stored.type_name != U::type_name() {
            return Err(type_mismatch());
        }

        let node = Tracked::new(U::default());
        self.built.insert(id, Box::new(node.clone()));
        let layout = layout_of::<U>()?;
        {
            let mut record = node.write();
            for field_image in &stored.fields {
                let field = layout
                    .field(field_image.index)
                    .ok_or(CodecError::UnknownField {
                        type_name: U::type_name(),
                        index: field_image.index,
                    })?;
                if field.name() != field_image.name {
                    return Err(CodecError::FieldMismatch {
                        type_name: U::type_name(),
                        index: field_image.index,
                        expected: field.name(),
                        found: field_image.name.clone(),
                    });
                }
                field.decode(&mut record, &field_image.value, self)?;
            }
        }
        Ok(node)
    }
}

#[derive(Default)]
pub(crate) struct NodeWalker {
    visited: HashSet<NodeKey>,
    notifiers: Vec<Arc<ChangeNotifier>>,
}

impl NodeWalker {
    pub(crate) fn walk<U: Record>(&mut self, node: &Tracked<U>) -> Result<(), SchemaError> {
        if !self.visited.insert(node.key()) {
            return Ok(());
        }
        self.notifiers.push(Arc::clone(node.notifier()));
        let layout = layout_of::<U>()?;
        let record = node.read();
        for field in layout.fields() {
            field.walk(&record, self)?;
        }
        Ok(())
    }
}
