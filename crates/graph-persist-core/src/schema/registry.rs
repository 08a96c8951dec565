use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::SchemaError;

use super::{Record, RecordLayout, RecordSchema, Schema};

type AnyLayout = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Registry {
    schemas: HashMap<TypeId, Arc<Schema>>,
    layouts: HashMap<TypeId, AnyLayout>,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

/// Process-wide cache of discovered schemas.
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Returns the schema of `T` and every record type reachable from it,
    /// discovering it on first use.
    ///
    /// A failed discovery caches nothing.
    pub fn schema_for<T: Record>() -> Result<Arc<Schema>, SchemaError> {
        let key = TypeId::of::<T>();
        if let Some(schema) = read().schemas.get(&key) {
            return Ok(Arc::clone(schema));
        }

        let mut discovery = Discovery::default();
        discovery.visit::<T>()?;
        let schema = Arc::new(Schema::new(key, discovery.records));
        tracing::debug!(
            "Discovered schema for '{}' ({} record types)",
            T::type_name(),
            schema.records().len()
        );

        let mut registry = write();
        for (id, layout) in discovery.layouts {
            registry.layouts.entry(id).or_insert(layout);
        }
        Ok(Arc::clone(registry.schemas.entry(key).or_insert(schema)))
    }
}

/// Typed field accessors of `U`, discovering `U` if needed.
pub(crate) fn layout_of<U: Record>() -> Result<Arc<RecordLayout<U>>, SchemaError> {
    let key = TypeId::of::<U>();
    let cached = read().layouts.get(&key).cloned();
    let layout = match cached {
        Some(layout) => layout,
        None => {
            SchemaRegistry::schema_for::<U>()?;
            read()
                .layouts
                .get(&key)
                .cloned()
                .ok_or(SchemaError::LayoutMismatch {
                    type_name: U::type_name(),
                })?
        }
    };
    layout
        .downcast::<RecordLayout<U>>()
        .map_err(|_| SchemaError::LayoutMismatch {
            type_name: U::type_name(),
        })
}

fn read() -> std::sync::RwLockReadGuard<'static, Registry> {
    registry().read().unwrap_or_else(PoisonError::into_inner)
}

fn write() -> std::sync::RwLockWriteGuard<'static, Registry> {
    registry().write().unwrap_or_else(PoisonError::into_inner)
}

/// One discovery run over a type graph.
#[derive(Default)]
pub(crate) struct Discovery {
    visited: HashSet<TypeId>,
    records: Vec<RecordSchema>,
    layouts: Vec<(TypeId, AnyLayout)>,
}

impl Discovery {
    /// Builds the layout of `U`, then of every type its fields refer to.
    ///
    /// `U` is marked visited before its fields are expanded, which keeps
    /// self-referencing and mutually-referencing types finite.
    pub(crate) fn visit<U: Record>(&mut self) -> Result<(), SchemaError> {
        let key = TypeId::of::<U>();
        if !self.visited.insert(key) {
            return Ok(());
        }
        let layout = Arc::new(RecordLayout::<U>::build()?);
        self.records.push(layout.schema.clone());
        self.layouts.push((key, Arc::clone(&layout) as AnyLayout));
        for field in layout.fields() {
            field.discover(self)?;
        }
        Ok(())
    }
}
