use crate::error::{CodecError, MergeError, SchemaError};
use crate::graph::{CloneContext, Decoder, Encoder, NodeWalker};
use crate::merge::MergeContext;
use crate::tracked::Tracked;
use crate::value::{Scalar, Value};

use super::sequence::RecordSequence;
use super::{Discovery, FieldDescriptor, FieldKind, RecordSchema};

/// A type whose instances can be tracked, merged and persisted.
///
/// `describe` lists every persisted field with a name and a pair of
/// accessors. The kind of each field follows from the builder method used:
///
/// ```
/// use graph_persist_core::{Record, RecordBuilder, Tracked};
///
/// #[derive(Default)]
/// struct Part {
///     label: String,
/// }
///
/// impl Record for Part {
///     fn describe(fields: &mut RecordBuilder<Self>) {
///         fields.scalar("label", |p| &p.label, |p| &mut p.label);
///     }
/// }
///
/// #[derive(Default)]
/// struct Assembly {
///     name: String,
///     weights: Vec<f64>,
///     main: Option<Tracked<Part>>,
///     parts: Vec<Tracked<Part>>,
/// }
///
/// impl Record for Assembly {
///     fn describe(fields: &mut RecordBuilder<Self>) {
///         fields
///             .scalar("name", |a| &a.name, |a| &mut a.name)
///             .scalar_list("weights", |a| &a.weights, |a| &mut a.weights)
///             .nested("main", |a| &a.main, |a| &mut a.main)
///             .records("parts", |a| &a.parts, |a| &mut a.parts);
///     }
/// }
/// ```
pub trait Record: Default + Send + Sync + 'static {
    /// Name written into files and error messages.
    ///
    /// Defaults to the type's name without its module path, so moving a
    /// record between modules keeps existing files loadable. Generic
    /// records keep the paths of their parameters and should override this.
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn describe(fields: &mut RecordBuilder<Self>);
}

/// Strips the module path in front of the outermost type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.find('<').map_or(full, |i| &full[..i]);
    match head.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}

/// Collects the field accessors of one record type.
pub struct RecordBuilder<T> {
    fields: Vec<Box<dyn FieldAccess<T>>>,
}

impl<T: Record> RecordBuilder<T> {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// A value field without identity.
    pub fn scalar<F: Scalar>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> &mut Self {
        self.fields.push(Box::new(ScalarField { name, get, get_mut }));
        self
    }

    /// An ordered list of scalars.
    pub fn scalar_list<F: Scalar>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<F>,
        get_mut: fn(&mut T) -> &mut Vec<F>,
    ) -> &mut Self {
        self.fields
            .push(Box::new(ScalarListField { name, get, get_mut }));
        self
    }

    /// An optional reference to another record.
    pub fn nested<U: Record>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Option<Tracked<U>>,
        get_mut: fn(&mut T) -> &mut Option<Tracked<U>>,
    ) -> &mut Self {
        self.fields.push(Box::new(NestedField { name, get, get_mut }));
        self
    }

    /// An ordered collection of records, growable or fixed-capacity.
    pub fn records<Q>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Q,
        get_mut: fn(&mut T) -> &mut Q,
    ) -> &mut Self
    where
        Q: RecordSequence,
        Q::Element: Record,
    {
        self.fields
            .push(Box::new(RecordsField { name, get, get_mut }));
        self
    }
}

/// Typed operations on one field of `T`.
pub(crate) trait FieldAccess<T>: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> FieldKind;

    /// Registers the record types this field refers to.
    fn discover(&self, discovery: &mut Discovery) -> Result<(), SchemaError>;

    /// Brings `target` in line with `source`. Returns whether this field of
    /// `target` itself changed; nested instances report their own changes.
    fn merge(&self, target: &mut T, source: &T, ctx: &mut MergeContext)
        -> Result<bool, MergeError>;

    fn clone_into(
        &self,
        source: &T,
        target: &mut T,
        ctx: &mut CloneContext,
    ) -> Result<(), CodecError>;

    fn encode(&self, record: &T, encoder: &mut Encoder) -> Result<Value, CodecError>;

    fn decode(
        &self,
        record: &mut T,
        value: &Value,
        decoder: &mut Decoder<'_>,
    ) -> Result<(), CodecError>;

    /// Visits the instances this field refers to.
    fn walk(&self, record: &T, walker: &mut NodeWalker) -> Result<(), SchemaError>;
}

/// Validated, name-sorted fields of one record type.
pub(crate) struct RecordLayout<T> {
    pub(crate) schema: RecordSchema,
    fields: Vec<Box<dyn FieldAccess<T>>>,
}

impl<T: Record> RecordLayout<T> {
    pub(crate) fn build() -> Result<Self, SchemaError> {
        let mut builder = RecordBuilder::new();
        T::describe(&mut builder);
        let mut fields = builder.fields;
        let type_name = T::type_name();

        for field in &fields {
            if !is_identifier(field.name()) {
                return Err(SchemaError::InvalidFieldName {
                    type_name,
                    field: field.name(),
                });
            }
        }
        fields.sort_by(|a, b| a.name().cmp(b.name()));
        if let Some(pair) = fields.windows(2).find(|w| w[0].name() == w[1].name()) {
            return Err(SchemaError::DuplicateField {
                type_name,
                field: pair[0].name(),
            });
        }

        let descriptors = fields
            .iter()
            .zip(1u32..)
            .map(|(field, index)| {
                let kind = field.kind();
                FieldDescriptor {
                    index,
                    name: field.name(),
                    kind,
                    by_reference: kind.is_reference(),
                }
            })
            .collect();

        Ok(Self {
            schema: RecordSchema {
                type_name,
                fields: descriptors,
            },
            fields,
        })
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = &dyn FieldAccess<T>> {
        self.fields.iter().map(|f| f.as_ref())
    }

    /// Field stored under the 1-based `index`.
    pub(crate) fn field(&self, index: u32) -> Option<&dyn FieldAccess<T>> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.fields.get(position).map(|f| f.as_ref())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

// ── Scalar ──────────────────────────────────────────────────────────

struct ScalarField<T, F> {
    name: &'static str,
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T: Record, F: Scalar> FieldAccess<T> for ScalarField<T, F> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FieldKind {
        FieldKind::Scalar
    }

    fn discover(&self, _discovery: &mut Discovery) -> Result<(), SchemaError> {
        Ok(())
    }

    fn merge(
        &self,
        target: &mut T,
        source: &T,
        _ctx: &mut MergeContext,
    ) -> Result<bool, MergeError> {
        let value = (self.get)(source);
        let slot = (self.get_mut)(target);
        if slot.same_value(value) {
            return Ok(false);
        }
        *slot = value.clone();
        Ok(true)
    }

    fn clone_into(
        &self,
        source: &T,
        target: &mut T,
        _ctx: &mut CloneContext,
    ) -> Result<(), CodecError> {
        *(self.get_mut)(target) = (self.get)(source).clone();
        Ok(())
    }

    fn encode(&self, record: &T, _encoder: &mut Encoder) -> Result<Value, CodecError> {
        Ok((self.get)(record).to_value())
    }

    fn decode(
        &self,
        record: &mut T,
        value: &Value,
        _decoder: &mut Decoder<'_>,
    ) -> Result<(), CodecError> {
        *(self.get_mut)(record) = F::from_value(value)?;
        Ok(())
    }

    fn walk(&self, _record: &T, _walker: &mut NodeWalker) -> Result<(), SchemaError> {
        Ok(())
    }
}

// ── Scalar list ─────────────────────────────────────────────────────

struct ScalarListField<T, F> {
    name: &'static str,
    get: fn(&T) -> &Vec<F>,
    get_mut: fn(&mut T) -> &mut Vec<F>,
}

impl<T: Record, F: Scalar> FieldAccess<T> for ScalarListField<T, F> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FieldKind {
        FieldKind::ScalarSequence
    }

    fn discover(&self, _discovery: &mut Discovery) -> Result<(), SchemaError> {
        Ok(())
    }

    fn merge(
        &self,
        target: &mut T,
        source: &T,
        _ctx: &mut MergeContext,
    ) -> Result<bool, MergeError> {
        let values = (self.get)(source);
        let slot = (self.get_mut)(target);
        if slot.len() == values.len() && slot.iter().zip(values).all(|(a, b)| a.same_value(b)) {
            return Ok(false);
        }
        *slot = values.clone();
        Ok(true)
    }

    fn clone_into(
        &self,
        source: &T,
        target: &mut T,
        _ctx: &mut CloneContext,
    ) -> Result<(), CodecError> {
        *(self.get_mut)(target) = (self.get)(source).clone();
        Ok(())
    }

    fn encode(&self, record: &T, _encoder: &mut Encoder) -> Result<Value, CodecError> {
        Ok(Value::List(
            (self.get)(record).iter().map(Scalar::to_value).collect(),
        ))
    }

    fn decode(
        &self,
        record: &mut T,
        value: &Value,
        _decoder: &mut Decoder<'_>,
    ) -> Result<(), CodecError> {
        let items = match value {
            Value::List(items) => items,
            other => return Err(other.unexpected("list")),
        };
        *(self.get_mut)(record) = items
            .iter()
            .map(F::from_value)
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn walk(&self, _record: &T, _walker: &mut NodeWalker) -> Result<(), SchemaError> {
        Ok(())
    }
}

// ── Nested record ───────────────────────────────────────────────────

struct NestedField<T, U> {
    name: &'static str,
    get: fn(&T) -> &Option<Tracked<U>>,
    get_mut: fn(&mut T) -> &mut Option<Tracked<U>>,
}

impl<T: Record, U: Record> FieldAccess<T> for NestedField<T, U> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FieldKind {
        FieldKind::Nested {
            type_name: U::type_name(),
        }
    }

    fn discover(&self, discovery: &mut Discovery) -> Result<(), SchemaError> {
        discovery.visit::<U>()
    }

    fn merge(
        &self,
        target: &mut T,
        source: &T,
        ctx: &mut MergeContext,
    ) -> Result<bool, MergeError> {
        let incoming = (self.get)(source);
        let slot = (self.get_mut)(target);
        if let (Some(current), Some(node)) = (slot.as_ref(), incoming) {
            if ctx.merge_node(current, node)? {
                return Ok(false);
            }
        } else if slot.is_none() && incoming.is_none() {
            return Ok(false);
        }
        *slot = incoming.clone();
        Ok(true)
    }

    fn clone_into(
        &self,
        source: &T,
        target: &mut T,
        ctx: &mut CloneContext,
    ) -> Result<(), CodecError> {
        let copy = match (self.get)(source) {
            Some(node) => Some(ctx.clone_node(node)?),
            None => None,
        };
        *(self.get_mut)(target) = copy;
        Ok(())
    }

    fn encode(&self, record: &T, encoder: &mut Encoder) -> Result<Value, CodecError> {
        match (self.get)(record) {
            Some(node) => Ok(Value::Ref(encoder.node_ref(node)?)),
            None => Ok(Value::Null),
        }
    }

    fn decode(
        &self,
        record: &mut T,
        value: &Value,
        decoder: &mut Decoder<'_>,
    ) -> Result<(), CodecError> {
        *(self.get_mut)(record) = match value {
            Value::Null => None,
            Value::Ref(id) => Some(decoder.node::<U>(*id)?),
            other => return Err(other.unexpected("reference")),
        };
        Ok(())
    }

    fn walk(&self, record: &T, walker: &mut NodeWalker) -> Result<(), SchemaError> {
        match (self.get)(record) {
            Some(node) => walker.walk(node),
            None => Ok(()),
        }
    }
}

// ── Record sequence ─────────────────────────────────────────────────

struct RecordsField<T, Q> {
    name: &'static str,
    get: fn(&T) -> &Q,
    get_mut: fn(&mut T) -> &mut Q,
}

impl<T, Q> FieldAccess<T> for RecordsField<T, Q>
where
    T: Record,
    Q: RecordSequence,
    Q::Element: Record,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FieldKind {
        FieldKind::RecordSequence {
            element: <Q::Element as Record>::type_name(),
            fixed: Q::FIXED,
        }
    }

    fn discover(&self, discovery: &mut Discovery) -> Result<(), SchemaError> {
        discovery.visit::<Q::Element>()
    }

    fn merge(
        &self,
        target: &mut T,
        source: &T,
        ctx: &mut MergeContext,
    ) -> Result<bool, MergeError> {
        let incoming = (self.get)(source);
        let slots = (self.get_mut)(target);
        let (current_len, incoming_len) = (slots.slot_count(), incoming.slot_count());
        let mut changed = false;

        for index in 0..current_len.min(incoming_len) {
            match (slots.slot(index).cloned(), incoming.slot(index)) {
                (Some(current), Some(node)) => {
                    if !ctx.merge_node(&current, node)? {
                        slots
                            .put(index, Some(node.clone()))
                            .map_err(|e| e.into_merge(self.name, index))?;
                        changed = true;
                    }
                }
                (None, None) => {}
                (_, node) => {
                    slots
                        .put(index, node.cloned())
                        .map_err(|e| e.into_merge(self.name, index))?;
                    changed = true;
                }
            }
        }

        if incoming_len < current_len {
            slots.truncate_slots(incoming_len);
            changed = true;
        }
        for index in current_len..incoming_len {
            slots
                .put(index, incoming.slot(index).cloned())
                .map_err(|e| e.into_merge(self.name, index))?;
            changed = true;
        }
        Ok(changed)
    }

    fn clone_into(
        &self,
        source: &T,
        target: &mut T,
        ctx: &mut CloneContext,
    ) -> Result<(), CodecError> {
        let source = (self.get)(source);
        let mut copies = Vec::with_capacity(source.slot_count());
        for index in 0..source.slot_count() {
            copies.push(match source.slot(index) {
                Some(node) => Some(ctx.clone_node(node)?),
                None => None,
            });
        }
        *(self.get_mut)(target) =
            Q::from_slots(copies).map_err(|e| e.into_codec(self.name))?;
        Ok(())
    }

    fn encode(&self, record: &T, encoder: &mut Encoder) -> Result<Value, CodecError> {
        let slots = (self.get)(record);
        let mut items = Vec::with_capacity(slots.slot_count());
        for index in 0..slots.slot_count() {
            items.push(match slots.slot(index) {
                Some(node) => Value::Ref(encoder.node_ref(node)?),
                None => Value::Null,
            });
        }
        Ok(Value::List(items))
    }

    fn decode(
        &self,
        record: &mut T,
        value: &Value,
        decoder: &mut Decoder<'_>,
    ) -> Result<(), CodecError> {
        let items = match value {
            Value::List(items) => items,
            other => return Err(other.unexpected("list")),
        };
        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            nodes.push(match item {
                Value::Null => None,
                Value::Ref(id) => Some(decoder.node::<Q::Element>(*id)?),
                other => return Err(other.unexpected("reference")),
            });
        }
        *(self.get_mut)(record) = Q::from_slots(nodes).map_err(|e| e.into_codec(self.name))?;
        Ok(())
    }

    fn walk(&self, record: &T, walker: &mut NodeWalker) -> Result<(), SchemaError> {
        let slots = (self.get)(record);
        for index in 0..slots.slot_count() {
            if let Some(node) = slots.slot(index) {
                walker.walk(node)?;
            }
        }
        Ok(())
    }
}
