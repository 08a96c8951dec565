//! Identity-preserving merge of a snapshot into a live graph.
//!
//! The live root and every instance the snapshot can be matched to stay the
//! same objects; only their fields are brought in line with the snapshot.
//! Matching is structural: nested records by field, sequence elements by
//! position. Instances present in the snapshot with no live counterpart are
//! adopted as-is.
//!
//! Notifications are collected while the graph is locked and raised later
//! through [`MergeReport::notify`], with [`ChangeOrigin::Restore`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MergeError;
use crate::schema::{layout_of, Record};
use crate::tracked::{ChangeNotifier, ChangeOrigin, NodeKey, PropertyChanged, Tracked};

struct PendingChange {
    notifier: Arc<ChangeNotifier>,
    property: &'static str,
}

/// Property changes made by a merge, not yet announced.
#[must_use = "call `notify` to announce the merged changes"]
pub struct MergeReport {
    changes: Vec<PendingChange>,
}

impl std::fmt::Debug for MergeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeReport")
            .field("changes", &self.changed_properties())
            .finish()
    }
}

impl MergeReport {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Names of the changed properties, in merge order.
    pub fn changed_properties(&self) -> Vec<&'static str> {
        self.changes.iter().map(|c| c.property).collect()
    }

    /// Raises one property-changed notification per change.
    ///
    /// Must be called with no node or persister lock held.
    pub fn notify(self) {
        for change in self.changes {
            change.notifier.emit(&PropertyChanged {
                property: change.property.to_string(),
                origin: ChangeOrigin::Restore,
            });
        }
    }
}

pub(crate) struct MergeContext {
    /// Target instance -> the source instance it was merged from.
    merged_from: HashMap<NodeKey, NodeKey>,
    changes: Vec<PendingChange>,
}

impl MergeContext {
    /// Merges `source` into `target`; each target instance is merged once.
    ///
    /// Returns `false` when `target` was already merged from a different
    /// source instance. The target is then aliased where the source is not,
    /// and the caller must hold `source` itself in that position.
    pub(crate) fn merge_node<U: Record>(
        &mut self,
        target: &Tracked<U>,
        source: &Tracked<U>,
    ) -> Result<bool, MergeError> {
        if target.ptr_eq(source) {
            return Ok(true);
        }
        match self.merged_from.entry(target.key()) {
            Entry::Occupied(seen) => return Ok(*seen.get() == source.key()),
            Entry::Vacant(slot) => {
                slot.insert(source.key());
            }
        }
        let layout = layout_of::<U>()?;
        let incoming = source.read();
        let mut current = target.write();
        for field in layout.fields() {
            if field.merge(&mut current, &incoming, self)? {
                self.changes.push(PendingChange {
                    notifier: Arc::clone(target.notifier()),
                    property: field.name(),
                });
            }
        }
        Ok(true)
    }
}

/// Updates `target` in place so it matches `source`.
///
/// Field rules:
/// - scalars and scalar lists are assigned when they differ;
/// - a nested record present on both sides is merged recursively,
///   otherwise the source handle (or `None`) is assigned;
/// - an instance the target reaches along two paths is merged from the
///   first source instance paired with it; where the source holds a
///   different instance, that instance is assigned instead;
/// - record sequences are merged by position; growable sequences are then
///   truncated or extended to the source length, fixed ones null their
///   surplus slots and refuse to grow.
///
/// No handler runs during the call. On error, fields merged so far keep
/// their new values.
pub fn merge<T: Record>(
    target: &Tracked<T>,
    source: &Tracked<T>,
) -> Result<MergeReport, MergeError> {
    let mut ctx = MergeContext {
        merged_from: HashMap::new(),
        changes: Vec::new(),
    };
    ctx.merge_node(target, source)?;
    Ok(MergeReport {
        changes: ctx.changes,
    })
}
