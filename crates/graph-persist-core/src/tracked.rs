//! Shared, observable handles to live record instances.
//!
//! A `Tracked<T>` is the unit of identity in an object graph: cloning the
//! handle shares the instance, and the merge engine updates the instance
//! behind a handle instead of swapping handles, so anyone holding one keeps
//! seeing the current state.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::event::{EventHub, SubscriptionId};

/// Who caused a property change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A caller mutated the object through `Tracked::modify`/`set`/`notify`.
    User,
    /// The merge engine restored the value from a history snapshot.
    Restore,
}

/// Payload of a property-changed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChanged {
    pub property: String,
    pub origin: ChangeOrigin,
}

/// Per-instance list of property-changed handlers.
pub type ChangeNotifier = EventHub<PropertyChanged>;

/// Identity of a tracked instance, valid while the instance is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey(usize);

struct TrackedInner<T> {
    state: RwLock<T>,
    notifier: Arc<ChangeNotifier>,
}

/// A shared, lockable, observable record instance.
pub struct Tracked<T> {
    inner: Arc<TrackedInner<T>>,
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.state.try_read() {
            Ok(state) => f.debug_tuple("Tracked").field(&*state).finish(),
            Err(_) => f.debug_tuple("Tracked").field(&"<locked>").finish(),
        }
    }
}

impl<T> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(TrackedInner {
                state: RwLock::new(value),
                notifier: Arc::new(ChangeNotifier::new()),
            }),
        }
    }

    /// Locks the instance for reading.
    ///
    /// Do not hold the guard while calling into a `Persister`; commits need
    /// to read every node of the graph.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the instance for writing without raising any notification.
    ///
    /// Pair with `notify` when observers need to know, or use `modify`.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the instance, then notifies that `property` changed.
    ///
    /// The write lock is released before handlers run.
    pub fn modify<R>(&self, property: &str, f: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut state = self.write();
            f(&mut state)
        };
        self.notify(property);
        result
    }

    /// Assigns `value` to the field selected by `field` and notifies,
    /// unless the field already holds an equal value.
    ///
    /// Returns whether the value changed.
    pub fn set<F: PartialEq>(
        &self,
        property: &str,
        field: impl FnOnce(&mut T) -> &mut F,
        value: F,
    ) -> bool {
        let changed = {
            let mut state = self.write();
            let slot = field(&mut state);
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        };
        if changed {
            self.notify(property);
        }
        changed
    }

    /// Raises a user-originated notification for `property`.
    pub fn notify(&self, property: &str) {
        self.inner.notifier.emit(&PropertyChanged {
            property: property.to_string(),
            origin: ChangeOrigin::User,
        });
    }

    pub fn subscribe(
        &self,
        handler: impl Fn(&PropertyChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.notifier.subscribe(handler)
    }

    /// Removes a handler. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    /// Number of handlers currently subscribed.
    pub fn handler_count(&self) -> usize {
        self.inner.notifier.handler_count()
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn key(&self) -> NodeKey {
        NodeKey(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    pub(crate) fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.inner.notifier
    }
}
