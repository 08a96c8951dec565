//! Handler lists for change and availability notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Counter for subscription ids, unique within the process.
static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A list of handlers for one kind of event.
///
/// `emit` snapshots the handler list and calls the handlers after releasing
/// the internal lock, so a handler may subscribe or unsubscribe freely.
pub struct EventHub<E> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }
}

impl<E> std::fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl<E> EventHub<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.lock().push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.lock().len()
    }

    pub fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Handler<E>)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
