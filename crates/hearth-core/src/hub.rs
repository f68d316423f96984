use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::trace;

use hearth_types::Collection;

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Work a subscription performs on every change: re-read and call back.
pub(crate) type Delivery = Box<dyn FnMut() + Send>;

/// Per-collection registry of change listeners.
///
/// Writers call [`Hub::publish`] after a write commits; every listener
/// registered for that collection runs before `publish` returns.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,

    /// collection -> (listener id, listener), in registration order
    listeners: RwLock<HashMap<Collection, Vec<(u64, Listener)>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, collection: Collection, listener: Listener) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection)
            .or_default()
            .push((id, listener));
        id
    }

    fn unregister(&self, collection: Collection, id: u64) {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = listeners.get_mut(&collection) {
            entries.retain(|(entry_id, _)| *entry_id != id);
        }
    }

    /// Notify every listener of `collection`.
    pub fn publish(&self, collection: Collection) {
        // Snapshot so listeners may subscribe or unsubscribe others while running.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&collection)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        trace!("Publishing {} change to {} listeners", collection, listeners.len());
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self, collection: Collection) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

/// A live registration. Dropping it, or calling [`Subscription::unsubscribe`],
/// guarantees no callback starts afterwards; a callback already running
/// finishes first.
///
/// A subscription must not be dropped from inside its own callback, and a
/// callback must not write to the collection it watches.
pub struct Subscription {
    hub: Hub,
    collection: Collection,
    id: u64,
    slot: Arc<Mutex<Option<Delivery>>>,
}

impl Subscription {
    /// Register `deliver` for `collection` and run it once.
    ///
    /// The first delivery runs under the slot lock, so a publish racing with
    /// registration is delivered after it, never before.
    pub(crate) fn activate(hub: Hub, collection: Collection, deliver: Delivery) -> Self {
        let slot: Arc<Mutex<Option<Delivery>>> = Arc::new(Mutex::new(Some(deliver)));

        let id = {
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

            let listener_slot = slot.clone();
            let id = hub.register(
                collection,
                Arc::new(move || {
                    let mut guard = listener_slot.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some(deliver) = guard.as_mut() {
                        deliver();
                    }
                }),
            );

            if let Some(deliver) = guard.as_mut() {
                deliver();
            }
            id
        };

        Self {
            hub,
            collection,
            id,
            slot,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        self.hub.unregister(self.collection, self.id);
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
