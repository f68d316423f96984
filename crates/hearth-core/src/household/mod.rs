//! Typed data access over a [`DocumentStore`].
//!
//! Every operation runs the blocking store work on the blocking pool. Writes
//! run one at a time, so a check and the write it guards see the same state.
//! Each write publishes a change for its collection on the [`Hub`] before
//! returning, so any subscriber has seen the write by the time the caller
//! resumes.

mod approvals;
mod messages;
mod rules;
mod settings;
mod users;

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tracing::{error, warn};

use hearth_db::{DocumentStore, StoreMode};
use hearth_types::Collection;
use hearth_types::models::DEFAULT_ALLOWED_USERS;

use crate::error::HouseError;
use crate::hub::{Delivery, Hub, Subscription};

pub type Result<T> = std::result::Result<T, HouseError>;

#[derive(Clone)]
pub struct Household {
    inner: Arc<HouseholdInner>,
}

struct HouseholdInner {
    store: Arc<dyn DocumentStore>,
    hub: Hub,
    /// Held for the whole read-check-write of every commit.
    write_lock: Mutex<()>,
    /// The privileged identity; never removable from the allowed users.
    admin_username: String,
}

impl Household {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_admin(store, DEFAULT_ALLOWED_USERS[0])
    }

    pub fn with_admin(store: Arc<dyn DocumentStore>, admin_username: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HouseholdInner {
                store,
                hub: Hub::new(),
                write_lock: Mutex::new(()),
                admin_username: admin_username.into(),
            }),
        }
    }

    pub fn mode(&self) -> StoreMode {
        self.inner.store.mode()
    }

    pub fn hub(&self) -> &Hub {
        &self.inner.hub
    }

    pub fn admin_username(&self) -> &str {
        &self.inner.admin_username
    }

    /// Run blocking store work off the async runtime.
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn DocumentStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(join_error)?
    }

    /// Run a write and publish a change for `collection` when `f` reports
    /// that something changed.
    async fn commit<F, T>(&self, collection: Collection, f: F) -> Result<T>
    where
        F: FnOnce(&dyn DocumentStore) -> Result<(T, bool)> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let (value, changed) = {
                let _guard = inner
                    .write_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                f(inner.store.as_ref())?
            };
            // Listeners re-read, so publishing outside the lock loses nothing.
            if changed {
                inner.hub.publish(collection);
            }
            Ok(value)
        })
        .await
        .map_err(join_error)?
    }

    /// Register `callback` for `collection`: it receives `snapshot()` now and
    /// after every committed write to the collection.
    async fn subscribe_with<T, S, F>(
        &self,
        collection: Collection,
        snapshot: S,
        mut callback: F,
    ) -> Result<Subscription>
    where
        S: Fn(&dyn DocumentStore) -> T + Send + 'static,
        F: FnMut(T) + Send + 'static,
        T: 'static,
    {
        let store = self.inner.store.clone();
        let hub = self.inner.hub.clone();
        tokio::task::spawn_blocking(move || {
            let deliver: Delivery = Box::new(move || callback(snapshot(store.as_ref())));
            Subscription::activate(hub, collection, deliver)
        })
        .await
        .map_err(join_error)
    }
}

fn join_error(e: tokio::task::JoinError) -> HouseError {
    error!("spawn_blocking join error: {}", e);
    HouseError::Task(e.to_string())
}

/// Read and decode a whole collection. Read failures degrade to an empty
/// list and undecodable documents are skipped; both are logged.
fn list_decoded<T: DeserializeOwned>(store: &dyn DocumentStore, collection: Collection) -> Vec<T> {
    let docs = match store.list(collection) {
        Ok(docs) => docs,
        Err(e) => {
            warn!("Failed to read {}, using empty snapshot: {}", collection, e);
            return vec![];
        }
    };

    docs.into_iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!("Corrupt {} document '{}': {}", collection, doc.id, e);
                None
            }
        })
        .collect()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn require_text(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::error::Declined::EmptyField(field).into());
    }
    Ok(())
}
