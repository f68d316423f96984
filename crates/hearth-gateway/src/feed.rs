//! Per-connection snapshot feed.
//!
//! A [`Feed`] holds one subscription per pushed collection. Each collection
//! keeps only its newest undelivered snapshot, so a slow client holds at most
//! one pending snapshot per collection. Dropping the feed ends the
//! subscriptions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::Notify;
use tracing::debug;

use hearth_core::household::Result;
use hearth_core::{Household, Subscription};
use hearth_types::Collection;
use hearth_types::events::GatewayEvent;

/// Collections with a snapshot event.
pub const PUSHED: [Collection; 4] = [
    Collection::Rules,
    Collection::Messages,
    Collection::Approvals,
    Collection::Settings,
];

#[derive(Default)]
struct Pending {
    latest: Mutex<HashMap<Collection, GatewayEvent>>,
    ready: Notify,
}

/// Queues snapshots into a [`Feed`], replacing any undelivered snapshot of
/// the same collection.
#[derive(Clone, Default)]
pub struct FeedSender {
    pending: Arc<Pending>,
}

impl FeedSender {
    pub fn send(&self, event: GatewayEvent) {
        let Some(collection) = event.collection() else {
            debug!("Ignoring non-snapshot event on feed");
            return;
        };
        self.pending
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection, event);
        self.pending.ready.notify_one();
    }

    fn take_next(&self) -> Option<GatewayEvent> {
        let mut latest = self
            .pending
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        PUSHED.iter().find_map(|collection| latest.remove(collection))
    }
}

pub struct Feed {
    sender: FeedSender,
    _subscriptions: Vec<Subscription>,
}

impl Feed {
    /// Subscribe to every pushed collection. The current snapshot of each is
    /// queued before this returns.
    pub async fn open(household: &Household) -> Result<Self> {
        let sender = FeedSender::default();

        let sink = sender.clone();
        let rules = household
            .subscribe_rules(move |rules| sink.send(GatewayEvent::RulesSnapshot { rules }))
            .await?;

        let sink = sender.clone();
        let messages = household
            .subscribe_messages(move |messages| {
                sink.send(GatewayEvent::MessagesSnapshot { messages })
            })
            .await?;

        let sink = sender.clone();
        let approvals = household
            .subscribe_approvals(move |approvals| {
                sink.send(GatewayEvent::ApprovalsSnapshot { approvals })
            })
            .await?;

        let sink = sender.clone();
        let settings = household
            .subscribe_system_settings(move |settings| {
                sink.send(GatewayEvent::SettingsSnapshot { settings })
            })
            .await?;

        Ok(Self {
            sender,
            _subscriptions: vec![rules, messages, approvals, settings],
        })
    }

    /// The next pending snapshot, in [`PUSHED`] order across collections.
    pub async fn recv(&mut self) -> GatewayEvent {
        loop {
            if let Some(event) = self.sender.take_next() {
                return event;
            }
            self.sender.pending.ready.notified().await;
        }
    }

    /// A sender into this feed, for out-of-band snapshots.
    pub fn sender(&self) -> FeedSender {
        self.sender.clone()
    }
}

/// The current snapshot event for `collection`, if it has one.
pub async fn snapshot(household: &Household, collection: Collection) -> Option<GatewayEvent> {
    let event = match collection {
        Collection::Rules => GatewayEvent::RulesSnapshot {
            rules: household.rules().await,
        },
        Collection::Messages => GatewayEvent::MessagesSnapshot {
            messages: household.messages().await,
        },
        Collection::Approvals => GatewayEvent::ApprovalsSnapshot {
            approvals: household.approvals().await,
        },
        Collection::Settings => GatewayEvent::SettingsSnapshot {
            settings: household.system_settings().await,
        },
        Collection::Users => return None,
    };
    Some(event)
}

/// Which collections a connection wants pushed. Starts with all of them.
pub struct CollectionFilter {
    wanted: RwLock<HashSet<Collection>>,
}

impl Default for CollectionFilter {
    fn default() -> Self {
        Self {
            wanted: RwLock::new(PUSHED.into_iter().collect()),
        }
    }
}

impl CollectionFilter {
    pub fn allows(&self, event: &GatewayEvent) -> bool {
        match event.collection() {
            Some(collection) => self
                .wanted
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&collection),
            None => true,
        }
    }

    /// Replace the wanted set; empty means all. Returns the collections that
    /// were not wanted before.
    pub fn replace(&self, collections: Vec<Collection>) -> Vec<Collection> {
        let next: HashSet<Collection> = if collections.is_empty() {
            PUSHED.into_iter().collect()
        } else {
            collections.into_iter().filter(|c| PUSHED.contains(c)).collect()
        };

        let mut wanted = self.wanted.write().unwrap_or_else(PoisonError::into_inner);
        let added = next.difference(&wanted).copied().collect();
        debug!("Pushing {} collections", next.len());
        *wanted = next;
        added
    }
}
