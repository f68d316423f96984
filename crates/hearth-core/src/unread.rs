//! Unread message counting for the dashboard.
//!
//! Admins follow messages written by members; members follow messages
//! written by the admin. The count of relevant messages already seen is
//! kept in a [`KeyValueStore`] so it survives restarts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use hearth_db::KeyValueStore;
use hearth_types::Message;

/// How long a new-message notification stays up unless dismissed.
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

const ADMIN_MESSAGES_SEEN_KEY: &str = "lastReadAdminMessages";
const USER_MESSAGES_SEEN_KEY: &str = "lastReadUserMessages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    Admin,
    Member,
}

impl ViewerRole {
    pub fn from_is_admin(is_admin: bool) -> Self {
        if is_admin { Self::Admin } else { Self::Member }
    }

    fn is_relevant(self, message: &Message) -> bool {
        match self {
            Self::Admin => !message.is_from_admin,
            Self::Member => message.is_from_admin,
        }
    }

    fn storage_key(self) -> &'static str {
        match self {
            Self::Admin => USER_MESSAGES_SEEN_KEY,
            Self::Member => ADMIN_MESSAGES_SEEN_KEY,
        }
    }

    /// Tabs that show this viewer's relevant messages.
    fn reads_on(self, tab: Tab) -> bool {
        match (self, tab) {
            (_, Tab::Messages) => true,
            (Self::Admin, Tab::Admin) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Approvals,
    Rules,
    Messages,
    Admin,
}

pub struct UnreadTracker {
    role: ViewerRole,
    storage: Arc<dyn KeyValueStore>,
    tab: Tab,
    last_seen: usize,
    /// Relevant messages in the latest snapshot; `None` before the first.
    relevant: Option<usize>,
    unread: usize,
    notified_at: Option<Instant>,
}

impl UnreadTracker {
    pub fn new(role: ViewerRole, storage: Arc<dyn KeyValueStore>) -> Self {
        let last_seen = match storage.get_item(role.storage_key()) {
            Ok(Some(raw)) => raw.trim().parse::<usize>().unwrap_or_else(|e| {
                warn!("Ignoring unreadable last-seen count '{}': {}", raw, e);
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!("Could not read last-seen count: {}", e);
                0
            }
        };

        Self {
            role,
            storage,
            tab: Tab::default(),
            last_seen,
            relevant: None,
            unread: 0,
            notified_at: None,
        }
    }

    /// Take in a new message snapshot. Returns whether it raised a
    /// notification.
    pub fn observe(&mut self, messages: &[Message], now: Instant) -> bool {
        let relevant = messages.iter().filter(|m| self.role.is_relevant(m)).count();
        let first = self.relevant.is_none();
        self.relevant = Some(relevant);

        if self.role.reads_on(self.tab) {
            self.mark_seen();
            return false;
        }

        let unread = relevant.saturating_sub(self.last_seen);
        let increased = unread > self.unread;
        self.unread = unread;

        if increased && !first {
            debug!("{} unread messages", unread);
            self.notified_at = Some(now);
            return true;
        }
        false
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        if self.role.reads_on(tab) {
            self.mark_seen();
        }
    }

    pub fn dismiss(&mut self) {
        self.notified_at = None;
    }

    pub fn notification_visible(&self, now: Instant) -> bool {
        self.notified_at
            .is_some_and(|at| now.saturating_duration_since(at) < NOTIFICATION_TIMEOUT)
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn last_seen(&self) -> usize {
        self.last_seen
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    fn mark_seen(&mut self) {
        self.unread = 0;
        self.notified_at = None;

        let Some(relevant) = self.relevant else {
            return;
        };
        if relevant == self.last_seen {
            return;
        }
        self.last_seen = relevant;
        if let Err(e) = self
            .storage
            .set_item(self.role.storage_key(), &relevant.to_string())
        {
            warn!("Could not save last-seen count: {}", e);
        }
    }
}
