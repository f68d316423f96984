//! The signed-in user of one device.
//!
//! A [`Session`] is restored from its [`KeyValueStore`] on construction and
//! writes itself back on every change, so a restart lands on the same
//! screen.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use hearth_db::KeyValueStore;
use hearth_types::SessionUser;

pub const SESSION_KEY: &str = "auth-storage";

/// Which screen a session gates the viewer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Login,
    RulesAgreement,
    Dashboard,
}

#[derive(Serialize, Deserialize)]
struct Persisted {
    user: Option<SessionUser>,
}

pub struct Session {
    user: Option<SessionUser>,
    storage: Arc<dyn KeyValueStore>,
}

impl Session {
    /// Restore the session saved in `storage`, or start signed out. An
    /// unreadable entry counts as signed out.
    pub fn restore(storage: Arc<dyn KeyValueStore>) -> Self {
        let user = match storage.get_item(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Persisted>(&raw) {
                Ok(persisted) => persisted.user,
                Err(e) => {
                    warn!("Discarding unreadable session: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read session: {}", e);
                None
            }
        };

        Self { user, storage }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn stage(&self) -> Stage {
        match &self.user {
            None => Stage::Login,
            Some(user) if !user.has_agreed_to_rules => Stage::RulesAgreement,
            Some(_) => Stage::Dashboard,
        }
    }

    pub fn set_user(&mut self, user: SessionUser) {
        self.user = Some(user);
        self.persist();
    }

    pub fn mark_agreed(&mut self) {
        if let Some(user) = self.user.as_mut() {
            user.has_agreed_to_rules = true;
            self.persist();
        }
    }

    pub fn logout(&mut self) {
        self.user = None;
        if let Err(e) = self.storage.remove_item(SESSION_KEY) {
            warn!("Could not clear session: {}", e);
        }
    }

    fn persist(&self) {
        let persisted = Persisted {
            user: self.user.clone(),
        };
        let result = serde_json::to_string(&persisted)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                self.storage
                    .set_item(SESSION_KEY, &raw)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!("Could not save session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_db::MemoryKv;

    fn member(agreed: bool) -> SessionUser {
        SessionUser {
            username: "User1".into(),
            is_admin: false,
            has_agreed_to_rules: agreed,
        }
    }

    #[test]
    fn test_stages() {
        let mut session = Session::restore(Arc::new(MemoryKv::new()));
        assert_eq!(session.stage(), Stage::Login);

        session.set_user(member(false));
        assert_eq!(session.stage(), Stage::RulesAgreement);

        session.mark_agreed();
        assert_eq!(session.stage(), Stage::Dashboard);
    }

    #[test]
    fn test_survives_restore() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
        let mut session = Session::restore(storage.clone());
        session.set_user(member(true));

        let restored = Session::restore(storage.clone());
        assert_eq!(restored.user(), Some(&member(true)));

        let mut restored = restored;
        restored.logout();
        assert!(!Session::restore(storage).is_authenticated());
    }

    #[test]
    fn test_corrupt_entry_signs_out() {
        let storage = Arc::new(MemoryKv::new());
        storage.set_item(SESSION_KEY, "{not json").unwrap();
        assert_eq!(Session::restore(storage).stage(), Stage::Login);
    }
}
