use tracing::{info, warn};

use hearth_types::{SessionUser, UserData};

use crate::config::Config;
use crate::household::{Household, Result};
use crate::session::Session;

/// Login and rules agreement against a [`Household`].
#[derive(Clone)]
pub struct Auth {
    household: Household,
    config: Config,
}

impl Auth {
    pub fn new(household: Household, config: Config) -> Self {
        Self { household, config }
    }

    pub fn household(&self) -> &Household {
        &self.household
    }

    pub fn is_admin(&self, username: &str) -> bool {
        username == self.config.admin_username
    }

    /// Resolve a login attempt to the user it signs in, if any.
    ///
    /// Only allowed users may sign in, and only the admin needs a password.
    /// Unreadable settings fall back to the default allowed users.
    pub async fn authenticate(&self, username: &str, password: Option<&str>) -> Option<SessionUser> {
        let settings = self.household.system_settings().await;
        if !settings.is_allowed(username) {
            info!("Login refused for unlisted user {}", username);
            return None;
        }

        let is_admin = self.is_admin(username);
        if is_admin && password != Some(self.config.admin_password.as_str()) {
            warn!("Bad admin password for {}", username);
            return None;
        }

        let has_agreed_to_rules = self
            .household
            .user_data(username)
            .await
            .is_some_and(|user| user.has_agreed_to_rules);

        Some(SessionUser {
            username: username.to_string(),
            is_admin,
            has_agreed_to_rules,
        })
    }

    pub async fn login(&self, session: &mut Session, username: &str, password: Option<&str>) -> bool {
        match self.authenticate(username, password).await {
            Some(user) => {
                info!("{} logged in", user.username);
                session.set_user(user);
                true
            }
            None => false,
        }
    }

    /// Store the user's agreement and record their approval if they have
    /// none yet. Safe to repeat.
    pub async fn record_agreement(&self, username: &str, is_admin: bool) -> Result<UserData> {
        let user = self.household.agree_to_rules(username).await?;
        self.household.add_approval_once(username, is_admin).await?;
        Ok(user)
    }

    /// Agree to the rules as the session's user. Does nothing when signed
    /// out.
    pub async fn agree_to_rules(&self, session: &mut Session) -> Result<()> {
        let Some(user) = session.user().cloned() else {
            return Ok(());
        };
        self.record_agreement(&user.username, user.is_admin).await?;
        session.mark_agreed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::household::test_support::{durable, local};
    use crate::session::Stage;
    use hearth_db::MemoryKv;

    fn auth(household: Household) -> Auth {
        Auth::new(household, Config::default())
    }

    fn session() -> Session {
        Session::restore(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn test_login_cases() {
        let auth = auth(local());

        let mut s = session();
        assert!(!auth.login(&mut s, "Ahmed", Some("wrong")).await);
        assert!(!auth.login(&mut s, "Ahmed", None).await);
        assert!(!s.is_authenticated());

        assert!(!auth.login(&mut s, "Unlisted", None).await);
        assert!(!s.is_authenticated());

        assert!(auth.login(&mut s, "Ahmed", Some("clashof1")).await);
        assert!(s.user().unwrap().is_admin);

        let mut s = session();
        assert!(auth.login(&mut s, "User1", None).await);
        assert!(!s.user().unwrap().is_admin);
        assert_eq!(s.stage(), Stage::RulesAgreement);
    }

    #[tokio::test]
    async fn test_agreement_flow() {
        let house = durable();
        let auth = auth(house.clone());

        let mut s = session();
        assert!(auth.login(&mut s, "User2", None).await);
        auth.agree_to_rules(&mut s).await.unwrap();
        auth.agree_to_rules(&mut s).await.unwrap();
        assert_eq!(s.stage(), Stage::Dashboard);
        assert_eq!(house.approvals().await.len(), 1);

        // A later login remembers the agreement.
        let mut again = session();
        assert!(auth.login(&mut again, "User2", None).await);
        assert_eq!(again.stage(), Stage::Dashboard);
    }

    #[tokio::test]
    async fn test_removed_user_cannot_login() {
        let house = local();
        let auth = auth(house.clone());
        house.remove_allowed_user("User3").await.unwrap();

        let mut s = session();
        assert!(!auth.login(&mut s, "User3", None).await);
    }
}
