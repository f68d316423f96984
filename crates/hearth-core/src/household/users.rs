use tracing::{debug, warn};

use hearth_db::Document;
use hearth_types::{Collection, Timestamp, UserData, UserDataPatch};

use super::{Household, Result, list_decoded};

impl Household {
    // -- Users --

    /// Stored data for `username`; `None` when absent or unreadable.
    pub async fn user_data(&self, username: &str) -> Option<UserData> {
        let username = username.to_string();
        let result = self
            .read(move |store| {
                match store.get(Collection::Users, &username)? {
                    Some(doc) => Ok(Some(doc.decode::<UserData>()?)),
                    None => Ok(None),
                }
            })
            .await;

        result.unwrap_or_else(|e| {
            warn!("Could not read user data: {}", e);
            None
        })
    }

    pub async fn all_users(&self) -> Vec<UserData> {
        self.read(|store| Ok(list_decoded(store, Collection::Users)))
            .await
            .unwrap_or_default()
    }

    /// Apply `patch` to the user's data, creating it with defaults first if
    /// the user has none.
    pub async fn upsert_user_data(&self, username: &str, patch: UserDataPatch) -> Result<UserData> {
        let username = username.to_string();
        self.commit(Collection::Users, move |store| {
            let mut user = match store.get(Collection::Users, &username)? {
                Some(doc) => doc.decode::<UserData>().unwrap_or_else(|e| {
                    warn!("Replacing corrupt user data for {}: {}", username, e);
                    UserData::new(username.clone())
                }),
                None => UserData::new(username.clone()),
            };
            user.username = username.clone();
            user.apply(&patch);

            // Users are keyed by username.
            store.put(Collection::Users, Document::from_entity(&username, &user)?)?;
            debug!("User data for {} saved", username);
            Ok((user, true))
        })
        .await
    }

    /// Mark `username` as having agreed to the rules, now.
    pub async fn agree_to_rules(&self, username: &str) -> Result<UserData> {
        self.upsert_user_data(
            username,
            UserDataPatch {
                has_agreed_to_rules: Some(true),
                rules_agreed_at: Some(Timestamp::now()),
                is_admin: None,
            },
        )
        .await
    }
}
