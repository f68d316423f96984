use tracing::{info, warn};

use hearth_db::{Document, DocumentStore};
use hearth_types::{Collection, SystemSettings};

use super::{Household, Result};
use crate::error::Declined;
use crate::hub::Subscription;

const SETTINGS_ID: &str = "system";

/// Current settings, or the defaults when none are stored or they cannot be
/// read.
fn settings_snapshot(store: &dyn DocumentStore) -> SystemSettings {
    match read_settings(store) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Failed to read system settings, using defaults: {}", e);
            SystemSettings::default()
        }
    }
}

/// Strict read used on write paths.
fn read_settings(store: &dyn DocumentStore) -> Result<SystemSettings> {
    match store.get(Collection::Settings, SETTINGS_ID)? {
        Some(doc) => Ok(doc.decode()?),
        None => Ok(SystemSettings::default()),
    }
}

fn write_settings(store: &dyn DocumentStore, settings: &SystemSettings) -> Result<()> {
    store.put(Collection::Settings, Document::from_entity(SETTINGS_ID, settings)?)?;
    Ok(())
}

impl Household {
    // -- Settings --

    pub async fn system_settings(&self) -> SystemSettings {
        self.read(|store| Ok(settings_snapshot(store)))
            .await
            .unwrap_or_default()
    }

    /// Replace the settings document. The capacity must be at least 1 and
    /// hold every allowed user, and the admin must stay allowed.
    pub async fn update_system_settings(&self, settings: SystemSettings) -> Result<()> {
        if settings.max_users == 0 {
            return Err(Declined::InvalidCapacity.into());
        }
        if settings.allowed_users.len() > settings.max_users {
            return Err(Declined::CapacityBelowUserCount {
                requested: settings.max_users,
                current: settings.allowed_users.len(),
            }
            .into());
        }
        if !settings.is_allowed(self.admin_username()) {
            return Err(Declined::AdminNotRemovable(self.admin_username().to_string()).into());
        }

        self.commit(Collection::Settings, move |store| {
            write_settings(store, &settings)?;
            Ok(((), true))
        })
        .await
    }

    pub async fn subscribe_system_settings<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnMut(SystemSettings) + Send + 'static,
    {
        self.subscribe_with(Collection::Settings, settings_snapshot, callback)
            .await
    }

    // -- User management --

    pub async fn add_allowed_user(&self, username: &str) -> Result<SystemSettings> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(Declined::EmptyField("username").into());
        }

        let settings = self
            .commit(Collection::Settings, move |store| {
                let mut settings = read_settings(store)?;
                if settings.is_allowed(&username) {
                    return Err(Declined::UsernameTaken(username).into());
                }
                if settings.allowed_users.len() >= settings.max_users {
                    return Err(Declined::CapacityReached {
                        max_users: settings.max_users,
                    }
                    .into());
                }
                settings.allowed_users.push(username);
                write_settings(store, &settings)?;
                Ok((settings, true))
            })
            .await?;

        info!("Allowed users now {:?}", settings.allowed_users);
        Ok(settings)
    }

    /// Remove `username` from the allowed users. Removing a name that is not
    /// listed changes nothing.
    pub async fn remove_allowed_user(&self, username: &str) -> Result<SystemSettings> {
        if username == self.admin_username() {
            return Err(Declined::AdminNotRemovable(username.to_string()).into());
        }

        let username = username.to_string();
        self.commit(Collection::Settings, move |store| {
            let mut settings = read_settings(store)?;
            let before = settings.allowed_users.len();
            settings.allowed_users.retain(|u| *u != username);
            if settings.allowed_users.len() == before {
                return Ok((settings, false));
            }
            write_settings(store, &settings)?;
            info!("Removed {} from allowed users", username);
            Ok((settings, true))
        })
        .await
    }

    pub async fn set_max_users(&self, max_users: usize) -> Result<SystemSettings> {
        if max_users == 0 {
            return Err(Declined::InvalidCapacity.into());
        }

        self.commit(Collection::Settings, move |store| {
            let mut settings = read_settings(store)?;
            let current = settings.allowed_users.len();
            if max_users < current {
                return Err(Declined::CapacityBelowUserCount {
                    requested: max_users,
                    current,
                }
                .into());
            }
            settings.max_users = max_users;
            write_settings(store, &settings)?;
            info!("Maximum users set to {}", max_users);
            Ok((settings, true))
        })
        .await
    }
}
