use hearth_types::models::DEFAULT_ALLOWED_USERS;

const DEFAULT_ADMIN_PASSWORD: &str = "clashof1";

/// Identity settings read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// The privileged user; the only one that must present a password.
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_username: DEFAULT_ALLOWED_USERS[0].to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            admin_username: std::env::var("HEARTH_ADMIN_USERNAME")
                .unwrap_or(defaults.admin_username),
            admin_password: std::env::var("HEARTH_ADMIN_PASSWORD")
                .unwrap_or(defaults.admin_password),
        }
    }

    pub fn uses_default_password(&self) -> bool {
        self.admin_password == DEFAULT_ADMIN_PASSWORD
    }
}
