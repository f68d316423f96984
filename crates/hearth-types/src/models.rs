use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Named groups of same-shaped documents in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Rules,
    Messages,
    Approvals,
    Users,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Rules,
        Collection::Messages,
        Collection::Approvals,
        Collection::Users,
        Collection::Settings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::Messages => "messages",
            Self::Approvals => "approvals",
            Self::Users => "users",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -- Rules --

/// Titles shown for rules that have none, indexed by display rank.
pub const DEFAULT_RULE_TITLES: [&str; 7] = [
    "1. الضوضاء و أوقات الهدوء",
    "2. الضيوف",
    "3. المطبخ",
    "4. الثلاجة",
    "5. الحمام و المرحاض",
    "6. التنظيف و المنتجات المشتركة",
    "7. الخصوصية و الاحترام",
];

/// Positional fallback title for the rule at 1-based `rank`.
pub fn default_rule_title(rank: usize) -> String {
    rank.checked_sub(1)
        .and_then(|i| DEFAULT_RULE_TITLES.get(i))
        .map(|t| t.to_string())
        .unwrap_or_else(|| format!("Rule {}", rank))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub content: String,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub is_new: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Rule {
    /// Title to display for this rule at 1-based `rank` among the loaded rules.
    pub fn display_title(&self, rank: usize) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => default_rule_title(rank),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub content: String,
    pub order: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_new: bool,
}

/// Fields of a rule an update may change. `None` leaves a field untouched;
/// `title: Some(None)` clears the title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub title: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub from: String,
    pub content: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub is_from_admin: bool,
    /// Written by `mark_message_read`, never used for filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
}

// -- Approvals --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: String,
    pub username: String,
    pub approved_at: Timestamp,
    #[serde(default)]
    pub is_admin: bool,
}

// -- Users --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub username: String,
    #[serde(default)]
    pub has_agreed_to_rules: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_agreed_at: Option<Timestamp>,
    #[serde(default)]
    pub is_admin: bool,
}

impl UserData {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            has_agreed_to_rules: false,
            rules_agreed_at: None,
            is_admin: false,
        }
    }

    pub fn apply(&mut self, patch: &UserDataPatch) {
        if let Some(agreed) = patch.has_agreed_to_rules {
            self.has_agreed_to_rules = agreed;
        }
        if let Some(at) = patch.rules_agreed_at {
            self.rules_agreed_at = Some(at);
        }
        if let Some(is_admin) = patch.is_admin {
            self.is_admin = is_admin;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_agreed_to_rules: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_agreed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

// -- Settings --

pub const DEFAULT_MAX_USERS: usize = 5;
pub const DEFAULT_ALLOWED_USERS: [&str; 5] = ["Ahmed", "User1", "User2", "User3", "User4"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    pub max_users: usize,
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            max_users: DEFAULT_MAX_USERS,
            allowed_users: DEFAULT_ALLOWED_USERS.iter().map(|u| u.to_string()).collect(),
        }
    }
}

impl SystemSettings {
    pub fn is_allowed(&self, username: &str) -> bool {
        self.allowed_users.iter().any(|u| u == username)
    }
}

// -- Session --

/// The logged-in user as the session sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub username: String,
    pub is_admin: bool,
    pub has_agreed_to_rules: bool,
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(
        value: &Option<Option<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<T>>, D::Error> {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
