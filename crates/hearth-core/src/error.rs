use std::fmt;

use hearth_db::StoreError;

/// Reasons an operation is turned down before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declined {
    EmptyField(&'static str),
    UsernameTaken(String),
    CapacityReached { max_users: usize },
    CapacityBelowUserCount { requested: usize, current: usize },
    InvalidCapacity,
    AdminNotRemovable(String),
}

impl fmt::Display for Declined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{} must not be empty", field),
            Self::UsernameTaken(name) => write!(f, "username '{}' is already in the list", name),
            Self::CapacityReached { max_users } => {
                write!(f, "maximum number of users ({}) reached", max_users)
            }
            Self::CapacityBelowUserCount { requested, current } => write!(
                f,
                "cannot set maximum users to {} while {} users are allowed",
                requested, current
            ),
            Self::InvalidCapacity => f.write_str("maximum users must be at least 1"),
            Self::AdminNotRemovable(name) => write!(f, "admin user '{}' cannot be removed", name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HouseError {
    #[error("declined: {0}")]
    Declined(Declined),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<Declined> for HouseError {
    fn from(reason: Declined) -> Self {
        Self::Declined(reason)
    }
}

impl HouseError {
    pub fn declined(&self) -> Option<&Declined> {
        match self {
            Self::Declined(reason) => Some(reason),
            _ => None,
        }
    }
}
