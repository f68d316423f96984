pub mod auth;
pub mod config;
pub mod defaults;
pub mod error;
pub mod format;
pub mod household;
pub mod hub;
pub mod session;
pub mod unread;

pub use auth::Auth;
pub use config::Config;
pub use error::{Declined, HouseError};
pub use format::{FormattedRule, format_rule};
pub use household::Household;
pub use hub::{Hub, Subscription};
pub use session::{Session, Stage};
pub use unread::{Tab, UnreadTracker, ViewerRole};
