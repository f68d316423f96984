pub mod approvals;
pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod rules;
pub mod settings;

pub use auth::{AppState, AppStateInner};
