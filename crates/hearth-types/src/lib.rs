pub mod api;
pub mod events;
pub mod models;
pub mod time;

pub use models::{
    Approval, Collection, Message, MessagePatch, NewRule, Rule, RulePatch, SessionUser,
    SystemSettings, UserData, UserDataPatch,
};
pub use time::Timestamp;
