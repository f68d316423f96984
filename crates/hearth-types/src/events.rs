use serde::{Deserialize, Serialize};

use crate::models::{Approval, Collection, Message, Rule, SystemSettings};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { username: String, is_admin: bool },

    /// Full rule list, ascending by order
    RulesSnapshot { rules: Vec<Rule> },

    /// Full message list, newest first
    MessagesSnapshot { messages: Vec<Message> },

    /// Full approval list, newest first
    ApprovalsSnapshot { approvals: Vec<Approval> },

    /// Current system settings
    SettingsSnapshot { settings: SystemSettings },
}

impl GatewayEvent {
    /// Returns the collection a snapshot event carries.
    /// Events that return `None` are always delivered.
    pub fn collection(&self) -> Option<Collection> {
        match self {
            Self::RulesSnapshot { .. } => Some(Collection::Rules),
            Self::MessagesSnapshot { .. } => Some(Collection::Messages),
            Self::ApprovalsSnapshot { .. } => Some(Collection::Approvals),
            Self::SettingsSnapshot { .. } => Some(Collection::Settings),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Restrict pushed snapshots to these collections.
    /// An empty list restores the default of every collection.
    Subscribe { collections: Vec<Collection> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd: GatewayCommand = serde_json::from_str(
            r#"{"type":"Subscribe","data":{"collections":["rules","messages"]}}"#,
        )
        .unwrap();
        match cmd {
            GatewayCommand::Subscribe { collections } => {
                assert_eq!(collections, vec![Collection::Rules, Collection::Messages]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_event_collection_scope() {
        let ready = GatewayEvent::Ready { username: "User1".into(), is_admin: false };
        assert_eq!(ready.collection(), None);
        assert_eq!(serde_json::to_value(&ready).unwrap()["data"]["isAdmin"], false);

        let settings = GatewayEvent::SettingsSnapshot { settings: SystemSettings::default() };
        assert_eq!(settings.collection(), Some(Collection::Settings));
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["type"], "SettingsSnapshot");
        assert_eq!(json["data"]["settings"]["maxUsers"], 5);
    }
}
