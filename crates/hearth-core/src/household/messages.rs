use serde_json::{Map, Value};
use tracing::debug;

use hearth_db::{Document, DocumentStore};
use hearth_types::{Collection, Message, MessagePatch, Timestamp};

use super::{Household, Result, list_decoded, new_id, require_text};
use crate::hub::Subscription;

/// Messages newest first.
fn messages_snapshot(store: &dyn DocumentStore) -> Vec<Message> {
    let mut messages: Vec<Message> = list_decoded(store, Collection::Messages);
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    messages
}

impl Household {
    // -- Messages --

    pub async fn messages(&self) -> Vec<Message> {
        self.read(|store| Ok(messages_snapshot(store)))
            .await
            .unwrap_or_default()
    }

    pub async fn send_message(
        &self,
        from: &str,
        content: &str,
        is_from_admin: bool,
    ) -> Result<Message> {
        require_text(content, "message")?;

        let message = Message {
            id: new_id(),
            from: from.to_string(),
            content: content.to_string(),
            created_at: Timestamp::now(),
            is_from_admin,
            is_read: None,
        };
        let doc = Document::from_entity(&message.id, &message)?;

        self.commit(Collection::Messages, move |store| {
            store.put(Collection::Messages, doc)?;
            Ok(((), true))
        })
        .await?;

        debug!("Message {} sent by {}", message.id, message.from);
        Ok(message)
    }

    pub async fn update_message(&self, id: &str, patch: MessagePatch) -> Result<()> {
        let fields: Map<String, Value> = match serde_json::to_value(&patch)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if fields.is_empty() {
            return Ok(());
        }

        let id = id.to_string();
        self.commit(Collection::Messages, move |store| {
            let changed = store.update(Collection::Messages, &id, fields)?;
            Ok(((), changed))
        })
        .await
    }

    pub async fn mark_message_read(&self, id: &str) -> Result<()> {
        self.update_message(id, MessagePatch { is_read: Some(true) })
            .await
    }

    pub async fn delete_message(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.commit(Collection::Messages, move |store| {
            let removed = store.delete(Collection::Messages, &id)?;
            Ok(((), removed))
        })
        .await
    }

    pub async fn subscribe_messages<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnMut(Vec<Message>) + Send + 'static,
    {
        self.subscribe_with(Collection::Messages, messages_snapshot, callback)
            .await
    }
}
