pub mod error;
pub mod kv;
pub mod local;
pub mod migrations;
pub mod sqlite;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use hearth_types::Collection;

pub use error::StoreError;
pub use kv::{KeyValueStore, MemoryKv};
pub use local::LocalStore;
pub use sqlite::SqliteStore;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Which persistence semantics a store follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Shared database. Updates to missing documents are errors.
    Durable,
    /// Single-device key/value emulation. Updates to missing documents are
    /// silent no-ops and unreadable collections read as empty.
    Local,
}

/// A JSON document with its id. The body always carries the id as well, so
/// it deserializes straight into an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        let id = id.into();
        let mut body = match body {
            Value::Object(map) => Value::Object(map),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                Value::Object(map)
            }
        };
        if let Value::Object(map) = &mut body {
            map.insert("id".into(), Value::String(id.clone()));
        }
        Self { id, body }
    }

    pub fn from_entity<T: Serialize>(id: impl Into<String>, entity: &T) -> Result<Self> {
        Ok(Self::new(id, serde_json::to_value(entity)?))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.body.clone())
    }
}

/// Merge `fields` over the top-level keys of `body`.
pub fn merge_fields(body: &mut Value, fields: Map<String, Value>) {
    if let Value::Object(map) = body {
        for (key, value) in fields {
            if key != "id" {
                map.insert(key, value);
            }
        }
    }
}

/// Uniform blocking access to document collections.
///
/// Implementations must make every write atomic with respect to other calls
/// on the same store. Callers on an async runtime run these on the blocking
/// pool.
pub trait DocumentStore: Send + Sync {
    fn mode(&self) -> StoreMode;

    fn list(&self, collection: Collection) -> Result<Vec<Document>>;

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Insert or replace a whole document.
    fn put(&self, collection: Collection, doc: Document) -> Result<()>;

    /// Merge `fields` into an existing document. Returns whether a document
    /// was changed; what happens for a missing id depends on the mode.
    fn update(&self, collection: Collection, id: &str, fields: Map<String, Value>) -> Result<bool>;

    /// Remove a document. Returns whether it existed; never fails for a
    /// missing id.
    fn delete(&self, collection: Collection, id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_body_carries_id() {
        let doc = Document::new("abc", json!({ "content": "x", "id": "stale" }));
        assert_eq!(doc.body["id"], "abc");
        assert_eq!(doc.body["content"], "x");
    }

    #[test]
    fn test_merge_keeps_id() {
        let mut body = json!({ "id": "a", "content": "old", "order": 1 });
        let mut fields = Map::new();
        fields.insert("content".into(), json!("new"));
        fields.insert("id".into(), json!("b"));
        merge_fields(&mut body, fields);
        assert_eq!(body, json!({ "id": "a", "content": "new", "order": 1 }));
    }
}
