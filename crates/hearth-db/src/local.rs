use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use hearth_types::Collection;

use crate::{
    Document, DocumentStore, KeyValueStore, Result, StoreError, StoreMode, merge_fields,
};

const FILE_EXTENSION: &str = "json";

/// Storage key holding the JSON array for a collection.
pub fn collection_key(collection: Collection) -> &'static str {
    match collection {
        Collection::Rules => "approval_system_rules",
        Collection::Messages => "approval_system_messages",
        Collection::Users => "approval_system_users",
        Collection::Approvals => "approval_system_approvals",
        Collection::Settings => "approval_system_settings",
    }
}

/// Single-device fallback store.
///
/// Emulates browser local storage: a flat map of string keys to string
/// values, each collection serialized as one JSON array under its own key.
/// With a directory, every key is mirrored to `<dir>/<key>.json` and loaded
/// back on open.
pub struct LocalStore {
    dir: Option<PathBuf>,
    items: Mutex<HashMap<String, String>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            items: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut items = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(value) => {
                    items.insert(key.to_string(), value);
                }
                Err(e) => warn!("Skipping unreadable local item {}: {}", path.display(), e),
            }
        }

        info!("Local store opened at {} ({} keys)", dir.display(), items.len());
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            items: Mutex::new(items),
        })
    }

    fn items(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_item(&self, items: &mut HashMap<String, String>, key: &str, value: String) -> Result<()> {
        if let Some(dir) = &self.dir {
            fs::write(item_path(dir, key), &value)?;
        }
        items.insert(key.to_string(), value);
        Ok(())
    }

    /// Read a collection. Anything that does not parse as an array of
    /// objects reads as an empty collection.
    fn read_collection(items: &HashMap<String, String>, collection: Collection) -> Vec<Value> {
        let Some(raw) = items.get(collection_key(collection)) else {
            return vec![];
        };
        match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(docs) => docs.into_iter().filter(Value::is_object).collect(),
            Err(e) => {
                warn!("Unparseable local collection {}, treating as empty: {}", collection, e);
                vec![]
            }
        }
    }

    fn write_collection(
        &self,
        items: &mut HashMap<String, String>,
        collection: Collection,
        docs: &[Value],
    ) -> Result<()> {
        let raw = serde_json::to_string(docs)?;
        self.write_item(items, collection_key(collection), raw)
    }
}

fn item_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{}", key, FILE_EXTENSION))
}

fn doc_id(body: &Value) -> Option<&str> {
    body.get("id").and_then(Value::as_str)
}

impl DocumentStore for LocalStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Local
    }

    fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        let items = self.items()?;
        Ok(Self::read_collection(&items, collection)
            .into_iter()
            .filter_map(|body| {
                let id = doc_id(&body)?.to_string();
                Some(Document::new(id, body))
            })
            .collect())
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let items = self.items()?;
        Ok(Self::read_collection(&items, collection)
            .into_iter()
            .find(|body| doc_id(body) == Some(id))
            .map(|body| Document::new(id, body)))
    }

    fn put(&self, collection: Collection, doc: Document) -> Result<()> {
        let mut items = self.items()?;
        let mut docs = Self::read_collection(&items, collection);
        match docs.iter_mut().find(|body| doc_id(body) == Some(doc.id.as_str())) {
            Some(existing) => *existing = doc.body,
            None => docs.push(doc.body),
        }
        self.write_collection(&mut items, collection, &docs)
    }

    fn update(&self, collection: Collection, id: &str, fields: Map<String, Value>) -> Result<bool> {
        let mut items = self.items()?;
        let mut docs = Self::read_collection(&items, collection);
        let Some(existing) = docs.iter_mut().find(|body| doc_id(body) == Some(id)) else {
            debug!("Ignoring update of missing {} document '{}'", collection, id);
            return Ok(false);
        };
        merge_fields(existing, fields);
        self.write_collection(&mut items, collection, &docs)?;
        Ok(true)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let mut items = self.items()?;
        let mut docs = Self::read_collection(&items, collection);
        let before = docs.len();
        docs.retain(|body| doc_id(body) != Some(id));
        if docs.len() == before {
            return Ok(false);
        }
        self.write_collection(&mut items, collection, &docs)?;
        Ok(true)
    }
}

impl KeyValueStore for LocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items()?;
        self.write_item(&mut items, key, value.to_string())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items()?;
        if items.remove(key).is_some() {
            if let Some(dir) = &self.dir {
                let path = item_path(dir, key);
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_missing_is_silent() {
        let store = LocalStore::in_memory();
        let mut fields = Map::new();
        fields.insert("isRead".into(), json!(true));
        assert!(!store.update(Collection::Messages, "ghost", fields).unwrap());
        assert!(store.list(Collection::Messages).unwrap().is_empty());
    }

    #[test]
    fn test_collections_live_under_their_keys() {
        let store = LocalStore::in_memory();
        store
            .put(Collection::Rules, Document::new("r1", json!({ "content": "a" })))
            .unwrap();

        let raw = store.get_item("approval_system_rules").unwrap().unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec![json!({ "content": "a", "id": "r1" })]);
    }

    #[test]
    fn test_unparseable_collection_reads_empty() {
        let store = LocalStore::in_memory();
        store.set_item("approval_system_messages", "not json").unwrap();
        assert!(store.list(Collection::Messages).unwrap().is_empty());
        assert!(store.get(Collection::Messages, "x").unwrap().is_none());

        // A write replaces the broken value with a valid collection.
        store
            .put(Collection::Messages, Document::new("m1", json!({ "content": "hi" })))
            .unwrap();
        assert_eq!(store.list(Collection::Messages).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = LocalStore::in_memory();
        store
            .put(Collection::Approvals, Document::new("a1", json!({ "username": "User1" })))
            .unwrap();
        assert!(store.delete(Collection::Approvals, "a1").unwrap());
        assert!(!store.delete(Collection::Approvals, "a1").unwrap());
    }

    #[test]
    fn test_directory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store
                .put(Collection::Rules, Document::new("r1", json!({ "content": "a" })))
                .unwrap();
            store.set_item("lastReadUserMessages", "3").unwrap();
            store.set_item("scratch", "x").unwrap();
            store.remove_item("scratch").unwrap();
        }

        let store = LocalStore::open(dir.path()).unwrap();
        assert_eq!(store.list(Collection::Rules).unwrap().len(), 1);
        assert_eq!(store.get_item("lastReadUserMessages").unwrap().as_deref(), Some("3"));
        assert_eq!(store.get_item("scratch").unwrap(), None);
        assert!(!dir.path().join("scratch.json").exists());
    }
}
