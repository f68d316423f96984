use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{info, warn};

use hearth_types::Collection;

use crate::{Document, DocumentStore, Result, StoreError, StoreMode, merge_fields, migrations};

/// Durable document store backed by a single SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&mut conn)
    }
}

impl DocumentStore for SqliteStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Durable
    }

    fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        self.with_conn(|conn| query_documents(conn, collection))
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| query_document(conn, collection, id))
    }

    fn put(&self, collection: Collection, doc: Document) -> Result<()> {
        let body = serde_json::to_string(&doc.body)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id)
                 DO UPDATE SET body = excluded.body, updated_at = datetime('now')",
                (collection.name(), &doc.id, &body),
            )?;
            Ok(())
        })
    }

    fn update(&self, collection: Collection, id: &str, fields: Map<String, Value>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut doc = query_document(&tx, collection, id)?
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            merge_fields(&mut doc.body, fields);

            tx.execute(
                "UPDATE documents SET body = ?3, updated_at = datetime('now')
                 WHERE collection = ?1 AND id = ?2",
                (collection.name(), id, serde_json::to_string(&doc.body)?),
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                (collection.name(), id),
            )?;
            Ok(removed > 0)
        })
    }
}

fn query_documents(conn: &Connection, collection: Collection) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT id, body FROM documents
         WHERE collection = ?1
         ORDER BY created_at, rowid",
    )?;

    let rows = stmt
        .query_map([collection.name()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let docs = rows
        .into_iter()
        .filter_map(|(id, body)| match serde_json::from_str::<Value>(&body) {
            Ok(body) => Some(Document::new(id, body)),
            Err(e) => {
                warn!("Corrupt body on {} document '{}': {}", collection, id, e);
                None
            }
        })
        .collect();

    Ok(docs)
}

fn query_document(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Document>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            (collection.name(), id),
            |row| row.get(0),
        )
        .optional()?;

    match body {
        Some(body) => Ok(Some(Document::new(id, serde_json::from_str(&body)?))),
        None => Ok(None),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_settings_seeded() {
        let store = store();
        let doc = store.get(Collection::Settings, "system").unwrap().unwrap();
        assert_eq!(doc.body["maxUsers"], 5);
        assert_eq!(doc.body["allowedUsers"][0], "Ahmed");
    }

    #[test]
    fn test_put_get_list_delete() {
        let store = store();
        store
            .put(Collection::Rules, Document::new("a", json!({ "content": "one" })))
            .unwrap();
        store
            .put(Collection::Rules, Document::new("b", json!({ "content": "two" })))
            .unwrap();
        store
            .put(Collection::Rules, Document::new("a", json!({ "content": "uno" })))
            .unwrap();

        let docs = store.list(Collection::Rules).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].body["content"], "uno");
        assert!(store.list(Collection::Messages).unwrap().is_empty());

        assert!(store.delete(Collection::Rules, "a").unwrap());
        assert!(!store.delete(Collection::Rules, "a").unwrap());
        assert!(store.get(Collection::Rules, "a").unwrap().is_none());
    }

    #[test]
    fn test_update_merges_and_missing_is_error() {
        let store = store();
        store
            .put(Collection::Messages, Document::new("m1", json!({ "content": "hi" })))
            .unwrap();

        let mut fields = Map::new();
        fields.insert("isRead".into(), json!(true));
        assert!(store.update(Collection::Messages, "m1", fields.clone()).unwrap());

        let doc = store.get(Collection::Messages, "m1").unwrap().unwrap();
        assert_eq!(doc.body, json!({ "id": "m1", "content": "hi", "isRead": true }));

        let err = store.update(Collection::Messages, "nope", fields).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_corrupt_rows_are_skipped() {
        let store = store();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO documents (collection, id, body) VALUES ('rules', 'bad', '{oops')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        store
            .put(Collection::Rules, Document::new("good", json!({ "content": "x" })))
            .unwrap();

        let docs = store.list(Collection::Rules).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "good");
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put(Collection::Approvals, Document::new("x", json!({ "username": "User1" })))
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list(Collection::Approvals).unwrap().len(), 1);
    }
}
