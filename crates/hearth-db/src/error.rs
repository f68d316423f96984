use hearth_types::Collection;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document {id} not found in {collection}")]
    NotFound { collection: Collection, id: String },

    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: &str) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}
