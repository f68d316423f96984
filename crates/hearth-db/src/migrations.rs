use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT NOT NULL,
            id          TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents(collection, created_at);

        -- Seed the system settings singleton
        INSERT OR IGNORE INTO documents (collection, id, body)
            VALUES ('settings', 'system',
                    '{"id":"system","maxUsers":5,"allowedUsers":["Ahmed","User1","User2","User3","User4"]}');
        "#,
    )?;

    info!("Database migrations complete");
    Ok(())
}
