use sqlx::SqlitePool;

use crate::error::Result;

/// Creates the schema when absent and upgrades vaults written by older
/// versions. Safe to run on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_filename TEXT NOT NULL,
            stored_path TEXT NOT NULL UNIQUE,
            sha256 TEXT NOT NULL,
            category TEXT,
            tags TEXT,
            doc_date TEXT,
            ingested_at TEXT NOT NULL,
            preview TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create sessions table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            username TEXT NOT NULL,
            hostname TEXT NOT NULL,
            vault_root TEXT,
            notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Early vaults had no preview column
    let has_preview: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('documents') WHERE name = 'preview'",
    )
    .fetch_one(pool)
    .await?;

    if !has_preview {
        sqlx::query("ALTER TABLE documents ADD COLUMN preview TEXT")
            .execute(pool)
            .await?;
    }

    // Create indexes
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_sha256 ON documents(sha256)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
