//! SQLite-backed metadata store.
//!
//! [`MetadataStore`] is the only writer of the `documents` and `sessions`
//! tables. The duplicate check and the insert are a single conditional
//! `INSERT ... WHERE NOT EXISTS` inside a write transaction. SQLite holds
//! its one write lock for the whole statement, so two concurrent ingestions
//! of the same bytes cannot both pass the check; the unique index on
//! `sha256` backs this up at the storage level.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};

use crate::db;
use crate::error::{Result, VaultError};
use crate::migrate;
use crate::models::{Document, NewDocument, NewSession, Session};

const DOCUMENT_COLUMNS: &str =
    "id, original_filename, stored_path, sha256, category, tags, doc_date, ingested_at, preview";
const SESSION_COLUMNS: &str =
    "session_id, started_at, ended_at, username, hostname, vault_root, notes";

/// Rows removed by [`MetadataStore::wipe`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WipeCounts {
    pub documents: u64,
    pub sessions: u64,
}

#[derive(Debug, Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl MetadataStore {
    /// Opens (creating if needed) the store at `db_path` and brings the
    /// schema up to date. Existing data is never touched.
    pub async fn initialize(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        tracing::debug!(db = %db_path.display(), "metadata store ready");
        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Re-applies the (idempotent) migrations.
    pub async fn ensure_schema(&self) -> Result<()> {
        migrate::run_migrations(&self.pool).await
    }

    /// Inserts a document row unless its digest is already present.
    ///
    /// Fails with [`VaultError::DuplicateContent`] carrying the id of the
    /// existing row; nothing is written in that case.
    pub async fn insert_document(&self, doc: &NewDocument) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO documents (
                original_filename, stored_path, sha256, category, tags, doc_date, ingested_at, preview
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM documents WHERE sha256 = ?)
            "#,
        )
        .bind(&doc.original_filename)
        .bind(&doc.stored_path)
        .bind(&doc.sha256)
        .bind(&doc.classification.category)
        .bind(&doc.classification.tags)
        .bind(&doc.classification.doc_date)
        .bind(&doc.ingested_at)
        .bind(&doc.preview)
        .bind(&doc.sha256)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let existing_id: i64 = sqlx::query_scalar("SELECT id FROM documents WHERE sha256 = ?")
                .bind(&doc.sha256)
                .fetch_one(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Err(VaultError::DuplicateContent { existing_id });
        }

        let id = inserted.last_insert_rowid();
        tx.commit().await?;
        Ok(id)
    }

    /// Id of the document holding `sha256`, if any. Read-only; the
    /// authoritative check happens inside [`insert_document`](Self::insert_document).
    pub async fn find_by_digest(&self, sha256: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM documents WHERE sha256 = ?")
            .bind(sha256)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// Newest-first by id.
    pub async fn list_documents(&self, limit: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    pub async fn get_document(&self, id: i64) -> Result<Document> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => document_from_row(&row),
            None => Err(VaultError::DocumentNotFound(id)),
        }
    }

    pub async fn count_documents(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Records the start of a run and returns its session id.
    pub async fn start_session(&self, session: &NewSession) -> Result<String> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, started_at, username, hostname, vault_root, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.started_at)
        .bind(&session.username)
        .bind(&session.hostname)
        .bind(&session.vault_root)
        .bind(&session.notes)
        .execute(&self.pool)
        .await?;

        Ok(session.session_id.clone())
    }

    /// Closes a session. Returns whether this call closed it; an unknown
    /// or already-closed session is left as is.
    pub async fn end_session(&self, session_id: &str, ended_at: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET ended_at = ? WHERE session_id = ? AND ended_at IS NULL",
        )
        .bind(ended_at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    /// Most recent sessions first.
    pub async fn list_sessions(&self, limit: i64) -> Result<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at DESC LIMIT ?"
        ))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    /// Deletes every document and session row. The schema and the database
    /// file stay in place, so handles held elsewhere remain valid.
    pub async fn wipe(&self) -> Result<WipeCounts> {
        let mut tx = self.pool.begin().await?;
        let documents = sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let sessions = sqlx::query("DELETE FROM sessions")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(WipeCounts {
            documents,
            sessions,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        original_filename: row.try_get("original_filename")?,
        stored_path: row.try_get("stored_path")?,
        sha256: row.try_get("sha256")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        doc_date: row.try_get("doc_date")?,
        ingested_at: row.try_get("ingested_at")?,
        preview: row.try_get("preview")?,
    })
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    Ok(Session {
        session_id: row.try_get("session_id")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        username: row.try_get("username")?,
        hostname: row.try_get("hostname")?,
        vault_root: row.try_get("vault_root")?,
        notes: row.try_get("notes")?,
    })
}
