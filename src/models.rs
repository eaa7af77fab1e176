//! Core data models used throughout PerDocMan.
//!
//! These are the records the metadata store owns (documents and sessions)
//! plus the input bundles callers hand to the core.

use serde::{Deserialize, Serialize};

/// Optional classification a caller attaches to an ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Option<String>,
    /// Comma-joined tags.
    pub tags: Option<String>,
    /// Caller-supplied document date; not checked against the content.
    pub doc_date: Option<String>,
}

impl Classification {
    /// Blank strings are treated as absent.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            category: clean(self.category),
            tags: clean(self.tags),
            doc_date: clean(self.doc_date),
        }
    }
}

/// Fields for a document row, assembled by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub original_filename: String,
    pub stored_path: String,
    pub sha256: String,
    pub classification: Classification,
    pub ingested_at: String,
    pub preview: Option<String>,
}

/// A stored document record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: i64,
    pub original_filename: String,
    pub stored_path: String,
    pub sha256: String,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub doc_date: Option<String>,
    pub ingested_at: String, // RFC 3339, UTC
    pub preview: Option<String>,
}

/// Fields for a session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub started_at: String,
    pub username: String,
    pub hostname: String,
    pub vault_root: Option<String>,
    pub notes: Option<String>,
}

/// One bracketed run of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub username: String,
    pub hostname: String,
    pub vault_root: Option<String>,
    pub notes: Option<String>,
}

/// UTC timestamp in the format every row uses.
pub fn utc_now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
