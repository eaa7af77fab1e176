//! Error taxonomy for the vault core.
//!
//! Every failure an ingestion, lookup, or reset can produce maps to exactly
//! one variant here, so adapters (HTTP, CLI) can translate them into
//! distinguishable user-facing messages. Preview extraction failures are
//! deliberately absent: they degrade to "no preview" inside the pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    /// The input path is missing or is not a regular file.
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The file name does not denote a supported document type.
    #[error("unsupported document type: '{name}' (only .pdf files can be ingested)")]
    UnsupportedType { name: String },

    /// Byte-identical content is already stored under `existing_id`.
    #[error("duplicate content: already stored as document {existing_id}")]
    DuplicateContent { existing_id: i64 },

    #[error("document not found: {0}")]
    DocumentNotFound(i64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl VaultError {
    /// Machine-readable code used by the HTTP adapter's error body.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::SourceNotFound(_) => "source_not_found",
            VaultError::UnsupportedType { .. } => "unsupported_type",
            VaultError::DuplicateContent { .. } => "duplicate_content",
            VaultError::DocumentNotFound(_) => "not_found",
            VaultError::Io(_) => "io_error",
            VaultError::Store(_) => "store_error",
        }
    }

    /// True for failures the caller can fix by changing the input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            VaultError::SourceNotFound(_)
                | VaultError::UnsupportedType { .. }
                | VaultError::DuplicateContent { .. }
                | VaultError::DocumentNotFound(_)
        )
    }
}

pub type Result<T, E = VaultError> = std::result::Result<T, E>;
