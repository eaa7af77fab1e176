//! Ingestion pipeline orchestration.
//!
//! One call ingests one document:
//! validate → claim destination → copy (synced) → digest the copy →
//! duplicate check → best-effort preview → atomic check-and-insert.
//!
//! No metadata row exists until the final insert commits. Every failure
//! after the copy is claimed removes the copy again, so a handled error
//! never leaves an orphaned file; only a process kill between copy and
//! commit can, and such a file is referenced by nothing.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWriteExt};
use walkdir::WalkDir;

use crate::allocate::{allocate, base_name, extension_of};
use crate::digest::digest_file;
use crate::error::{Result, VaultError};
use crate::extract::{extract_preview, MIME_PDF};
use crate::models::{utc_now_rfc3339, Classification, Document, NewDocument};
use crate::vault::Vault;

/// Extensions accepted for ingestion (lowercase, without the dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf"];

const MAX_CLAIM_ATTEMPTS: usize = 8;

/// Name-based type check; content sniffing is out of scope.
pub fn check_supported(name: &str) -> Result<()> {
    match extension_of(name) {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(VaultError::UnsupportedType {
            name: name.to_string(),
        }),
    }
}

/// Outcome of ingesting several paths in one go.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub ingested: Vec<Document>,
    /// Source path and the id of the document already holding its content.
    pub duplicates: Vec<(PathBuf, i64)>,
    pub failed: Vec<(PathBuf, VaultError)>,
}

impl Vault {
    /// Ingests the file at `source`.
    pub async fn ingest(&self, source: &Path, classification: Classification) -> Result<Document> {
        let metadata = match tokio::fs::metadata(source).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::SourceNotFound(source.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(VaultError::SourceNotFound(source.to_path_buf()));
        }

        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        check_supported(&original_name)?;

        let mut file = match tokio::fs::File::open(source).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::SourceNotFound(source.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        self.run_pipeline(&mut file, &original_name, classification)
            .await
    }

    /// Ingests bytes read from `reader` under the client-supplied
    /// `original_name`. Entry point for upload adapters.
    pub async fn ingest_reader<R>(
        &self,
        reader: &mut R,
        original_name: &str,
        classification: Classification,
    ) -> Result<Document>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let name = base_name(original_name).trim();
        check_supported(name)?;
        self.run_pipeline(reader, name, classification).await
    }

    /// Ingests files and (recursively) the PDFs inside directories. One
    /// failure never stops the batch.
    pub async fn ingest_paths(
        &self,
        paths: &[PathBuf],
        classification: &Classification,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for source in collect_sources(paths) {
            match self.ingest(&source, classification.clone()).await {
                Ok(doc) => report.ingested.push(doc),
                Err(VaultError::DuplicateContent { existing_id }) => {
                    report.duplicates.push((source, existing_id))
                }
                Err(e) => report.failed.push((source, e)),
            }
        }

        report
    }

    async fn run_pipeline<R>(
        &self,
        reader: &mut R,
        original_name: &str,
        classification: Classification,
    ) -> Result<Document>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let _gate = self.gate.read().await;
        self.ensure_ready().await?;

        let (dest, file) = claim_destination(original_name, &self.paths().documents_dir).await?;
        let result = self
            .store_copy(reader, file, &dest, original_name, classification.normalized())
            .await;

        if result.is_err() {
            remove_quietly(&dest).await;
        }
        result
    }

    async fn store_copy<R>(
        &self,
        reader: &mut R,
        mut file: tokio::fs::File,
        dest: &Path,
        original_name: &str,
        classification: Classification,
    ) -> Result<Document>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // Hash what we keep, not the source.
        let sha256 = digest_file(dest).await?;

        if let Some(existing_id) = self.store().find_by_digest(&sha256).await? {
            tracing::info!(name = original_name, existing_id, "duplicate content rejected");
            return Err(VaultError::DuplicateContent { existing_id });
        }

        let preview = self.preview_for(dest).await;

        let new_doc = NewDocument {
            original_filename: original_name.to_string(),
            stored_path: dest.to_string_lossy().into_owned(),
            sha256,
            classification,
            ingested_at: utc_now_rfc3339(),
            preview,
        };
        let id = self.store().insert_document(&new_doc).await?;

        tracing::info!(
            id,
            name = original_name,
            sha256 = %new_doc.sha256,
            stored = %new_doc.stored_path,
            "document ingested"
        );

        Ok(Document {
            id,
            original_filename: new_doc.original_filename,
            stored_path: new_doc.stored_path,
            sha256: new_doc.sha256,
            category: new_doc.classification.category,
            tags: new_doc.classification.tags,
            doc_date: new_doc.classification.doc_date,
            ingested_at: new_doc.ingested_at,
            preview: new_doc.preview,
        })
    }

    /// Never fails: any problem degrades to `None` and bumps the
    /// preview-failure counter.
    async fn preview_for(&self, path: &Path) -> Option<String> {
        let cfg = self.ingest_config();

        let size = match tokio::fs::metadata(path).await {
            Ok(m) => m.len(),
            Err(e) => {
                self.note_preview_failure(path, &e.to_string());
                return None;
            }
        };
        if size > cfg.preview_max_bytes {
            tracing::debug!(path = %path.display(), size, "file too large for preview");
            return None;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                self.note_preview_failure(path, &e.to_string());
                return None;
            }
        };

        let (pages, chars) = (cfg.preview_pages, cfg.preview_max_chars);
        let outcome =
            tokio::task::spawn_blocking(move || extract_preview(&bytes, MIME_PDF, pages, chars))
                .await;

        match outcome {
            Ok(Ok(preview)) => preview,
            Ok(Err(e)) => {
                self.note_preview_failure(path, &e.to_string());
                None
            }
            Err(e) => {
                self.note_preview_failure(path, &e.to_string());
                None
            }
        }
    }

    fn note_preview_failure(&self, path: &Path, reason: &str) {
        self.record_preview_failure();
        tracing::debug!(path = %path.display(), reason, "preview unavailable");
    }
}

/// Allocates a destination and creates it exclusively. Losing a race for a
/// name just means rolling a new one.
async fn claim_destination(original_name: &str, dir: &Path) -> Result<(PathBuf, tokio::fs::File)> {
    let mut last_err = None;
    for _ in 0..MAX_CLAIM_ATTEMPTS {
        let candidate = allocate(original_name, dir)?;
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => last_err = Some(e),
            Err(e) => return Err(e.into()),
        }
    }
    Err(last_err
        .unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::AlreadyExists))
        .into())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "could not remove rejected copy");
        }
    }
}

/// Expands directories into the PDFs below them (sorted), keeps plain
/// paths as given.
fn collect_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for path in paths {
        if !path.is_dir() {
            out.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| check_supported(&p.to_string_lossy()).is_ok())
            .collect();
        found.sort();
        out.extend(found);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(check_supported("a.pdf").is_ok());
        assert!(check_supported("A.PDF").is_ok());
        assert!(matches!(
            check_supported("notes.txt"),
            Err(VaultError::UnsupportedType { .. })
        ));
        assert!(check_supported("pdf").is_err());
        assert!(check_supported("").is_err());
    }

    #[test]
    fn collect_sources_walks_directories_for_pdfs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nested = tmp.path().join("2024");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(tmp.path().join("b.pdf"), b"%PDF-1.4 b").unwrap();
        std::fs::write(nested.join("a.PDF"), b"%PDF-1.4 a").unwrap();
        std::fs::write(tmp.path().join("skip.txt"), b"text").unwrap();

        let explicit = tmp.path().join("explicit.txt");
        let sources = collect_sources(&[tmp.path().to_path_buf(), explicit.clone()]);

        assert_eq!(
            sources,
            vec![nested.join("a.PDF"), tmp.path().join("b.pdf"), explicit]
        );
    }
}
