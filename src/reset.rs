//! Destructive vault reset.
//!
//! Removes every managed document file, then every document and session
//! row. File removal is a best-effort sweep: a file that cannot be deleted
//! (permissions, or an open handle on platforms that lock files) is recorded
//! in the report and the sweep moves on.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::allocate::is_managed_name;
use crate::error::Result;
use crate::vault::Vault;

#[derive(Debug, Clone, Serialize)]
pub struct FailedRemoval {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<FailedRemoval>,
    pub documents_deleted: u64,
    pub sessions_deleted: u64,
}

impl ResetReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Vault {
    /// Clears stored content and metadata, keeping the schema so the vault
    /// is usable straight away. Waits for in-flight ingestions to finish.
    pub async fn reset(&self) -> Result<ResetReport> {
        let _gate = self.gate.write().await;
        let candidates = managed_files(&self.paths().documents_dir).await?;
        self.reset_candidates(candidates).await
    }

    /// Sweeps `candidates` then wipes the store. Caller holds the write gate.
    async fn reset_candidates(&self, candidates: Vec<PathBuf>) -> Result<ResetReport> {
        let (removed, failed) = sweep(candidates).await;
        let mut report = ResetReport {
            removed,
            failed,
            ..ResetReport::default()
        };

        let counts = self.store().wipe().await?;
        report.documents_deleted = counts.documents;
        report.sessions_deleted = counts.sessions;

        tracing::info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            documents = counts.documents,
            sessions = counts.sessions,
            "vault reset"
        );
        Ok(report)
    }
}

/// Removes each path, returning `(removed, failed)`. A path that is already
/// gone counts as removed.
async fn sweep(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<FailedRemoval>) {
    let mut removed = Vec::with_capacity(paths.len());
    let mut failed = Vec::new();
    for path in paths {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "stored file already gone");
                removed.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not remove stored file");
                failed.push(FailedRemoval {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }
    (removed, failed)
}

/// Files in `dir` named by the storage allocator, sorted. A missing
/// directory has none.
async fn managed_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name();
        if is_file && name.to_str().is_some_and(is_managed_name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
