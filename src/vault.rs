//! The vault context handed to every core operation.
//!
//! A [`Vault`] bundles the resolved paths, the metadata store, the ingestion
//! settings, and two pieces of shared runtime state:
//!
//! - the reset gate, an async read/write lock. Ingestions hold a read guard
//!   for their whole pipeline and [`Vault::reset`](crate::reset) holds the
//!   write guard, so a reset never sweeps a copy an ingestion is about to
//!   commit;
//! - diagnostics counters (currently: previews that could not be extracted).
//!
//! Nothing in the core reads process-wide state; adapters build a `Vault`
//! once and share it (usually behind an `Arc`).

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::config::{IngestConfig, VaultPaths};
use crate::error::Result;
use crate::store::MetadataStore;

#[derive(Debug)]
pub struct Vault {
    paths: VaultPaths,
    store: MetadataStore,
    ingest: IngestConfig,
    pub(crate) gate: RwLock<()>,
    preview_failures: AtomicU64,
}

impl Vault {
    /// Opens the metadata store under `paths.root` and makes sure the
    /// storage directory exists.
    pub async fn open(paths: VaultPaths, ingest: IngestConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&paths.documents_dir).await?;
        let store = MetadataStore::initialize(&paths.db_path).await?;
        tracing::info!(root = %paths.root.display(), "vault opened");
        Ok(Self {
            paths,
            store,
            ingest,
            gate: RwLock::new(()),
            preview_failures: AtomicU64::new(0),
        })
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn ingest_config(&self) -> &IngestConfig {
        &self.ingest
    }

    /// Number of ingestions whose preview extraction failed since open.
    pub fn preview_failures(&self) -> u64 {
        self.preview_failures.load(Ordering::Relaxed)
    }

    pub(crate) fn record_preview_failure(&self) {
        self.preview_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Idempotent setup run before each ingestion, so a vault whose
    /// directory or schema was removed underneath recovers on its own.
    pub(crate) async fn ensure_ready(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.paths.documents_dir).await?;
        self.store.ensure_schema().await
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
