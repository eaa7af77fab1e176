//! Session (audit) tracking.
//!
//! Each run of the application is bracketed by a session row: `begin` at
//! startup, `end` on the way out. `end` is idempotent, so cleanup paths can
//! call it without checking whether another path already did.
//!
//! Long-running processes hold an [`ActiveSession`]. A vault reset deletes
//! every session row, including the running one, so the server renews its
//! session right after a reset and the launcher ends whichever id is current
//! at shutdown.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{utc_now_rfc3339, NewSession};
use crate::store::MetadataStore;

/// Who ran the application, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub username: String,
    pub hostname: String,
}

impl Operator {
    pub fn new(username: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            hostname: hostname.into(),
        }
    }

    /// Best-effort identity of the current process. Only launchers call
    /// this; the core always receives an explicit `Operator`.
    pub fn detect() -> Self {
        let username = env_first(&["USER", "USERNAME", "LOGNAME"]);
        let hostname = env_first(&["HOSTNAME", "COMPUTERNAME"]).or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        });
        Self {
            username: username.unwrap_or_else(|| "unknown".to_string()),
            hostname: hostname.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct SessionTracker {
    store: MetadataStore,
    operator: Operator,
}

impl SessionTracker {
    pub fn new(store: MetadataStore, operator: Operator) -> Self {
        Self { store, operator }
    }

    /// Opens a session and returns its id.
    pub async fn begin(&self, vault_root: &Path, note: Option<&str>) -> Result<String> {
        let session = NewSession {
            session_id: Uuid::new_v4().simple().to_string(),
            started_at: utc_now_rfc3339(),
            username: self.operator.username.clone(),
            hostname: self.operator.hostname.clone(),
            vault_root: Some(vault_root.to_string_lossy().into_owned()),
            notes: note.map(str::to_string),
        };
        let id = self.store.start_session(&session).await?;
        tracing::info!(session = %id, user = %session.username, host = %session.hostname, "session started");
        Ok(id)
    }

    /// Closes the session. Unknown or already-closed ids are ignored.
    pub async fn end(&self, session_id: &str) -> Result<()> {
        if self.store.end_session(session_id, &utc_now_rfc3339()).await? {
            tracing::info!(session = %session_id, "session ended");
        } else {
            tracing::debug!(session = %session_id, "session already closed or unknown");
        }
        Ok(())
    }
}

/// The session of a running process, renewable after a reset.
#[derive(Debug)]
pub struct ActiveSession {
    tracker: SessionTracker,
    vault_root: PathBuf,
    current: Mutex<Option<String>>,
}

impl ActiveSession {
    pub async fn begin(
        tracker: SessionTracker,
        vault_root: impl Into<PathBuf>,
        note: &str,
    ) -> Result<Self> {
        let vault_root = vault_root.into();
        let id = tracker.begin(&vault_root, Some(note)).await?;
        Ok(Self {
            tracker,
            vault_root,
            current: Mutex::new(Some(id)),
        })
    }

    pub async fn current_id(&self) -> Option<String> {
        self.current.lock().await.clone()
    }

    /// Opens a fresh session and makes it current. The previous row is
    /// assumed gone (wiped), so it is not ended.
    pub async fn renew(&self, note: &str) -> Result<String> {
        let mut current = self.current.lock().await;
        let id = self.tracker.begin(&self.vault_root, Some(note)).await?;
        *current = Some(id.clone());
        Ok(id)
    }

    /// Ends the current session. Later calls do nothing.
    pub async fn end(&self) -> Result<()> {
        let taken = self.current.lock().await.take();
        match taken {
            Some(id) => self.tracker.end(&id).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn begin_then_end_records_both_timestamps() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = MetadataStore::initialize(&tmp.path().join("s.db"))
            .await
            .unwrap();
        let tracker = SessionTracker::new(store.clone(), Operator::new("alice", "desk"));

        let id = tracker.begin(tmp.path(), Some("unit test")).await.unwrap();
        assert_eq!(id.len(), 32);

        let open = store.get_session(&id).await.unwrap().unwrap();
        assert!(open.ended_at.is_none());
        assert_eq!(open.username, "alice");
        assert_eq!(open.hostname, "desk");
        assert_eq!(open.notes.as_deref(), Some("unit test"));
        assert_eq!(
            open.vault_root.as_deref(),
            Some(tmp.path().to_string_lossy().as_ref())
        );

        tracker.end(&id).await.unwrap();
        let closed = store.get_session(&id).await.unwrap().unwrap();
        assert!(closed.ended_at.is_some());

        tracker.end(&id).await.unwrap();
        let again = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(again.ended_at, closed.ended_at);
    }

    #[test]
    fn detect_never_returns_blank_identity() {
        let op = Operator::detect();
        assert!(!op.username.is_empty());
        assert!(!op.hostname.is_empty());
    }

    #[tokio::test]
    async fn active_session_renews_and_ends_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = MetadataStore::initialize(&tmp.path().join("s.db"))
            .await
            .unwrap();
        let tracker = SessionTracker::new(store.clone(), Operator::new("bo", "lab"));

        let active = ActiveSession::begin(tracker, tmp.path(), "serve")
            .await
            .unwrap();
        let first = active.current_id().await.unwrap();

        store.wipe().await.unwrap();
        let second = active.renew("serve (after reset)").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(active.current_id().await.as_deref(), Some(second.as_str()));

        active.end().await.unwrap();
        active.end().await.unwrap();
        let row = store.get_session(&second).await.unwrap().unwrap();
        assert!(row.ended_at.is_some());
        assert_eq!(row.notes.as_deref(), Some("serve (after reset)"));
        assert!(active.current_id().await.is_none());
    }
}
