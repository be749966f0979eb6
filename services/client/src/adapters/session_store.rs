//! services/client/src/adapters/session_store.rs
//!
//! Holds the current session in memory and persists it to disk so a later run
//! can resume it, the way the backend SDK keeps it in local storage.

use crate::adapters::gotrue::SessionRecord;
use egolay_core::domain::Session;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// The single owner of the current session.
pub struct SessionStore {
    path: Option<PathBuf>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Creates a store persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            current: RwLock::new(None),
        }
    }

    /// Creates a store that forgets the session when the process exits.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
        }
    }

    /// Returns the session, reading it from disk if it is not in memory yet.
    ///
    /// An unreadable file is logged and treated as "no session".
    pub async fn load(&self) -> Option<Session> {
        if let Some(session) = self.current().await {
            return Some(session);
        }
        let path = self.path.as_ref()?;

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read stored session");
                return None;
            }
        };
        let session = match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => record.to_domain(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed stored session");
                return None;
            }
        };

        debug!(user_id = %session.user.id, "Restored stored session");
        *self.current.write().await = Some(session.clone());
        Some(session)
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Makes `session` the current one and persists it.
    pub async fn replace(&self, session: Session) {
        if let Some(path) = &self.path {
            let record = SessionRecord::from_domain(&session);
            if let Err(e) = write_record(path, &record).await {
                warn!(path = %path.display(), error = %e, "Failed to persist session");
            }
        }
        *self.current.write().await = Some(session);
    }

    /// Forgets the session, in memory and on disk.
    pub async fn clear(&self) {
        *self.current.write().await = None;
        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stored session"),
            }
        }
    }
}

async fn write_record(path: &Path, record: &SessionRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(path, json).await
}
