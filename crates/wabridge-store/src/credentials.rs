//! Credential persistence.
//!
//! Credentials are opaque JSON blobs owned by the protocol library. The
//! store only moves them between disk and the connector; a credential
//! file existing for a session id is the registry's recovery signal.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use wabridge_models::SessionId;

use crate::atomic::{atomic_write_json, read_json_optional};
use crate::error::{Result, StoreError};

/// File-name prefix for credential files.
const CREDENTIAL_PREFIX: &str = "md_";

/// Persists per-session authentication material.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads stored credentials, if any.
    async fn load(&self, session_id: &SessionId) -> Result<Option<Value>>;

    /// Persists credentials for a session.
    async fn save(&self, session_id: &SessionId, credentials: &Value) -> Result<()>;

    /// Removes all on-disk state for a session. Idempotent.
    async fn remove(&self, session_id: &SessionId) -> Result<()>;

    /// Session ids with stored credentials (crash-recovery scan).
    async fn list(&self) -> Result<Vec<SessionId>>;

    /// Path for the session's message-store file.
    fn message_store_path(&self, session_id: &SessionId) -> PathBuf;
}

/// Credential store backed by one JSON file per session.
pub struct FsCredentialStore {
    dir: PathBuf,
}

impl FsCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn credentials_path(&self, session_id: &SessionId) -> PathBuf {
        self.dir
            .join(format!("{CREDENTIAL_PREFIX}{session_id}.json"))
    }

    fn remove_if_exists(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::RemoveError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[async_trait]
impl CredentialStore for FsCredentialStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Value>> {
        read_json_optional(&self.credentials_path(session_id))
    }

    async fn save(&self, session_id: &SessionId, credentials: &Value) -> Result<()> {
        let path = self.credentials_path(session_id);
        atomic_write_json(&path, credentials)?;
        debug!(session_id = %session_id, path = %path.display(), "Saved credentials");
        Ok(())
    }

    async fn remove(&self, session_id: &SessionId) -> Result<()> {
        Self::remove_if_exists(&self.credentials_path(session_id))?;
        Self::remove_if_exists(&self.message_store_path(session_id))?;
        debug!(session_id = %session_id, "Removed session files");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::ReadError {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable sessions dir entry");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name
                .strip_prefix(CREDENTIAL_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                ids.push(SessionId::from(id));
            }
        }
        Ok(ids)
    }

    fn message_store_path(&self, session_id: &SessionId) -> PathBuf {
        self.dir.join(format!("{session_id}_store.json"))
    }
}
