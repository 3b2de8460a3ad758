//! Credential store: durable key material that lets a session resume without re-pairing.
//!
//! The record format belongs to the transport; this module only persists it. One record per
//! session identity, replaced whole on every rotation.

use crate::error::CredentialError;
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Opaque credential document issued and rotated by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub serde_json::Value);

/// Storage for one session's credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stored credentials, or None when the session has never been paired.
    async fn load(&self) -> Result<Option<Credentials>, CredentialError>;
    /// Replace the stored credentials.
    async fn save(&self, credentials: &Credentials) -> Result<(), CredentialError>;
    /// Remove stored credentials so the next start pairs from scratch.
    async fn clear(&self) -> Result<(), CredentialError>;
}

const RECORD_FILE: &str = "creds.json";
const LOCK_FILE: &str = ".lock";

/// File-backed store at `<dir>/<session_id>/creds.json`.
///
/// Holds an exclusive lock on the session directory for as long as it lives, so two processes
/// cannot drive the same session.
pub struct FileCredentialStore {
    path: PathBuf,
    _lock: File,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CredentialError + '_ {
    move |source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl FileCredentialStore {
    /// Open (creating if needed) the record directory for `session_id` and take its lock.
    pub fn open(dir: impl AsRef<Path>, session_id: &str) -> Result<Self, CredentialError> {
        let session_dir = dir.as_ref().join(session_id);
        std::fs::create_dir_all(&session_dir).map_err(io_err(&session_dir))?;
        let lock_path = session_dir.join(LOCK_FILE);
        let lock = File::create(&lock_path).map_err(io_err(&lock_path))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(CredentialError::Locked(session_dir));
        }
        Ok(Self {
            path: session_dir.join(RECORD_FILE),
            _lock: lock,
        })
    }

    /// Path of the credential record.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        let s = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&self.path)(e)),
        };
        match serde_json::from_str::<Credentials>(&s) {
            Ok(Credentials(serde_json::Value::Null)) => Ok(None),
            Ok(creds) => Ok(Some(creds)),
            Err(e) => {
                log::warn!(
                    "ignoring unreadable credentials at {} ({}); pairing required",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        let json = serde_json::to_string_pretty(credentials)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_err(&self.path))
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.path)(e)),
        }
    }
}
