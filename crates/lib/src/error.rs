//! Error types shared by the transport, credential store, session and relay.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the chat transport (bridge link).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connecting to transport at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("transport link closed")]
    LinkClosed,

    #[error("transport rejected request: {0}")]
    Rejected(String),

    #[error("encoding transport frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure reading or writing the credential record.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding credentials: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("credential store {0} is locked by another process")]
    Locked(PathBuf),
}

/// Failure of `send` on the session.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("session is not ready")]
    NotReady,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Unexpected failure while relaying a webhook. The display text is returned to the caller.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}
