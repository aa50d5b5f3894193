//! 💀 Errors: the taxonomy of everything that can go sideways between us and the index.
//!
//! 🧠 Knowledge graph:
//! - `IngestError` is the library's typed error. Callers can `match` on it.
//! - `ErrorKind` collapses every `IngestError` into the two outcomes a bulk caller cares
//!   about: "never got a connection" vs "the wire broke mid-record".
//! - `anyhow` still runs the show at the app edges (config, CLI, worker task plumbing).
//!   Library seams get names. App seams get context chains. Everyone gets a duck. 🦆

use std::io;

use thiserror::Error;

/// 🏷️ The two faces of failure in a bulk call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 🔌 No connection was available for the record. The worker never got to try.
    ConnectionClosed,
    /// 📡 A write or read failed (or the service said `ERR`) while handling the record.
    TransportError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConnectionClosed => f.write_str("connection closed"),
            ErrorKind::TransportError => f.write_str("transport error"),
        }
    }
}

/// 💀 Everything the ingest client can trip over.
#[derive(Debug, Error)]
pub enum IngestError {
    /// 🔌 The connection is gone, was never there, or was already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// 📡 Opening the socket failed.
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 🤝 The greeting / START exchange did not go as planned.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// 📡 The socket itself failed mid-stream.
    #[error("transport I/O failed")]
    Io(#[from] io::Error),

    /// 🚫 The service answered `ERR <reason>`.
    #[error("service rejected the command: {reason}")]
    Rejected { reason: String },

    /// 🚫 A collection, bucket or object name that would break the line framing.
    /// Caught before anything is written.
    #[error("invalid {what} name {name:?}: {reason}")]
    InvalidName {
        what: &'static str,
        name: String,
        reason: &'static str,
    },

    /// 🤷 The service answered, but not with what the command promised.
    #[error("unexpected response: expected {expected}, got '{got}'")]
    UnexpectedResponse { expected: &'static str, got: String },
}

impl IngestError {
    /// 🏷️ Collapse into the bulk-facing kind. Anything that happened before a usable
    /// connection existed is `ConnectionClosed`; everything after is `TransportError`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::ConnectionClosed
            | IngestError::Connect { .. }
            | IngestError::Handshake(_) => ErrorKind::ConnectionClosed,
            IngestError::Io(_)
            | IngestError::InvalidName { .. }
            | IngestError::Rejected { .. }
            | IngestError::UnexpectedResponse { .. } => ErrorKind::TransportError,
        }
    }
}

/// 📦 One failed record from a bulk call. Carries the object id, never the text.
#[derive(Debug, Error)]
#[error("object '{object}': {error}")]
pub struct RecordError {
    pub object: String,
    #[source]
    pub error: IngestError,
}

impl RecordError {
    pub fn new(object: impl Into<String>, error: IngestError) -> Self {
        Self {
            object: object.into(),
            error,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
