//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 A `Connector` opens connections. A `Connection` writes one command line and
//! reads one response line, over and over, until somebody calls `close()`.
//! That's the whole contract. No buffering beyond the transport, no retries, no opinions.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls (`TcpConnector`, `InMemoryConnector`).
//! - The bulk supervisor is handed a `Connector` and asks it for one fresh connection
//!   per worker. Swap in the in-memory one and the whole fan-out runs without a socket.
//! - A connection is owned by exactly one task for its whole life. Nothing here is shared.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use async_trait::async_trait;

use crate::errors::IngestError;

pub mod in_mem;
pub mod tcp;

pub use in_mem::{InMemoryConnection, InMemoryConnector};
pub use tcp::{TcpConnection, TcpConnector, TcpConnectorConfig};

/// 📡 One line-oriented conversation with the ingest channel.
///
/// # Contract 📜
/// - `write` sends exactly one command line (the terminator is the backend's business).
/// - `read` waits for exactly one response line. An `ERR <reason>` line comes back as
///   `IngestError::Rejected`. There is no timeout: a silent service means a long wait.
/// - `close` releases the connection. Calling it twice is fine. Using the connection
///   afterwards yields `IngestError::ConnectionClosed`.
#[async_trait]
pub trait Connection: Send + std::fmt::Debug {
    /// ✉️ Send one command line.
    async fn write(&mut self, line: &str) -> Result<(), IngestError>;
    /// 📬 Receive one response line, terminator stripped.
    async fn read(&mut self) -> Result<String, IngestError>;
    /// 🗑️ Release the connection. Idempotent.
    async fn close(&mut self) -> Result<(), IngestError>;
    /// 📏 The biggest command this connection's service accepts, in bytes.
    fn max_command_bytes(&self) -> usize;

    /// 🔁 Write one line, read its one-line answer.
    async fn roundtrip(&mut self, line: &str) -> Result<String, IngestError> {
        self.write(line).await?;
        self.read().await
    }
}

/// 🏭 Opens connections on demand. The factory the bulk supervisor is built around.
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug + 'static {
    type Connection: Connection + 'static;

    /// 🚀 Open and authenticate a fresh connection.
    async fn connect(&self) -> Result<Self::Connection, IngestError>;
}
