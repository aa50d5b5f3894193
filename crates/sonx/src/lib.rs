//! 🔊 sonx: a client for the ingest channel of a text-line search index.
//!
//! 🎬 *[narrator voice]* "Somewhere, a search index sat on port 1491, waiting for text.
//! It did not wait long."
//!
//! 📦 Layout, from the wire up:
//! - [`codec`]: escaping, chunking and command lines. Pure functions, no I/O.
//! - [`backends`]: the [`Connection`](backends::Connection) / [`Connector`](backends::Connector)
//!   seam, with a TCP implementation and an in-memory one for tests.
//! - [`partition`]: how many workers, and which records each one gets.
//! - [`ingester`]: the public [`Ingester`], which runs single commands on its own
//!   connection and fans bulk calls out to one connection per worker.
//! - [`app_config`]: figment-powered config, TOML plus `SONX_*` env vars.
//! - [`progress`]: progress bars and the failure table.

pub mod app_config;
pub mod backends;
pub mod codec;
pub mod common;
pub mod errors;
pub mod ingester;
pub mod partition;
pub mod progress;

mod commands;
mod supervisors;

use anyhow::{Context, Result};

pub use crate::app_config::{AppConfig, RuntimeConfig};
pub use crate::backends::{TcpConnector, TcpConnectorConfig};
pub use crate::common::{BulkMode, Record};
pub use crate::errors::{ErrorKind, IngestError, RecordError};
pub use crate::ingester::Ingester;

/// 🚀 Connect a TCP [`Ingester`] from a loaded [`AppConfig`], progress bars and all.
pub async fn connect(app_config: &AppConfig) -> Result<Ingester> {
    let connection = &app_config.connection;
    let ingester = Ingester::connect_tcp(connection.clone())
        .await
        .with_context(|| {
            format!(
                "💀 Could not open the ingest channel at {}:{}",
                connection.host, connection.port
            )
        })?;
    Ok(ingester.with_progress(app_config.runtime.show_progress))
}
