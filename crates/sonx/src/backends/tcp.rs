//! 📡 The TCP backend: a real socket, a real service, real consequences.
//!
//! 🎬 COLD OPEN: the socket connects. The service says `CONNECTED`. We say
//! `START ingest <password>`. It says `STARTED ingest protocol(1) buffer(20000)`.
//! Everybody nods. From here on it's one line out, one line back, until `QUIT`.
//!
//! ⚠️ Only the connect + handshake is bounded by a timeout. Once a connection is up,
//! a read waits as long as the service takes. That's the deal.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use memchr::memchr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, trace};

use crate::backends::{Connection, Connector};
use crate::codec::{DEFAULT_MAX_COMMAND_BYTES, Verb};
use crate::errors::IngestError;

/// 🔧 Where the service lives and how to get in.
#[derive(Deserialize, Clone)]
pub struct TcpConnectorConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 🔒 The ingest channel password. Never logged.
    #[serde(default)]
    pub password: String,
    /// ⏱️ Upper bound on connect + handshake. Reads after that are unbounded.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

// 📡 1491: the port the ingest service listens on out of the box
fn default_port() -> u16 {
    1491
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for TcpConnectorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// 🎭 manual Debug so the password never shows up in a `{:?}` somewhere at 3am
impl std::fmt::Debug for TcpConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnectorConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl TcpConnectorConfig {
    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 🏭 Opens authenticated ingest-channel connections over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    config: TcpConnectorConfig,
}

impl TcpConnector {
    pub fn new(config: TcpConnectorConfig) -> Self {
        Self { config }
    }

    async fn open(&self, addr: &str) -> Result<TcpConnection, IngestError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| IngestError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        let mut conn = TcpConnection {
            reader: BufReader::new(read_half),
            writer: Some(write_half),
            max_command_bytes: DEFAULT_MAX_COMMAND_BYTES,
            line_buf: Vec::new(),
            quit_sent: false,
        };

        let greeting = conn.read().await?;
        if !greeting.starts_with("CONNECTED") {
            return Err(IngestError::Handshake(format!(
                "expected a CONNECTED greeting, got '{greeting}'"
            )));
        }
        trace!("🤝 greeted by {greeting}");

        conn.write(&format!("START ingest {}", self.config.password))
            .await?;
        let started = conn.read().await?;
        conn.max_command_bytes = parse_started(&started)?;
        debug!(
            "✅ ingest channel started on {addr} (max command {} bytes)",
            conn.max_command_bytes
        );
        Ok(conn)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Connection = TcpConnection;

    async fn connect(&self) -> Result<TcpConnection, IngestError> {
        let addr = self.config.addr();
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let opened = tokio::time::timeout(timeout, self.open(&addr))
            .await
            .map_err(|_| IngestError::Connect {
                addr: addr.clone(),
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no handshake within {}s", self.config.connect_timeout_secs),
                ),
            })?;

        // 🔒 anything that broke before STARTED is a failure to connect, not a transport error
        opened.map_err(|err| match err {
            IngestError::Rejected { reason } => IngestError::Handshake(reason),
            IngestError::Io(source) => IngestError::Connect { addr, source },
            other => other,
        })
    }
}

/// 📏 Pull `buffer(<bytes>)` out of `STARTED ingest protocol(1) buffer(20000)`.
fn parse_started(line: &str) -> Result<usize, IngestError> {
    if !line.starts_with("STARTED") {
        return Err(IngestError::Handshake(format!(
            "expected STARTED, got '{line}'"
        )));
    }
    let Some(rest) = line.split_once("buffer(").map(|(_, rest)| rest) else {
        return Ok(DEFAULT_MAX_COMMAND_BYTES);
    };
    rest.split_once(')')
        .and_then(|(digits, _)| digits.parse::<usize>().ok())
        .ok_or_else(|| IngestError::Handshake(format!("unreadable buffer size in '{line}'")))
}

/// 📏 Longest response line we buffer. Ingest replies are a few dozen bytes.
pub const MAX_RESPONSE_LINE_BYTES: usize = 64 * 1024;

/// 📬 `read_line` with a ceiling, so a service that never sends `\n` can't eat the heap.
///
/// An over-long line is consumed through its newline before the error comes back, which
/// keeps the next read lined up with the next reply. Returns bytes read; 0 means EOF.
async fn read_line_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> io::Result<usize> {
    let mut total = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(total);
        }
        let (end, found_newline) = match memchr(b'\n', available) {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        if total + end > max_bytes {
            reader.consume(end);
            if !found_newline {
                skip_past_newline(reader).await?;
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("response line longer than {max_bytes} bytes"),
            ));
        }

        buf.extend_from_slice(&available[..end]);
        reader.consume(end);
        total += end;
        if found_newline {
            return Ok(total);
        }
    }
}

async fn skip_past_newline<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<()> {
    loop {
        let rest = reader.fill_buf().await?;
        if rest.is_empty() {
            return Ok(());
        }
        match memchr(b'\n', rest) {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = rest.len();
                reader.consume(len);
            }
        }
    }
}

/// 📡 One authenticated ingest-channel socket.
#[derive(Debug)]
pub struct TcpConnection {
    reader: BufReader<OwnedReadHalf>,
    /// 🔒 `None` once closed.
    writer: Option<OwnedWriteHalf>,
    max_command_bytes: usize,
    line_buf: Vec<u8>,
    /// 👋 `QUIT` already went out, so `close` doesn't say it twice.
    quit_sent: bool,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn write(&mut self, line: &str) -> Result<(), IngestError> {
        let writer = self.writer.as_mut().ok_or(IngestError::ConnectionClosed)?;
        trace!("📤 {} bytes out", line.len() + 2);
        let mut framed = String::with_capacity(line.len() + 2);
        framed.push_str(line);
        framed.push_str("\r\n");
        writer.write_all(framed.as_bytes()).await?;
        if line == Verb::Quit.as_str() {
            self.quit_sent = true;
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<String, IngestError> {
        if self.writer.is_none() {
            return Err(IngestError::ConnectionClosed);
        }
        self.line_buf.clear();
        let read =
            read_line_bounded(&mut self.reader, &mut self.line_buf, MAX_RESPONSE_LINE_BYTES).await?;
        if read == 0 {
            return Err(IngestError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "service closed the connection",
            )));
        }
        let line = String::from_utf8_lossy(&self.line_buf);
        let line = line.trim_end_matches(['\r', '\n']);
        trace!("📥 {line}");
        match line.strip_prefix("ERR ") {
            Some(reason) => Err(IngestError::Rejected {
                reason: reason.to_string(),
            }),
            None => Ok(line.to_string()),
        }
    }

    async fn close(&mut self) -> Result<(), IngestError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        // 👋 polite goodbye; the service may already be gone, and that's fine
        if !self.quit_sent {
            let _ = writer.write_all(b"QUIT\r\n").await;
        }
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn max_command_bytes(&self) -> usize {
        self.max_command_bytes
    }
}
