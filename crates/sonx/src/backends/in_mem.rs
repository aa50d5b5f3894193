//! # Previously, on sonx...
//!
//! 🎬 The service was down. Or it was up, but in another datacenter. Or it was up,
//! here, but we didn't want to flush a real collection just to run a test suite.
//! Someone had to play the part of the ingest channel. That someone was this module.
//!
//! `in_mem` provides an in-process [`Connector`] whose connections answer like the
//! service would: `OK` for a push, `RESULT <n>` for pop / count / flush, `PONG` for ping.
//! It can also be scripted to misbehave:
//! - refuse every connection,
//! - answer `ERR` for specific objects,
//! - never answer at all for specific objects (the stalled-read boundary).
//!
//! Every written line lands in a shared ledger behind an `Arc<Mutex<...>>` so callers
//! can inspect what arrived, along with connect / close / refusal counts.
//!
//! ⚠️ This is NOT a search engine. It indexes nothing. It remembers lines and vibes.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{Connection, Connector};
use crate::codec::DEFAULT_MAX_COMMAND_BYTES;
use crate::errors::IngestError;

/// 📜 How the fake service should behave. Fixed once connections start flowing.
#[derive(Debug, Clone)]
struct Script {
    refuse_connections: bool,
    rejected_objects: HashSet<String>,
    stalled_objects: HashSet<String>,
    max_command_bytes: usize,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            refuse_connections: false,
            rejected_objects: HashSet::new(),
            stalled_objects: HashSet::new(),
            max_command_bytes: DEFAULT_MAX_COMMAND_BYTES,
        }
    }
}

/// 🧾 What actually happened, across every connection this connector handed out.
#[derive(Debug, Default)]
struct Ledger {
    lines: Vec<String>,
    connects: usize,
    closes: usize,
    refused: usize,
}

/// 🏭 A connector to a service that lives entirely in RAM.
///
/// Clone-able so tests can keep a handle for assertions after handing a copy to the
/// ingester. Clones share one ledger. Communist data, but in a good way.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    script: Arc<Script>,
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🚫 Every `connect()` fails.
    pub fn refusing_connections(mut self) -> Self {
        Arc::make_mut(&mut self.script).refuse_connections = true;
        self
    }

    /// 🙅 PUSH / POP for this object is answered with `ERR`.
    pub fn rejecting(mut self, object: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.script)
            .rejected_objects
            .insert(object.into());
        self
    }

    /// 🧊 PUSH / POP for this object is never answered.
    pub fn stalling_on(mut self, object: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.script)
            .stalled_objects
            .insert(object.into());
        self
    }

    /// 📏 What the fake service advertises as its max command size.
    pub fn with_max_command_bytes(mut self, max_command_bytes: usize) -> Self {
        Arc::make_mut(&mut self.script).max_command_bytes = max_command_bytes;
        self
    }

    /// 📜 Every line written through any connection, in arrival order.
    pub async fn lines(&self) -> Vec<String> {
        self.ledger.lock().await.lines.clone()
    }

    pub async fn connects(&self) -> usize {
        self.ledger.lock().await.connects
    }

    pub async fn closes(&self) -> usize {
        self.ledger.lock().await.closes
    }

    pub async fn refused(&self) -> usize {
        self.ledger.lock().await.refused
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Connection = InMemoryConnection;

    async fn connect(&self) -> Result<InMemoryConnection, IngestError> {
        let mut ledger = self.ledger.lock().await;
        if self.script.refuse_connections {
            ledger.refused += 1;
            return Err(IngestError::Connect {
                addr: "in-memory".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        ledger.connects += 1;
        Ok(InMemoryConnection {
            script: Arc::clone(&self.script),
            ledger: Arc::clone(&self.ledger),
            pending: VecDeque::new(),
            closed: false,
        })
    }
}

/// 📬 What the fake service will say next.
#[derive(Debug)]
enum Reply {
    Line(String),
    Silence,
}

/// 📡 One conversation with the in-memory service.
#[derive(Debug)]
pub struct InMemoryConnection {
    script: Arc<Script>,
    ledger: Arc<Mutex<Ledger>>,
    pending: VecDeque<Reply>,
    closed: bool,
}

impl InMemoryConnection {
    fn reply_to(&self, line: &str, pushes_so_far: usize) -> Reply {
        let mut tokens = line.split(' ');
        let verb = tokens.next().unwrap_or_default();
        match verb {
            "PUSH" | "POP" => {
                let object = tokens.nth(2).unwrap_or_default();
                if self.script.stalled_objects.contains(object) {
                    Reply::Silence
                } else if self.script.rejected_objects.contains(object) {
                    Reply::Line(format!("ERR rejected({object})"))
                } else if verb == "PUSH" {
                    Reply::Line("OK".to_string())
                } else {
                    Reply::Line("RESULT 1".to_string())
                }
            }
            "COUNT" => Reply::Line(format!("RESULT {pushes_so_far}")),
            "FLUSHC" | "FLUSHB" | "FLUSHO" => Reply::Line("RESULT 0".to_string()),
            "PING" => Reply::Line("PONG".to_string()),
            "QUIT" => Reply::Line("ENDED quit".to_string()),
            _ => Reply::Line("ERR unknown_command".to_string()),
        }
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn write(&mut self, line: &str) -> Result<(), IngestError> {
        if self.closed {
            return Err(IngestError::ConnectionClosed);
        }
        let mut ledger = self.ledger.lock().await;
        let pushes_so_far = ledger
            .lines
            .iter()
            .filter(|l| l.starts_with("PUSH "))
            .count();
        let reply = self.reply_to(line, pushes_so_far);
        ledger.lines.push(line.to_string());
        drop(ledger);
        self.pending.push_back(reply);
        Ok(())
    }

    async fn read(&mut self) -> Result<String, IngestError> {
        if self.closed {
            return Err(IngestError::ConnectionClosed);
        }
        match self.pending.pop_front() {
            Some(Reply::Line(line)) => match line.strip_prefix("ERR ") {
                Some(reason) => Err(IngestError::Rejected {
                    reason: reason.to_string(),
                }),
                None => Ok(line),
            },
            // 🧊 the service went quiet; so do we, forever
            Some(Reply::Silence) => std::future::pending().await,
            None => Err(IngestError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read with no command outstanding",
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), IngestError> {
        if !self.closed {
            self.closed = true;
            self.ledger.lock().await.closes += 1;
        }
        Ok(())
    }

    fn max_command_bytes(&self) -> usize {
        self.script.max_command_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn the_one_where_the_fake_service_acks_like_the_real_one() {
        let connector = InMemoryConnector::new();
        let mut conn = connector.connect().await.expect("💀 in-memory connect failed");
        assert_eq!(conn.roundtrip("PUSH c b o \"x\"").await.ok().as_deref(), Some("OK"));
        assert_eq!(conn.roundtrip("COUNT c").await.ok().as_deref(), Some("RESULT 1"));
        assert_eq!(conn.roundtrip("PING").await.ok().as_deref(), Some("PONG"));
        conn.close().await.expect("💀 close failed");
        conn.close().await.expect("💀 second close failed");

        assert_eq!(connector.connects().await, 1);
        assert_eq!(connector.closes().await, 1);
        assert_eq!(connector.lines().await.len(), 3);
    }

    #[tokio::test]
    async fn the_one_where_scripted_objects_get_rejected() {
        let connector = InMemoryConnector::new().rejecting("C");
        let mut conn = connector.connect().await.expect("💀 in-memory connect failed");
        assert!(matches!(
            conn.roundtrip("PUSH c b C \"z\"").await,
            Err(IngestError::Rejected { .. })
        ));
        assert!(conn.roundtrip("PUSH c b A \"x\"").await.is_ok());
    }

    #[tokio::test]
    async fn the_one_where_refusal_is_counted() {
        let connector = InMemoryConnector::new().refusing_connections();
        assert!(connector.connect().await.is_err());
        assert_eq!(connector.refused().await, 1);
        assert_eq!(connector.connects().await, 0);
    }

    #[tokio::test]
    async fn the_one_where_a_stalled_object_never_answers() {
        let connector = InMemoryConnector::new().stalling_on("slow");
        let mut conn = connector.connect().await.expect("💀 in-memory connect failed");
        let waited =
            tokio::time::timeout(Duration::from_millis(50), conn.roundtrip("PUSH c b slow \"x\""))
                .await;
        assert!(waited.is_err(), "a stalled read must not complete");
    }
}
