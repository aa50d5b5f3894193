//! 📨 Command round-trips on an open connection.
//!
//! Everything here takes `&mut impl Connection` and does one protocol exchange
//! (or one PUSH's worth of them). Shared by the single-shot `Ingester` methods and
//! the bulk workers, so a record is applied the same way no matter who sends it.

use crate::backends::Connection;
use crate::codec::{self, Verb};
use crate::common::BulkMode;
use crate::errors::IngestError;

/// 📥 Push `text` as one or more chunked lines, reading one ack per line.
///
/// A bad name fails before anything is written. The first failure wins. Chunks the service already accepted stay accepted:
/// nothing is resent or rolled back.
pub(crate) async fn push<C: Connection + ?Sized>(
    conn: &mut C,
    collection: &str,
    bucket: &str,
    object: &str,
    text: &str,
) -> Result<(), IngestError> {
    let lines = codec::encode_push(collection, bucket, object, text, conn.max_command_bytes())?;
    for line in &lines {
        // 📬 ack body is not interpreted, only its arrival
        conn.roundtrip(line).await?;
    }
    Ok(())
}

/// 🗑️ Pop `text` from the object with a single line.
pub(crate) async fn pop<C: Connection + ?Sized>(
    conn: &mut C,
    collection: &str,
    bucket: &str,
    object: &str,
    text: &str,
) -> Result<(), IngestError> {
    let line = codec::encode_pop(collection, bucket, object, text)?;
    conn.roundtrip(&line).await?;
    Ok(())
}

/// 🔄 Apply one record in the given mode.
pub(crate) async fn apply<C: Connection + ?Sized>(
    conn: &mut C,
    mode: BulkMode,
    collection: &str,
    bucket: &str,
    object: &str,
    text: &str,
) -> Result<(), IngestError> {
    match mode {
        BulkMode::Push => push(conn, collection, bucket, object, text).await,
        BulkMode::Pop => pop(conn, collection, bucket, object, text).await,
    }
}

/// 🔢 Parse `RESULT <n>`.
pub(crate) fn parse_result(line: &str) -> Result<u64, IngestError> {
    line.strip_prefix("RESULT ")
        .and_then(|n| n.trim().parse::<u64>().ok())
        .ok_or_else(|| IngestError::UnexpectedResponse {
            expected: "RESULT <count>",
            got: line.to_string(),
        })
}

/// 🔢 Send a command answered by `RESULT <n>` and return `n`.
pub(crate) async fn counted<C: Connection + ?Sized>(
    conn: &mut C,
    line: &str,
) -> Result<u64, IngestError> {
    let reply = conn.roundtrip(line).await?;
    parse_result(&reply)
}

/// 🏓 `PING` → `PONG`.
pub(crate) async fn ping<C: Connection + ?Sized>(conn: &mut C) -> Result<(), IngestError> {
    let reply = conn.roundtrip(Verb::Ping.as_str()).await?;
    expect_prefix(&reply, "PONG")
}

/// 👋 `QUIT` → `ENDED ...`.
pub(crate) async fn quit<C: Connection + ?Sized>(conn: &mut C) -> Result<(), IngestError> {
    let reply = conn.roundtrip(Verb::Quit.as_str()).await?;
    expect_prefix(&reply, "ENDED")
}

fn expect_prefix(reply: &str, expected: &'static str) -> Result<(), IngestError> {
    if reply.starts_with(expected) {
        Ok(())
    } else {
        Err(IngestError::UnexpectedResponse {
            expected,
            got: reply.to_string(),
        })
    }
}
