//! 📦 Common data structures: the building blocks of sonx.
//!
//! 🎬 INT. INGEST CHANNEL, 3:47 AM
//!
//! A `Record` arrives. It has an object id and some text. It does not know how many
//! sockets are about to be opened on its behalf. It does not need to know.
//! It is carried, encoded, sent, acknowledged, and forgotten. Like a postcard. 🦆

use serde::Deserialize;

use crate::codec::Verb;

/// 🎯 One thing to index (or un-index): an object id and its text.
///
/// Owned by the caller until it is handed to a bulk call, after which it belongs
/// to exactly one worker. Never shared, never cloned along the hot path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    /// 🏷️ The object identifier inside `collection / bucket`. Must not be empty.
    pub object: String,
    /// 📜 Arbitrary payload. Backslashes, newlines, quotes, emoji: all welcome.
    pub text: String,
}

impl Record {
    pub fn new(object: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            text: text.into(),
        }
    }
}

/// 🔄 What a bulk call does with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// 📥 Index the text (chunked when long).
    Push,
    /// 🗑️ Remove the text from the object.
    Pop,
}

impl BulkMode {
    pub(crate) fn verb(self) -> Verb {
        match self {
            BulkMode::Push => Verb::Push,
            BulkMode::Pop => Verb::Pop,
        }
    }
}

/// 🧭 Where a batch lands, and what happens to it when it gets there.
/// Shared read-only by every worker of one bulk call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BulkJob {
    pub collection: String,
    pub bucket: String,
    pub mode: BulkMode,
}
