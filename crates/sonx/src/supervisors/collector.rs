//! 🪣 The error collector: many workers report, one supervisor reads.
//!
//! An unbounded `async_channel` stands in for a mutex-guarded list. Each `report` is
//! a single atomic send, so concurrent workers can't lose each other's failures, and
//! messages from one sender stay in the order they were sent.
//! The drain is read only after every worker has been joined.

use async_channel::{Receiver, Sender};
use tracing::{error, warn};

use crate::errors::{IngestError, RecordError};

/// 📮 A worker's handle for reporting failed records. Clone one per worker.
#[derive(Debug, Clone)]
pub(crate) struct ErrorCollector {
    tx: Sender<RecordError>,
}

/// 📥 The supervisor's end. Consumed once, after the join.
#[derive(Debug)]
pub(crate) struct ErrorDrain {
    rx: Receiver<RecordError>,
}

pub(crate) fn error_channel() -> (ErrorCollector, ErrorDrain) {
    let (tx, rx) = async_channel::unbounded();
    (ErrorCollector { tx }, ErrorDrain { rx })
}

impl ErrorCollector {
    /// 💀 Record that `object` failed. Logs the object id and the error, never the text.
    pub(crate) fn report(&self, object: &str, error: IngestError) {
        warn!("💀 record '{object}' failed: {error}");
        if let Err(lost) = self.tx.try_send(RecordError::new(object, error)) {
            // 🐛 only possible if the drain was dropped before the join finished
            error!("💀 error collector is gone, dropping failure for '{}'", lost.into_inner().object);
        }
    }
}

impl ErrorDrain {
    /// 📦 Everything reported so far, in arrival order.
    pub(crate) fn collect(self) -> Vec<RecordError> {
        let mut failures = Vec::with_capacity(self.rx.len());
        while let Ok(failure) = self.rx.try_recv() {
            failures.push(failure);
        }
        failures
    }
}
