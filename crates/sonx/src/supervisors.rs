//! 🎬 *[camera pans across a row of idle sockets]*
//! 🎬 "In a world where one connection was not enough..."
//! 🎬 "One supervisor dared to open N of them." 🦆
//!
//! 📦 The Supervisor runs a bulk call end to end:
//!
//! ```text
//!   records ──effective_parallelism──▶ p ──partition──▶ [part_0 .. part_k]
//!        │                                                  │
//!        │                  spawn one PartitionWorker per part (own connection each)
//!        │                                                  │
//!        └──── join ALL workers ◀── failures ──▶ ErrorCollector (one channel, many senders)
//!                     │
//!                     ▼
//!              Vec<RecordError>   (empty == everything landed)
//! ```
//!
//! 🧠 Knowledge graph:
//! - The error channel is the only thing more than one worker touches. It's created
//!   at the top of `dispatch` and drained at the bottom. Nobody outside ever sees it.
//! - Workers own disjoint records and their own connection. No shared transport, no locks.
//! - `dispatch` never fails. Every problem becomes a `RecordError` or a log line.
//! - No timeouts. A worker stuck on a silent read holds up the join for as long as
//!   the service stays silent.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB. Supervisors manage minions; minions don't get exported.

mod collector;
mod workers;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::backends::Connector;
use crate::common::{BulkJob, Record};
use crate::errors::RecordError;
use crate::partition::{effective_parallelism, partition};
use crate::progress::IngestProgress;
use collector::error_channel;
use workers::{PartitionWorker, Worker};

/// 📦 The Supervisor: hands out partitions, waits for everyone, collects the damage report.
#[derive(Debug)]
pub(crate) struct Supervisor<C: Connector> {
    /// 🏭 Where each worker gets its own connection.
    connector: Arc<C>,
}

impl<C: Connector> Supervisor<C> {
    pub(crate) fn new(connector: Arc<C>) -> Self {
        Self { connector }
    }

    /// 🧵 Fan `records` out across up to `requested` workers and wait for all of them.
    ///
    /// Failures from one partition come back in record order; across partitions the
    /// order is whatever the scheduler felt like.
    pub(crate) async fn dispatch(
        &self,
        job: BulkJob,
        requested: i64,
        records: Vec<Record>,
        progress: Option<IngestProgress>,
    ) -> Vec<RecordError> {
        let total = records.len();
        let parallelism = effective_parallelism(requested, total);
        let partitions = partition(records, parallelism);
        if partitions.is_empty() {
            debug!("📭 empty batch for {}/{}, nothing to dispatch", job.collection, job.bucket);
            return Vec::new();
        }

        info!(
            "🚀 {:?} of {} records into {}/{} across {} workers (requested {})",
            job.mode,
            total,
            job.collection,
            job.bucket,
            partitions.len(),
            requested
        );

        let job = Arc::new(job);
        let (collector, drain) = error_channel();
        let handles: Vec<_> = partitions
            .into_iter()
            .enumerate()
            .map(|(id, records)| {
                PartitionWorker::new(
                    id,
                    Arc::clone(&self.connector),
                    Arc::clone(&job),
                    records,
                    collector.clone(),
                    progress.clone(),
                )
                .start()
            })
            .collect();
        // 🔒 only the workers hold senders from here on
        drop(collector);

        for (id, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("⚠️ worker {id} finished with a problem: {err:#}"),
                Err(join_err) => error!("💀 worker {id} did not finish: {join_err}"),
            }
        }

        if let Some(progress) = &progress {
            progress.finish();
        }

        let failures = drain.collect();
        if failures.is_empty() {
            info!("✅ all {total} records landed in {}/{}", job.collection, job.bucket);
        } else {
            warn!(
                "💀 {} of {total} records failed in {}/{}",
                failures.len(),
                job.collection,
                job.bucket
            );
        }
        failures
    }
}
