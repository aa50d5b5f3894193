//! 🎬 *[a partition arrives. the worker opens a socket. the clock reads 2:47am.]*
//!
//! 🗂️ The PartitionWorker: one partition, one connection, one record at a time.
//! It does not retry. It does not skip ahead. When a record fails it writes the
//! failure down and moves on to the next one, like a very calm postal worker.
//!
//! 🧠 Knowledge graph:
//! - No connection? Every record in the partition is reported as `ConnectionClosed`.
//! - A failed record leaves the connection as-is; the next record gets its own attempt.
//! - The connection is closed once the partition is done, however many records failed.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Worker;
use crate::backends::{Connection, Connector};
use crate::commands;
use crate::common::{BulkJob, Record};
use crate::errors::IngestError;
use crate::progress::IngestProgress;
use crate::supervisors::collector::ErrorCollector;

pub(crate) struct PartitionWorker<C: Connector> {
    id: usize,
    connector: Arc<C>,
    job: Arc<BulkJob>,
    records: Vec<Record>,
    errors: ErrorCollector,
    progress: Option<IngestProgress>,
}

impl<C: Connector> PartitionWorker<C> {
    pub(crate) fn new(
        id: usize,
        connector: Arc<C>,
        job: Arc<BulkJob>,
        records: Vec<Record>,
        errors: ErrorCollector,
        progress: Option<IngestProgress>,
    ) -> Self {
        Self {
            id,
            connector,
            job,
            records,
            errors,
            progress,
        }
    }

    async fn run(self) -> Result<()> {
        let Self {
            id,
            connector,
            job,
            records,
            errors,
            progress,
        } = self;
        debug!("🧵 worker {id} started with {} records", records.len());

        let mut conn = match connector.connect().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!(
                    "🔌 worker {id} could not open a connection ({err}); failing its {} records",
                    records.len()
                );
                None
            }
        };

        for record in &records {
            let outcome = match conn.as_mut() {
                Some(conn) => {
                    commands::apply(
                        conn,
                        job.mode,
                        &job.collection,
                        &job.bucket,
                        &record.object,
                        &record.text,
                    )
                    .await
                }
                None => Err(IngestError::ConnectionClosed),
            };
            let succeeded = outcome.is_ok();
            if let Err(err) = outcome {
                errors.report(&record.object, err);
            }
            if let Some(progress) = &progress {
                progress.record_done(succeeded);
            }
        }

        if let Some(mut conn) = conn {
            conn.close()
                .await
                .with_context(|| format!("💀 worker {id} could not close its connection"))?;
        }
        debug!("🏁 worker {id} done");
        Ok(())
    }
}

impl<C: Connector> Worker for PartitionWorker<C> {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}
