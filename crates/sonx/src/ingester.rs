//! 🔊 The Ingester: the public face of the ingest channel.
//!
//! One control connection for the one-shot commands (push, pop, count, flush, ping,
//! quit), plus the connector the bulk calls use to open a fresh connection per worker.
//!
//! 🧠 Knowledge graph:
//! - Single-record calls stop at the first error and return it.
//! - Bulk calls never fail. They hand back a `Vec<RecordError>`; empty means all good.
//! - Bulk calls never touch the control connection, so one can run while the
//!   control connection sits idle.

use std::sync::Arc;

use tracing::debug;

use crate::backends::{Connection, Connector, TcpConnector, TcpConnectorConfig};
use crate::codec::{self, Verb};
use crate::commands;
use crate::common::{BulkJob, BulkMode, Record};
use crate::errors::{IngestError, RecordError};
use crate::progress::IngestProgress;
use crate::supervisors::Supervisor;

/// 🔊 A client for the ingest channel.
#[derive(Debug)]
pub struct Ingester<C: Connector = TcpConnector> {
    control: C::Connection,
    supervisor: Supervisor<C>,
    show_progress: bool,
}

impl Ingester<TcpConnector> {
    /// 📡 Connect over TCP with the given settings.
    pub async fn connect_tcp(config: TcpConnectorConfig) -> Result<Self, IngestError> {
        Self::connect(TcpConnector::new(config)).await
    }
}

impl<C: Connector> Ingester<C> {
    /// 🚀 Open the control connection. Bulk workers open their own later, on demand.
    pub async fn connect(connector: C) -> Result<Self, IngestError> {
        let control = connector.connect().await?;
        debug!("🔊 ingester connected via {connector:?}");
        Ok(Self {
            control,
            supervisor: Supervisor::new(Arc::new(connector)),
            show_progress: false,
        })
    }

    /// 📊 Draw a progress bar during bulk calls.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// 📥 `PUSH <collection> <bucket> <object> "<text>"`, chunked when the text is long.
    pub async fn push(
        &mut self,
        collection: &str,
        bucket: &str,
        object: &str,
        text: &str,
    ) -> Result<(), IngestError> {
        commands::push(&mut self.control, collection, bucket, object, text).await
    }

    /// 🗑️ `POP <collection> <bucket> <object> "<text>"`.
    pub async fn pop(
        &mut self,
        collection: &str,
        bucket: &str,
        object: &str,
        text: &str,
    ) -> Result<(), IngestError> {
        commands::pop(&mut self.control, collection, bucket, object, text).await
    }

    /// 🧵 Push every record across up to `parallelism` connections.
    ///
    /// `parallelism <= 0` means one worker; more than `records.len()` means one per record.
    pub async fn bulk_push(
        &self,
        collection: &str,
        bucket: &str,
        parallelism: i64,
        records: Vec<Record>,
    ) -> Vec<RecordError> {
        self.bulk(BulkMode::Push, collection, bucket, parallelism, records)
            .await
    }

    /// 🧵 Pop every record across up to `parallelism` connections.
    pub async fn bulk_pop(
        &self,
        collection: &str,
        bucket: &str,
        parallelism: i64,
        records: Vec<Record>,
    ) -> Vec<RecordError> {
        self.bulk(BulkMode::Pop, collection, bucket, parallelism, records)
            .await
    }

    async fn bulk(
        &self,
        mode: BulkMode,
        collection: &str,
        bucket: &str,
        parallelism: i64,
        records: Vec<Record>,
    ) -> Vec<RecordError> {
        let progress = (self.show_progress && !records.is_empty()).then(|| {
            IngestProgress::new(
                format!("{} {collection}/{bucket}", mode.verb()),
                records.len() as u64,
            )
        });
        let job = BulkJob {
            collection: collection.to_string(),
            bucket: bucket.to_string(),
            mode,
        };
        self.supervisor
            .dispatch(job, parallelism, records, progress)
            .await
    }

    /// 🔢 `COUNT <collection> [<bucket> [<object>]]`.
    pub async fn count(
        &mut self,
        collection: &str,
        bucket: Option<&str>,
        object: Option<&str>,
    ) -> Result<u64, IngestError> {
        let line = codec::encode_count(collection, bucket, object)?;
        commands::counted(&mut self.control, &line).await
    }

    /// 🧹 `FLUSHC <collection>`. Returns how many objects were flushed.
    pub async fn flush_collection(&mut self, collection: &str) -> Result<u64, IngestError> {
        let line = codec::encode_flush(Verb::FlushCollection, &[collection])?;
        commands::counted(&mut self.control, &line).await
    }

    /// 🧹 `FLUSHB <collection> <bucket>`.
    pub async fn flush_bucket(&mut self, collection: &str, bucket: &str) -> Result<u64, IngestError> {
        let line = codec::encode_flush(Verb::FlushBucket, &[collection, bucket])?;
        commands::counted(&mut self.control, &line).await
    }

    /// 🧹 `FLUSHO <collection> <bucket> <object>`.
    pub async fn flush_object(
        &mut self,
        collection: &str,
        bucket: &str,
        object: &str,
    ) -> Result<u64, IngestError> {
        let line = codec::encode_flush(Verb::FlushObject, &[collection, bucket, object])?;
        commands::counted(&mut self.control, &line).await
    }

    /// 🏓 Is anybody home?
    pub async fn ping(&mut self) -> Result<(), IngestError> {
        commands::ping(&mut self.control).await
    }

    /// 👋 Say goodbye and close the control connection.
    pub async fn quit(mut self) -> Result<(), IngestError> {
        let said_goodbye = commands::quit(&mut self.control).await;
        self.control.close().await?;
        said_goodbye
    }

    /// 🗑️ Close the control connection without the QUIT exchange.
    pub async fn close(mut self) -> Result<(), IngestError> {
        self.control.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryConnector;
    use crate::errors::ErrorKind;

    async fn ingester(connector: &InMemoryConnector) -> Ingester<InMemoryConnector> {
        Ingester::connect(connector.clone())
            .await
            .expect("💀 in-memory ingester should connect")
    }

    #[tokio::test]
    async fn the_one_where_single_push_escapes_before_sending() {
        let connector = InMemoryConnector::new();
        let mut ingester = ingester(&connector).await;
        ingester
            .push("messages", "user:1", "conversation:1", "line1\nline2 \"hi\"")
            .await
            .expect("💀 push should be acknowledged");
        assert_eq!(
            connector.lines().await,
            vec!["PUSH messages user:1 conversation:1 \"line1\\nline2 \\\"hi\\\"\"".to_string()]
        );
    }

    #[tokio::test]
    async fn the_one_where_single_push_returns_the_first_error() {
        let connector = InMemoryConnector::new().rejecting("nope");
        let mut ingester = ingester(&connector).await;
        let err = ingester
            .push("messages", "default", "nope", "text")
            .await
            .expect_err("💀 a rejected push must surface");
        assert_eq!(err.kind(), ErrorKind::TransportError);
        assert!(ingester.pop("messages", "default", "fine", "text").await.is_ok());
    }

    #[tokio::test]
    async fn the_one_where_a_spaced_out_object_is_refused_up_front() {
        let connector = InMemoryConnector::new();
        let mut ingester = ingester(&connector).await;
        let err = ingester
            .push("messages", "default", "two words", "text")
            .await
            .expect_err("💀 a name with a space must not be sent");
        assert!(matches!(err, IngestError::InvalidName { what: "object", .. }));
        assert!(ingester.pop("messages", "", "o", "text").await.is_err());
        assert!(ingester.flush_bucket("messages", "a\nb").await.is_err());
        assert!(connector.lines().await.is_empty());
        ingester.ping().await.expect("💀 the control connection is still fine");
    }

    #[tokio::test]
    async fn the_one_where_bulk_uses_its_own_connections() {
        let connector = InMemoryConnector::new().rejecting("C");
        let ingester = ingester(&connector).await;
        let failures = ingester
            .bulk_push(
                "messages",
                "default",
                2,
                vec![
                    Record::new("A", "x"),
                    Record::new("B", "y"),
                    Record::new("C", "z"),
                ],
            )
            .await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].object, "C");
        // 🧪 one control connection + two workers; only the workers were closed
        assert_eq!(connector.connects().await, 3);
        assert_eq!(connector.closes().await, 2);
    }

    #[tokio::test]
    async fn the_one_where_bulk_pop_with_no_records_returns_immediately() {
        let connector = InMemoryConnector::new();
        let ingester = ingester(&connector).await.with_progress(true);
        assert!(ingester.bulk_pop("messages", "default", 0, Vec::new()).await.is_empty());
        assert_eq!(connector.connects().await, 1);
    }

    #[tokio::test]
    async fn the_one_where_the_simple_commands_speak_the_protocol() {
        let connector = InMemoryConnector::new();
        let mut ingester = ingester(&connector).await;
        ingester
            .push("c", "b", "o", "hello")
            .await
            .expect("💀 push should be acknowledged");
        assert_eq!(ingester.count("c", Some("b"), None).await.ok(), Some(1));
        assert_eq!(ingester.flush_object("c", "b", "o").await.ok(), Some(0));
        assert_eq!(ingester.flush_bucket("c", "b").await.ok(), Some(0));
        assert_eq!(ingester.flush_collection("c").await.ok(), Some(0));
        ingester.ping().await.expect("💀 ping should pong");
        ingester.quit().await.expect("💀 quit should end cleanly");

        assert_eq!(
            connector.lines().await,
            vec![
                "PUSH c b o \"hello\"".to_string(),
                "COUNT c b".to_string(),
                "FLUSHO c b o".to_string(),
                "FLUSHB c b".to_string(),
                "FLUSHC c".to_string(),
                "PING".to_string(),
                "QUIT".to_string(),
            ]
        );
        assert_eq!(connector.closes().await, 1);
    }

    #[tokio::test]
    async fn the_one_where_no_service_means_no_ingester() {
        let connector = InMemoryConnector::new().refusing_connections();
        let err = Ingester::connect(connector)
            .await
            .expect_err("💀 a refused control connection must fail connect");
        assert_eq!(err.kind(), ErrorKind::ConnectionClosed);
    }
}
