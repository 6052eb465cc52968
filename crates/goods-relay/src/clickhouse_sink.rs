//! ClickHouse implementation of the `LogSink` trait.

use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::Serialize;
use tracing::{debug, instrument};

use goods_core::error::DomainError;
use goods_core::event::LogRecord;
use goods_core::relay::LogSink;

/// SQL to create the analytical logs table.
pub const CREATE_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS logs (
    id          Int64,
    project_id  Int64,
    name        String,
    description String,
    priority    Int32,
    removed     Bool,
    event_time  DateTime64(3, 'UTC')
)
ENGINE = MergeTree
ORDER BY (project_id, id, event_time)
";

/// Wire row for `logs`. `event_time` is milliseconds since the epoch, which
/// is how `DateTime64(3)` travels in `RowBinary`.
#[derive(Debug, Row, Serialize)]
struct LogRow {
    id: i64,
    project_id: i64,
    name: String,
    description: String,
    priority: i32,
    removed: bool,
    event_time: i64,
}

impl From<&LogRecord> for LogRow {
    fn from(record: &LogRecord) -> Self {
        Self {
            id: record.id,
            project_id: record.project_id,
            name: record.name.clone(),
            description: record.description.clone(),
            priority: record.priority,
            removed: record.removed,
            event_time: record.event_time.timestamp_millis(),
        }
    }
}

fn sink_error(context: &str, err: &clickhouse::error::Error) -> DomainError {
    DomainError::Sink(format!("{context}: {err}"))
}

/// Appends log batches to ClickHouse, one `INSERT` per batch.
///
/// An insert that is not ended is aborted server-side, so a failure part-way
/// through leaves nothing visible.
#[derive(Clone)]
pub struct ClickHouseLogSink {
    client: Client,
    table: String,
}

impl std::fmt::Debug for ClickHouseLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseLogSink")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl ClickHouseLogSink {
    /// Creates a sink writing to the `logs` table at `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self::with_client(Client::default().with_url(url))
    }

    /// Creates a sink over an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            table: "logs".to_owned(),
        }
    }

    /// Creates the `logs` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Sink` if ClickHouse rejects the DDL.
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        self.client
            .query(CREATE_LOGS_TABLE)
            .execute()
            .await
            .map_err(|e| sink_error("create logs table", &e))
    }
}

#[async_trait]
impl LogSink for ClickHouseLogSink {
    #[instrument(skip_all, fields(batch_size = records.len()))]
    async fn append_batch(&self, records: &[LogRecord]) -> Result<(), DomainError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut insert = self
            .client
            .insert::<LogRow>(&self.table)
            .map_err(|e| sink_error("prepare batch", &e))?;
        for record in records {
            insert
                .write(&LogRow::from(record))
                .await
                .map_err(|e| sink_error("append", &e))?;
        }
        insert.end().await.map_err(|e| sink_error("send batch", &e))?;

        debug!("log batch persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_log_row_encodes_event_time_as_millis() {
        let record = LogRecord {
            id: 3,
            project_id: 1,
            name: "widget".into(),
            description: "blue".into(),
            priority: 2,
            removed: true,
            event_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        };

        let row = LogRow::from(&record);

        assert_eq!(row.event_time, 1_768_471_200_000);
        assert_eq!(row.priority, 2);
        assert!(row.removed);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_noop() {
        let sink = ClickHouseLogSink::new("http://127.0.0.1:1");

        assert!(sink.append_batch(&[]).await.is_ok());
    }
}
