//! Ports of the event relay pipeline: publishing change events, pulling them
//! back in batches, and persisting them to the analytical store.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::{ChangeEvent, LogRecord};

/// Publishes change events onto the message bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one event and waits for the bus to accept it.
    async fn publish(&self, event: &ChangeEvent) -> Result<(), DomainError>;
}

/// Acknowledges a whole fetched batch at once.
#[async_trait]
pub trait BatchAcknowledger: Send {
    /// Marks every message of the batch as processed. Call only after the
    /// batch is durably persisted.
    async fn acknowledge(self: Box<Self>) -> Result<(), DomainError>;
}

/// A fetched batch and the handle that acknowledges it.
pub struct EventBatch {
    /// Decoded records in delivery order.
    pub records: Vec<LogRecord>,
    acknowledger: Option<Box<dyn BatchAcknowledger>>,
}

impl EventBatch {
    /// Creates a batch. An empty batch carries no acknowledger.
    #[must_use]
    pub fn new(records: Vec<LogRecord>, acknowledger: Box<dyn BatchAcknowledger>) -> Self {
        Self {
            records,
            acknowledger: Some(acknowledger),
        }
    }

    /// A batch with nothing to persist or acknowledge.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            acknowledger: None,
        }
    }

    /// Number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the batch and acknowledges it.
    ///
    /// # Errors
    ///
    /// Returns the acknowledger's error if the bus rejects the ack.
    pub async fn acknowledge(self) -> Result<(), DomainError> {
        match self.acknowledger {
            Some(acknowledger) => acknowledger.acknowledge().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for EventBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBatch")
            .field("records", &self.records)
            .field("acknowledgeable", &self.acknowledger.is_some())
            .finish()
    }
}

/// Durable pull subscription delivering change events in batches.
#[async_trait]
pub trait EventBatchSource: Send + Sync {
    /// Pulls up to `max_size` messages. Returns an empty batch when nothing
    /// arrives within the pull timeout. One undecodable message fails the
    /// whole fetch and is left unacknowledged.
    async fn fetch_batch(&self, max_size: usize) -> Result<EventBatch, DomainError>;
}

/// Batch-append analytical store.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Appends all records as one unit. On error nothing was persisted.
    async fn append_batch(&self, records: &[LogRecord]) -> Result<(), DomainError>;
}
