//! NATS JetStream adapters: the durable pull consumer that feeds the relay
//! loop and the publisher used by the outbox sweep.

use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

use goods_core::error::DomainError;
use goods_core::event::{ChangeEvent, LogRecord};
use goods_core::relay::{BatchAcknowledger, EventBatch, EventBatchSource, EventPublisher};

/// Subject carrying JSON-encoded change events.
pub const SUBJECT: &str = "goods.events";

/// Stream bound to [`SUBJECT`].
pub const STREAM_NAME: &str = "GOODS";

/// Durable consumer drained into the analytical store.
pub const CONSUMER_NAME: &str = "goods-logs";

/// Connects to NATS and returns a JetStream context.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the server cannot be reached.
pub async fn connect(url: &str) -> Result<jetstream::Context, DomainError> {
    let client = async_nats::connect(url)
        .await
        .map_err(|e| DomainError::infra("nats connect", e))?;
    Ok(jetstream::new(client))
}

/// Creates (or reuses) the goods stream and its durable pull consumer.
///
/// The consumer uses `AckPolicy::All`: acknowledging a message acknowledges
/// every earlier message delivered to it.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if JetStream rejects either call.
pub async fn durable_consumer(
    context: &jetstream::Context,
) -> Result<consumer::PullConsumer, DomainError> {
    let stream = context
        .get_or_create_stream(stream::Config {
            name: STREAM_NAME.to_owned(),
            subjects: vec![SUBJECT.to_owned()],
            ..Default::default()
        })
        .await
        .map_err(|e| DomainError::infra("create stream", e))?;

    stream
        .get_or_create_consumer(
            CONSUMER_NAME,
            consumer::pull::Config {
                durable_name: Some(CONSUMER_NAME.to_owned()),
                ack_policy: consumer::AckPolicy::All,
                ..Default::default()
            },
        )
        .await
        .map_err(|e| DomainError::infra("create consumer", e))
}

/// Acknowledges a batch by acknowledging its last message.
struct LastMessageAck {
    message: jetstream::Message,
}

#[async_trait]
impl BatchAcknowledger for LastMessageAck {
    async fn acknowledge(self: Box<Self>) -> Result<(), DomainError> {
        self.message
            .ack()
            .await
            .map_err(|e| DomainError::infra("ack batch", e))
    }
}

/// `EventBatchSource` over a durable JetStream pull consumer.
pub struct NatsBatchSource {
    consumer: consumer::PullConsumer,
    pull_timeout: Duration,
}

impl std::fmt::Debug for NatsBatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBatchSource")
            .field("pull_timeout", &self.pull_timeout)
            .finish_non_exhaustive()
    }
}

impl NatsBatchSource {
    /// Wraps a pull consumer. A fetch waits at most `pull_timeout` for
    /// messages.
    #[must_use]
    pub fn new(consumer: consumer::PullConsumer, pull_timeout: Duration) -> Self {
        Self {
            consumer,
            pull_timeout,
        }
    }
}

#[async_trait]
impl EventBatchSource for NatsBatchSource {
    #[instrument(skip(self))]
    async fn fetch_batch(&self, max_size: usize) -> Result<EventBatch, DomainError> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(max_size)
            .expires(self.pull_timeout)
            .messages()
            .await
            .map_err(|e| DomainError::infra("subscription fetch", e))?;

        let mut records = Vec::with_capacity(max_size);
        let mut last = None;
        while let Some(message) = messages.next().await {
            let message = message.map_err(|e| DomainError::infra("subscription fetch", e))?;
            let event = ChangeEvent::from_slice(&message.payload)
                .map_err(|e| DomainError::infra("json unmarshal", e))?;
            records.push(LogRecord::from(event));
            last = Some(message);
        }

        match last {
            Some(message) => {
                debug!(batch_size = records.len(), "fetched change events");
                Ok(EventBatch::new(records, Box::new(LastMessageAck { message })))
            }
            None => Ok(EventBatch::empty()),
        }
    }
}

/// `EventPublisher` that publishes to JetStream and waits for the stream's
/// ack.
#[derive(Clone)]
pub struct NatsEventPublisher {
    context: jetstream::Context,
    subject: String,
}

impl std::fmt::Debug for NatsEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsEventPublisher")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl NatsEventPublisher {
    /// Publishes on [`SUBJECT`].
    #[must_use]
    pub fn new(context: jetstream::Context) -> Self {
        Self {
            context,
            subject: SUBJECT.to_owned(),
        }
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), DomainError> {
        let payload = event
            .to_vec()
            .map_err(|e| DomainError::infra("json marshal", e))?;
        let ack = self
            .context
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| DomainError::infra("publish event", e))?;
        ack.await
            .map_err(|e| DomainError::infra("publish ack", e))?;
        Ok(())
    }
}
