//! Goods Relay — moves change events from the outbox to the analytical store.
//!
//! ```text
//! outbox ──OutboxRelay──▶ JetStream ──NatsBatchSource──▶ RelaySyncLoop ──▶ ClickHouseLogSink
//! ```
//!
//! Delivery is at-least-once: a batch is acknowledged only after the sink
//! persisted it.

pub mod backoff;
pub mod clickhouse_sink;
pub mod jetstream;
pub mod outbox_relay;
pub mod sync_loop;
