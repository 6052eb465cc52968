//! `RelaySyncLoop`: drains the event bus into the analytical sink.
//!
//! One batch is in flight at a time. A batch is acknowledged only after the
//! sink persisted it; until then the loop keeps retrying that same batch with
//! bounded exponential backoff. Cancellation is observed between cycles,
//! during waits and while a fetch is outstanding, never during an append or
//! between a successful append and its acknowledgement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use goods_core::relay::{EventBatch, EventBatchSource, LogSink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::Backoff;

/// Tuning for [`RelaySyncLoop`].
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Maximum messages per fetch.
    pub batch_size: usize,
    /// Wait schedule after a failed fetch or append.
    pub backoff: Backoff,
    /// Wait after an empty fetch.
    pub idle_interval: Duration,
    /// Upper bound for one fetch. Should exceed the source's own pull
    /// timeout.
    pub fetch_timeout: Duration,
    /// Upper bound for one sink append.
    pub append_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            backoff: Backoff::default(),
            idle_interval: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(30),
            append_timeout: Duration::from_secs(30),
        }
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelayState {
    /// Fetching or persisting batches.
    #[default]
    Running,
    /// Waiting before retrying; `attempt` counts consecutive failures.
    Backoff {
        /// Consecutive failures so far.
        attempt: u32,
    },
    /// Cancelled; the loop has returned.
    Stopped,
}

/// Operator-facing counters and the current [`RelayState`], shared with
/// whoever holds the `Arc`.
#[derive(Debug, Default)]
pub struct RelayStats {
    state: Mutex<RelayState>,
    batches_persisted: AtomicU64,
    records_persisted: AtomicU64,
    empty_polls: AtomicU64,
    fetch_failures: AtomicU64,
    append_failures: AtomicU64,
    ack_failures: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// Batches appended and acknowledged (or ack attempted).
    pub batches_persisted: u64,
    /// Records in those batches.
    pub records_persisted: u64,
    /// Fetches that returned nothing.
    pub empty_polls: u64,
    /// Failed fetches.
    pub fetch_failures: u64,
    /// Failed or timed-out appends.
    pub append_failures: u64,
    /// Acknowledgements the bus rejected after a successful append.
    pub ack_failures: u64,
}

impl RelayStats {
    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            batches_persisted: self.batches_persisted.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
        }
    }

    /// The loop's current state.
    #[must_use]
    pub fn state(&self) -> RelayState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: RelayState) -> RelayState {
        std::mem::replace(
            &mut *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            next,
        )
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

enum Cycle {
    Persisted,
    Idle,
    Failed,
    Cancelled,
}

/// The long-running relay driver. Run exactly one per durable subscription.
pub struct RelaySyncLoop {
    source: Arc<dyn EventBatchSource>,
    sink: Arc<dyn LogSink>,
    config: RelayConfig,
    stats: Arc<RelayStats>,
}

impl std::fmt::Debug for RelaySyncLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySyncLoop")
            .field("config", &self.config)
            .field("state", &self.stats.state())
            .finish_non_exhaustive()
    }
}

impl RelaySyncLoop {
    /// Creates a loop in the `Running` state.
    #[must_use]
    pub fn new(
        source: Arc<dyn EventBatchSource>,
        sink: Arc<dyn LogSink>,
        config: RelayConfig,
    ) -> Self {
        Self {
            source,
            sink,
            config,
            stats: Arc::new(RelayStats::default()),
        }
    }

    /// Handle to the loop's counters and state. Stays valid after `run`
    /// consumed the loop.
    #[must_use]
    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    fn transition(&self, next: RelayState) {
        let previous = self.stats.set_state(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "relay state change");
        }
    }

    /// Runs until `shutdown` is cancelled and returns the final counters.
    ///
    /// A batch still waiting for a successful append when cancellation
    /// arrives is dropped unacknowledged, so the bus redelivers it.
    pub async fn run(self, shutdown: CancellationToken) -> RelayStatsSnapshot {
        info!(batch_size = self.config.batch_size, "relay sync loop started");
        let mut pending: Option<EventBatch> = None;
        let mut attempt: u32 = 0;

        while !shutdown.is_cancelled() {
            let wait = match self.cycle(&mut pending, &shutdown).await {
                Cycle::Persisted => {
                    attempt = 0;
                    self.transition(RelayState::Running);
                    continue;
                }
                Cycle::Idle => {
                    attempt = 0;
                    self.transition(RelayState::Running);
                    self.config.idle_interval
                }
                Cycle::Failed => {
                    attempt = attempt.saturating_add(1);
                    self.transition(RelayState::Backoff { attempt });
                    let delay = self.config.backoff.delay(attempt);
                    debug!(attempt, delay_ms = delay.as_millis(), "relay backing off");
                    delay
                }
                Cycle::Cancelled => break,
            };

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }
        }

        self.transition(RelayState::Stopped);
        if let Some(batch) = pending {
            warn!(
                records = batch.len(),
                "relay stopped with an unpersisted batch; left unacknowledged for redelivery"
            );
        }
        let stats = self.stats.snapshot();
        info!(?stats, "relay sync loop stopped");
        stats
    }

    /// One fetch → append → acknowledge pass. A batch whose append failed is
    /// put back into `pending` and retried on the next cycle instead of
    /// fetching a new one. Only the fetch races `shutdown`; nothing has been
    /// acknowledged at that point.
    #[instrument(skip_all, fields(retrying = pending.is_some()))]
    async fn cycle(&self, pending: &mut Option<EventBatch>, shutdown: &CancellationToken) -> Cycle {
        let batch = match pending.take() {
            Some(batch) => batch,
            None => {
                let fetch = tokio::time::timeout(
                    self.config.fetch_timeout,
                    self.source.fetch_batch(self.config.batch_size),
                );
                let fetched = tokio::select! {
                    () = shutdown.cancelled() => return Cycle::Cancelled,
                    fetched = fetch => fetched,
                };
                match fetched {
                    Ok(Ok(batch)) if batch.is_empty() => {
                        RelayStats::bump(&self.stats.empty_polls);
                        return Cycle::Idle;
                    }
                    Ok(Ok(batch)) => batch,
                    Ok(Err(err)) => {
                        RelayStats::bump(&self.stats.fetch_failures);
                        warn!(error = %err, "relay fetch failed");
                        return Cycle::Failed;
                    }
                    Err(_) => {
                        RelayStats::bump(&self.stats.fetch_failures);
                        warn!(
                            timeout_ms = self.config.fetch_timeout.as_millis(),
                            "relay fetch timed out"
                        );
                        return Cycle::Failed;
                    }
                }
            }
        };

        let size = batch.len();
        let appended =
            tokio::time::timeout(self.config.append_timeout, self.sink.append_batch(&batch.records))
                .await;
        match appended {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                RelayStats::bump(&self.stats.append_failures);
                warn!(batch_size = size, error = %err, "relay append failed");
                *pending = Some(batch);
                return Cycle::Failed;
            }
            Err(_) => {
                RelayStats::bump(&self.stats.append_failures);
                warn!(
                    batch_size = size,
                    timeout_ms = self.config.append_timeout.as_millis(),
                    "relay append timed out"
                );
                *pending = Some(batch);
                return Cycle::Failed;
            }
        }

        RelayStats::bump(&self.stats.batches_persisted);
        self.stats
            .records_persisted
            .fetch_add(size as u64, Ordering::Relaxed);

        if let Err(err) = batch.acknowledge().await {
            RelayStats::bump(&self.stats.ack_failures);
            warn!(batch_size = size, error = %err, "batch persisted but acknowledgement failed; expect redelivery");
        } else {
            debug!(batch_size = size, "batch persisted and acknowledged");
        }
        Cycle::Persisted
    }
}
