//! Outbox sweep: publishes committed outbox rows onto the bus and marks them
//! published. Rows are never deleted.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use goods_core::error::DomainError;
use goods_core::relay::EventPublisher;
use goods_core::repository::OutboxRepository;

use crate::backoff::Backoff;

/// Publishes pending outbox rows in creation order.
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxRepository>,
    publisher: Arc<dyn EventPublisher>,
    batch_limit: i64,
    interval: Duration,
    backoff: Backoff,
}

impl std::fmt::Debug for OutboxRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxRelay")
            .field("batch_limit", &self.batch_limit)
            .field("interval", &self.interval)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl OutboxRelay {
    /// Creates a relay that reads at most `batch_limit` rows per sweep,
    /// polls every `interval` while the outbox is drained and waits per
    /// `backoff` after a failed sweep.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        publisher: Arc<dyn EventPublisher>,
        batch_limit: i64,
        interval: Duration,
        backoff: Backoff,
    ) -> Self {
        Self {
            outbox,
            publisher,
            batch_limit,
            interval,
            backoff,
        }
    }

    /// Publishes one batch of pending rows.
    ///
    /// Publishing stops at the first failure so ordering per good is kept;
    /// rows published before the failure are still marked. Returns how many
    /// rows were published.
    ///
    /// # Errors
    ///
    /// Returns the first publish error, or the store error if reading or
    /// marking the outbox fails.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<usize, DomainError> {
        let pending = self.outbox.pending_events(self.batch_limit).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut published = Vec::with_capacity(pending.len());
        let mut failure = None;
        for event in &pending {
            match self.publisher.publish(&event.to_change_event()).await {
                Ok(()) => published.push(event.outbox.event_id),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if !published.is_empty() {
            self.outbox.mark_published(&published).await?;
        }
        debug!(published = published.len(), pending = pending.len(), "outbox sweep");

        match failure {
            Some(err) => Err(err),
            None => Ok(published.len()),
        }
    }

    /// Sweeps until `shutdown` is cancelled. A full, non-empty sweep is
    /// followed immediately by another; a partial or empty one waits
    /// `interval`; failures back off.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("outbox relay started");
        let mut failures = 0_u32;

        while !shutdown.is_cancelled() {
            let wait = match self.sweep_once().await {
                Ok(count) => {
                    failures = 0;
                    let full = usize::try_from(self.batch_limit).is_ok_and(|limit| count >= limit);
                    if count > 0 && full {
                        continue;
                    }
                    self.interval
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let delay = self.backoff.delay(failures);
                    warn!(error = %err, attempt = failures, ?delay, "outbox sweep failed");
                    delay
                }
            };

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }
        }

        info!("outbox relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use goods_core::command::{CreateGood, UpdateGood};
    use goods_core::event::PendingEvent;
    use goods_core::repository::GoodRepository;
    use goods_test_support::{FailingGoodRepository, InMemoryGoodRepository, RecordingEventPublisher};
    use uuid::Uuid;

    use super::*;

    fn relay_over(
        outbox: Arc<dyn OutboxRepository>,
        publisher: Arc<dyn EventPublisher>,
        batch_limit: i64,
    ) -> OutboxRelay {
        OutboxRelay::new(
            outbox,
            publisher,
            batch_limit,
            Duration::from_millis(10),
            Backoff::default(),
        )
    }

    /// Empty outbox that counts reads and can be told to fail them.
    #[derive(Default)]
    struct CountingOutbox {
        reads: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl OutboxRepository for CountingOutbox {
        async fn pending_events(&self, _limit: i64) -> Result<Vec<PendingEvent>, DomainError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(DomainError::Infrastructure("connection refused".into()));
            }
            Ok(Vec::new())
        }

        async fn mark_published(&self, _event_ids: &[Uuid]) -> Result<(), DomainError> {
            Ok(())
        }
    }

    async fn seeded_repository(count: usize) -> Arc<InMemoryGoodRepository> {
        let repository = Arc::new(InMemoryGoodRepository::new());
        for n in 0..count {
            repository
                .create_good(&CreateGood {
                    project_id: 1,
                    name: format!("good-{n}"),
                })
                .await
                .unwrap();
        }
        repository
    }

    #[tokio::test]
    async fn test_sweep_publishes_pending_rows_in_order_and_marks_them() {
        // Arrange
        let repository = seeded_repository(3).await;
        let publisher = Arc::new(RecordingEventPublisher::new());
        let relay = relay_over(repository.clone(), publisher.clone(), 100);

        // Act
        let published = relay.sweep_once().await.unwrap();

        // Assert
        assert_eq!(published, 3);
        let names: Vec<_> = publisher.published().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["good-0", "good-1", "good-2"]);
        assert!(repository.pending_events(100).await.unwrap().is_empty());
        assert_eq!(repository.outbox_events().len(), 3);
    }

    #[tokio::test]
    async fn test_sweep_carries_current_state_and_outbox_time() {
        // Arrange
        let repository = seeded_repository(1).await;
        let id = repository.goods()[0].id;
        repository
            .update_good(&UpdateGood {
                id,
                project_id: 1,
                name: "renamed".into(),
                description: "fresh".into(),
            })
            .await
            .unwrap();
        let publisher = Arc::new(RecordingEventPublisher::new());
        let relay = relay_over(repository.clone(), publisher.clone(), 100);

        // Act
        relay.sweep_once().await.unwrap();

        // Assert
        let events = publisher.published();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.name == "renamed" && e.description == "fresh"));
        assert_eq!(events[0].event_time, repository.outbox_events()[0].created_at);
    }

    #[tokio::test]
    async fn test_sweep_stops_at_first_failure_and_keeps_the_rest_pending() {
        // Arrange
        let repository = seeded_repository(3).await;
        let publisher = Arc::new(RecordingEventPublisher::failing_after(1));
        let relay = relay_over(repository.clone(), publisher.clone(), 100);

        // Act
        let result = relay.sweep_once().await;

        // Assert
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(publisher.published().len(), 1);
        let pending = repository.pending_events(100).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].good.name, "good-1");
    }

    #[tokio::test]
    async fn test_sweep_respects_batch_limit() {
        // Arrange
        let repository = seeded_repository(5).await;
        let publisher = Arc::new(RecordingEventPublisher::new());
        let relay = relay_over(repository.clone(), publisher.clone(), 2);

        // Act
        let published = relay.sweep_once().await.unwrap();

        // Assert
        assert_eq!(published, 2);
        assert_eq!(repository.pending_events(100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sweep_propagates_store_errors() {
        let publisher = Arc::new(RecordingEventPublisher::new());
        let relay = relay_over(Arc::new(FailingGoodRepository), publisher.clone(), 100);

        let result = relay.sweep_once().await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_outbox_then_stops_on_cancel() {
        // Arrange
        let repository = seeded_repository(5).await;
        let publisher = Arc::new(RecordingEventPublisher::new());
        let relay = relay_over(repository.clone(), publisher.clone(), 2);
        let shutdown = CancellationToken::new();

        // Act
        let handle = tokio::spawn(relay.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        // Assert
        assert_eq!(publisher.published().len(), 5);
        assert!(repository.pending_events(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_batch_limit_waits_between_sweeps() {
        // Arrange
        let outbox = Arc::new(CountingOutbox::default());
        let relay = OutboxRelay::new(
            outbox.clone(),
            Arc::new(RecordingEventPublisher::new()),
            0,
            Duration::from_millis(50),
            Backoff::default(),
        );
        let shutdown = CancellationToken::new();

        // Act
        let handle = tokio::spawn(relay.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay did not stop")
            .unwrap();

        // Assert
        let reads = outbox.reads.load(Ordering::SeqCst);
        assert!((1..=6).contains(&reads), "outbox read {reads} times");
    }

    #[tokio::test]
    async fn test_failed_sweeps_follow_configured_backoff() {
        // Arrange
        let outbox = Arc::new(CountingOutbox::default());
        outbox.failing.store(true, Ordering::SeqCst);
        let relay = OutboxRelay::new(
            outbox.clone(),
            Arc::new(RecordingEventPublisher::new()),
            100,
            Duration::from_millis(10),
            Backoff {
                initial: Duration::from_secs(60),
                max: Duration::from_secs(60),
                factor: 2,
            },
        );
        let shutdown = CancellationToken::new();

        // Act
        let handle = tokio::spawn(relay.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay did not stop during backoff")
            .unwrap();

        // Assert
        assert_eq!(outbox.reads.load(Ordering::SeqCst), 1);
    }
}
