//! Test relay fakes: scripted batch source, flaky sink and recording
//! publisher sharing one journal so tests can assert on ordering.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use goods_core::error::DomainError;
use goods_core::event::{ChangeEvent, LogRecord};
use goods_core::relay::{BatchAcknowledger, EventBatch, EventBatchSource, EventPublisher, LogSink};

/// One observable step of the relay pipeline. The payload is the batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalEntry {
    /// The source handed out a non-empty batch.
    Fetched(usize),
    /// The sink rejected a batch.
    AppendFailed(usize),
    /// The sink persisted a batch.
    Appended(usize),
    /// A batch was acknowledged.
    Acknowledged(usize),
}

/// Shared, ordered log of relay steps.
#[derive(Debug, Clone, Default)]
pub struct RelayJournal(Arc<Mutex<Vec<JournalEntry>>>);

impl RelayJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn record(&self, entry: JournalEntry) {
        self.0.lock().unwrap().push(entry);
    }

    /// Returns a snapshot of all entries in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.0.lock().unwrap().clone()
    }

    /// Number of acknowledgements recorded so far.
    pub fn acknowledgements(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| matches!(e, JournalEntry::Acknowledged(_)))
            .count()
    }
}

struct JournalAcknowledger {
    journal: RelayJournal,
    size: usize,
}

#[async_trait]
impl BatchAcknowledger for JournalAcknowledger {
    async fn acknowledge(self: Box<Self>) -> Result<(), DomainError> {
        self.journal.record(JournalEntry::Acknowledged(self.size));
        Ok(())
    }
}

/// A batch source that plays back a fixed script, then returns empty batches
/// forever.
#[derive(Debug)]
pub struct ScriptedBatchSource {
    script: Mutex<VecDeque<Result<Vec<LogRecord>, DomainError>>>,
    journal: RelayJournal,
    fetches: AtomicUsize,
}

impl ScriptedBatchSource {
    /// Creates a source that yields `script` in order.
    #[must_use]
    pub fn new(
        script: impl IntoIterator<Item = Result<Vec<LogRecord>, DomainError>>,
        journal: RelayJournal,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            journal,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch_batch` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventBatchSource for ScriptedBatchSource {
    async fn fetch_batch(&self, max_size: usize) -> Result<EventBatch, DomainError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut records)) if !records.is_empty() => {
                records.truncate(max_size);
                let size = records.len();
                self.journal.record(JournalEntry::Fetched(size));
                Ok(EventBatch::new(
                    records,
                    Box::new(JournalAcknowledger {
                        journal: self.journal.clone(),
                        size,
                    }),
                ))
            }
            Some(Err(err)) => Err(err),
            Some(Ok(_)) | None => Ok(EventBatch::empty()),
        }
    }
}

/// A sink that rejects the first `failures` appends, then persists.
#[derive(Debug)]
pub struct ScriptedLogSink {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    persisted: Mutex<Vec<Vec<LogRecord>>>,
    journal: RelayJournal,
}

impl ScriptedLogSink {
    /// Creates a sink that fails `failures` times before succeeding.
    #[must_use]
    pub fn failing_times(failures: usize, journal: RelayJournal) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            persisted: Mutex::new(Vec::new()),
            journal,
        }
    }

    /// Number of `append_batch` calls so far.
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns every persisted batch.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn persisted(&self) -> Vec<Vec<LogRecord>> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSink for ScriptedLogSink {
    async fn append_batch(&self, records: &[LogRecord]) -> Result<(), DomainError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            self.journal.record(JournalEntry::AppendFailed(records.len()));
            return Err(DomainError::Sink("insert timed out".into()));
        }
        self.persisted.lock().unwrap().push(records.to_vec());
        self.journal.record(JournalEntry::Appended(records.len()));
        Ok(())
    }
}

/// A publisher that records events and optionally starts failing after a
/// number of successful publishes.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published: Mutex<Vec<ChangeEvent>>,
    fail_after: Option<usize>,
}

impl RecordingEventPublisher {
    /// Creates a publisher that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that fails once `successes` events were published.
    #[must_use]
    pub fn failing_after(successes: usize) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_after: Some(successes),
        }
    }

    /// Returns every published event.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<ChangeEvent> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), DomainError> {
        let mut published = self.published.lock().unwrap();
        if self.fail_after.is_some_and(|limit| published.len() >= limit) {
            return Err(DomainError::Infrastructure("bus unavailable".into()));
        }
        published.push(event.clone());
        Ok(())
    }
}
