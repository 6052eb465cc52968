//! Outbox rows, change-event messages and analytical log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::good::Good;

/// A pending change notification, written in the same transaction as the
/// mutation it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEvent {
    /// Unique event token.
    pub event_id: Uuid,
    /// The mutated good.
    pub good_id: i64,
    /// Owning project of the mutated good.
    pub project_id: i64,
    /// When the outbox row was written.
    pub created_at: DateTime<Utc>,
}

/// An outbox row joined with the current state of its good, ready to be
/// published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// The outbox row.
    pub outbox: OutboxEvent,
    /// The good as it is now.
    pub good: Good,
}

impl PendingEvent {
    /// Projects the row onto the bus message.
    #[must_use]
    pub fn to_change_event(&self) -> ChangeEvent {
        ChangeEvent::from_good(&self.good, self.outbox.created_at)
    }
}

/// Wire projection of a good mutation, carried as JSON on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// The good identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Name after the mutation.
    pub name: String,
    /// Description after the mutation.
    pub description: String,
    /// Priority after the mutation.
    pub priority: i32,
    /// Removed flag after the mutation.
    pub removed: bool,
    /// When the mutation was recorded.
    pub event_time: DateTime<Utc>,
}

impl ChangeEvent {
    /// Builds a change event from a good's state.
    #[must_use]
    pub fn from_good(good: &Good, event_time: DateTime<Utc>) -> Self {
        Self {
            id: good.id,
            project_id: good.project_id,
            name: good.name.clone(),
            description: good.description.clone(),
            priority: good.priority,
            removed: good.removed,
            event_time,
        }
    }

    /// Decodes a bus payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload is not a change event.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encodes the event as a bus payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if encoding fails.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Append-only analytical row. Same shape as [`ChangeEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// The good identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Name after the mutation.
    pub name: String,
    /// Description after the mutation.
    pub description: String,
    /// Priority after the mutation.
    pub priority: i32,
    /// Removed flag after the mutation.
    pub removed: bool,
    /// When the mutation was recorded.
    pub event_time: DateTime<Utc>,
}

impl From<ChangeEvent> for LogRecord {
    fn from(event: ChangeEvent) -> Self {
        Self {
            id: event.id,
            project_id: event.project_id,
            name: event.name,
            description: event.description,
            priority: event.priority,
            removed: event.removed,
            event_time: event.event_time,
        }
    }
}
