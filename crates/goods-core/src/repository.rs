//! Relational store ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::command::{CreateGood, DeleteGood, ListGoods, ReprioritizeGood, UpdateGood};
use crate::error::DomainError;
use crate::event::PendingEvent;
use crate::good::{Good, GoodPriority, GoodsList};

/// Authoritative storage for goods.
///
/// Every mutating method runs as one transaction that changes the good and
/// appends exactly one outbox row. Lookups are scoped by `(id, project_id)`;
/// a good that exists in another project is reported as
/// [`DomainError::NotFound`].
#[async_trait]
pub trait GoodRepository: Send + Sync {
    /// Inserts a new good and its outbox row.
    async fn create_good(&self, command: &CreateGood) -> Result<Good, DomainError>;

    /// Replaces name and description under a row lock.
    async fn update_good(&self, command: &UpdateGood) -> Result<Good, DomainError>;

    /// Marks the good removed under a row lock.
    async fn delete_good(&self, command: &DeleteGood) -> Result<(), DomainError>;

    /// Reads one page. The returned list holds every scanned row.
    async fn list_goods(&self, query: &ListGoods) -> Result<GoodsList, DomainError>;

    /// Stores the requested priority and returns the rows it changed.
    async fn reprioritize_good(
        &self,
        command: &ReprioritizeGood,
    ) -> Result<Vec<GoodPriority>, DomainError>;
}

/// Read side of the outbox used by the publishing sweep.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Returns up to `limit` unpublished rows, oldest first, joined with the
    /// current state of their goods.
    async fn pending_events(&self, limit: i64) -> Result<Vec<PendingEvent>, DomainError>;

    /// Marks the given rows as published.
    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), DomainError>;
}
