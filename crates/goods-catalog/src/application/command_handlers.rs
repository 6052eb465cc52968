//! Command handlers for the goods catalog.
//!
//! Each handler validates, runs the store mutation (one transaction that also
//! writes the outbox row) and then drops the cached list page. The cache is
//! only touched after the store call returned successfully.

use goods_core::cache::GoodsListCache;
use goods_core::command::{Command, CreateGood, DeleteGood, ReprioritizeGood, UpdateGood};
use goods_core::error::DomainError;
use goods_core::good::{Good, GoodPriority};
use goods_core::repository::GoodRepository;
use tracing::{debug, warn};

use crate::domain::validation;

/// Drops the cached list page after a committed mutation.
///
/// A failure here does not undo the mutation; it is reported as
/// `DomainError::CacheInvalidation` so the caller knows the cache may serve
/// the previous page until its TTL runs out.
async fn invalidate_list(cache: &dyn GoodsListCache, command: &dyn Command) -> Result<(), DomainError> {
    match cache.delete().await {
        Ok(()) => {
            debug!(command = command.command_type(), "goods list cache invalidated");
            Ok(())
        }
        Err(err) => {
            warn!(
                command = command.command_type(),
                error = %err,
                "mutation committed but goods list cache invalidation failed"
            );
            Err(DomainError::CacheInvalidation(err.to_string()))
        }
    }
}

/// Handles `CreateGood`.
///
/// # Errors
///
/// Returns `DomainError::BadRequest` on invalid input, the store error if the
/// insert fails, or `DomainError::CacheInvalidation` if the good was created
/// but the cache could not be cleared.
pub async fn handle_create_good(
    command: &CreateGood,
    repo: &dyn GoodRepository,
    cache: &dyn GoodsListCache,
) -> Result<Good, DomainError> {
    validation::validate_create(command)?;
    let good = repo.create_good(command).await?;
    invalidate_list(cache, command).await?;
    Ok(good)
}

/// Handles `UpdateGood`.
///
/// # Errors
///
/// Returns `DomainError::BadRequest` on invalid input,
/// `DomainError::NotFound` if no good matches `(id, project_id)`, the store
/// error if the transaction fails, or `DomainError::CacheInvalidation`.
pub async fn handle_update_good(
    command: &UpdateGood,
    repo: &dyn GoodRepository,
    cache: &dyn GoodsListCache,
) -> Result<Good, DomainError> {
    validation::validate_update(command)?;
    let good = repo.update_good(command).await?;
    invalidate_list(cache, command).await?;
    Ok(good)
}

/// Handles `DeleteGood` (soft delete).
///
/// # Errors
///
/// Same as [`handle_update_good`].
pub async fn handle_delete_good(
    command: &DeleteGood,
    repo: &dyn GoodRepository,
    cache: &dyn GoodsListCache,
) -> Result<(), DomainError> {
    validation::validate_delete(command)?;
    repo.delete_good(command).await?;
    invalidate_list(cache, command).await
}

/// Handles `ReprioritizeGood`.
///
/// # Errors
///
/// Same as [`handle_update_good`]; a priority below 1 is a bad request.
pub async fn handle_reprioritize_good(
    command: &ReprioritizeGood,
    repo: &dyn GoodRepository,
    cache: &dyn GoodsListCache,
) -> Result<Vec<GoodPriority>, DomainError> {
    validation::validate_reprioritize(command)?;
    let priorities = repo.reprioritize_good(command).await?;
    invalidate_list(cache, command).await?;
    Ok(priorities)
}
