//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The caller supplied invalid input. Never retried.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No good exists for the project-scoped identity.
    #[error("good not found: id {id} in project {project_id}")]
    NotFound {
        /// The requested good identifier.
        id: i64,
        /// The project the lookup was scoped to.
        project_id: i64,
    },

    /// The mutation committed but the goods list cache could not be
    /// invalidated.
    #[error("cache invalidation failed: {0}")]
    CacheInvalidation(String),

    /// A transaction step failed and rolling back failed as well.
    #[error("{cause} (rollback failed: {rollback})")]
    TransactionAborted {
        /// The error that aborted the transaction.
        cause: Box<DomainError>,
        /// The rollback failure message.
        rollback: String,
    },

    /// The analytical sink did not persist a batch.
    #[error("sink error: {0}")]
    Sink(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Wraps any displayable infrastructure failure with a short context
    /// prefix, e.g. `DomainError::infra("begin tx", err)`.
    pub fn infra(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Infrastructure(format!("{context}: {err}"))
    }
}
