use thiserror::Error;

use crate::cache::RecomputeError;
use crate::domain::error::DomainError;
use crate::store::StoreError;

/// Engine-level error taxonomy.
///
/// Conflicts are transient and worth retrying at the caller's level; every
/// other variant is final for the request that produced it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("aggregation window must be a positive number of days, got {days}")]
    InvalidWindow { days: i64 },
    #[error(transparent)]
    Recompute(#[from] RecomputeError),
}

impl EngineError {
    /// True for transient failures a caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict(_)))
    }
}
