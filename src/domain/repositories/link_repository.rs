//! Repository traits for link storage.

use std::collections::HashMap;

use crate::domain::entities::{Link, LinkSnapshot, NewLink};
use crate::error::AppError;
use async_trait::async_trait;

/// A single transaction against the link store.
///
/// Obtained from [`LinkRepository::begin`]. Nothing written through a unit of
/// work is visible to other readers until [`commit`](Self::commit) succeeds.
/// Dropping an uncommitted unit rolls it back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkUnitOfWork: Send {
    /// Inserts a link row with no code and returns its assigned id.
    async fn insert(&mut self, new_link: &NewLink) -> Result<i64, AppError>;

    /// Sets the code of a row inserted in this unit.
    async fn set_code(&mut self, id: i64, code: &str) -> Result<(), AppError>;

    /// Commits every statement of this unit.
    async fn commit(&mut self) -> Result<(), AppError>;

    /// Discards every statement of this unit.
    async fn rollback(&mut self) -> Result<(), AppError>;
}

/// Repository interface for the durable link store.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::InMemoryLinkRepository`] - Process-local store
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Opens a transaction for multi-statement writes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if no connection could be acquired.
    async fn begin(&self) -> Result<Box<dyn LinkUnitOfWork>, AppError>;

    /// Finds the resolution view of a link by its code.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(LinkSnapshot))` if a committed link has this code
    /// - `Ok(None)` otherwise
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_code(&self, code: &str) -> Result<Option<LinkSnapshot>, AppError>;

    /// Finds the full link record, including accounting fields.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_details(&self, code: &str) -> Result<Option<Link>, AppError>;

    /// Applies `access_count += count, last_accessed_at = now()` for every
    /// entry, all in one transaction.
    ///
    /// Ids that no longer exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the transaction fails; no update from
    /// the batch is applied in that case.
    async fn increment_access_batch(&self, counts: &HashMap<i64, u64>) -> Result<(), AppError>;

    /// Activates or deactivates a link. Returns `false` if no link has this code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn set_active(&self, code: &str, active: bool) -> Result<bool, AppError>;

    /// Checks that the store answers queries.
    async fn health_check(&self) -> bool;
}
