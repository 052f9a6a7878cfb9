//! Shared counters backing the fixed-window rate limiter.
//!
//! - [`RedisCounterStore`] - Counters shared by every service instance
//! - [`InMemoryCounterStore`] - Per-process counters when Redis is not configured

mod memory_counter;
mod redis_counter;

use async_trait::async_trait;
use thiserror::Error;

pub use memory_counter::InMemoryCounterStore;
pub use redis_counter::RedisCounterStore;

/// Errors returned by a counter store.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Counter store error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CounterError {
    fn from(e: redis::RedisError) -> Self {
        CounterError::Backend(e.to_string())
    }
}

/// Atomic per-key counters with expiry.
///
/// Increments on the same key are linearized by the store. Callers bound each
/// call in time themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments `key` by one and returns the new value.
    ///
    /// A missing or expired key starts from zero.
    async fn incr(&self, key: &str) -> Result<i64, CounterError>;

    /// Sets `key` to expire `seconds` from now.
    async fn expire(&self, key: &str, seconds: u64) -> Result<(), CounterError>;
}
