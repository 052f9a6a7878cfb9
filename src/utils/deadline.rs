//! Time-bounded access to advisory dependencies.

use std::future::Future;
use std::time::Duration;

/// Races `operation` against a timer of length `limit`.
///
/// Returns `Some(output)` if the operation finishes first and `None` once the
/// timer elapses. On timeout the operation future is dropped; whatever it
/// would have produced is never observed by the caller.
///
/// Used for cache and rate-limit counter calls, where a slow answer is worth
/// less than no answer.
pub async fn within<F, T>(limit: Duration, operation: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, operation).await.ok()
}
