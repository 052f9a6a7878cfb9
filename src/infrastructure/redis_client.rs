//! Shared Redis connection setup.

use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::info;

use crate::infrastructure::cache::{CacheError, CacheResult};

/// Connects to Redis and validates the connection with a PING.
///
/// The returned `ConnectionManager` is cheap to clone and reconnects on its
/// own; the resolution cache and the rate-limit counters share one.
///
/// # Errors
///
/// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection cannot
/// be established, or the PING health check fails.
pub async fn connect(redis_url: &str) -> CacheResult<ConnectionManager> {
    info!("Connecting to Redis");

    let client = Client::open(redis_url).map_err(|e| {
        CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
    })?;

    let manager = ConnectionManager::new(client).await.map_err(|e| {
        CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
    })?;

    let mut test_conn = manager.clone();
    test_conn
        .ping::<()>()
        .await
        .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

    info!("Connected to Redis");
    Ok(manager)
}
