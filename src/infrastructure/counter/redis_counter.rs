use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use super::{CounterError, CounterStore};

/// Counters stored in Redis with `INCR` and `EXPIRE`.
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, CounterError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr::<_, _, i64>(key, 1).await?)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), CounterError> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        conn.expire::<_, ()>(key, seconds).await?;
        Ok(())
    }
}
