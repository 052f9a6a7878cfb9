use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{CounterError, CounterStore};

/// Expired entries are purged once the map grows past this many keys.
const PURGE_THRESHOLD: usize = 10_000;

struct Counter {
    value: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local counters.
///
/// Limits are enforced per instance only, so this is meant for single-node
/// deployments and tests.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Counter>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, CounterError> {
        let now = Instant::now();
        let mut counters = self.lock();

        if counters.len() > PURGE_THRESHOLD {
            counters.retain(|_, counter| !counter.is_expired(now));
        }

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        if counter.is_expired(now) {
            counter.value = 0;
            counter.expires_at = None;
        }
        counter.value += 1;

        Ok(counter.value)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), CounterError> {
        let now = Instant::now();
        if let Some(counter) = self.lock().get_mut(key) {
            counter.expires_at = Some(now + Duration::from_secs(seconds));
        }
        Ok(())
    }
}
