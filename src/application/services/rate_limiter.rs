//! Fixed-window request limiter backed by shared counters.
//!
//! Each caller gets one counter per policy. The first request in a window
//! creates the counter and sets its expiry; later requests only increment it.
//! The limiter fails open: if the counter store errors or does not answer in
//! time, the request is allowed and the decision is marked as not enforced.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::infrastructure::counter::CounterStore;
use crate::utils::deadline;

/// Default bound on a single counter call.
pub const DEFAULT_COUNTER_TIMEOUT: Duration = Duration::from_millis(100);

/// Limits applied to one route group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window_seconds: u64,
    pub max_requests: u64,
    pub key_prefix: String,
}

impl RateLimitPolicy {
    pub fn new(window_seconds: u64, max_requests: u64, key_prefix: impl Into<String>) -> Self {
        Self {
            window_seconds,
            max_requests,
            key_prefix: key_prefix.into(),
        }
    }

    /// 30 link creations per minute.
    pub fn create_default() -> Self {
        Self::new(60, 30, "rl:create")
    }

    /// 300 redirects per minute.
    pub fn redirect_default() -> Self {
        Self::new(60, 300, "rl:redirect")
    }

    fn key_for(&self, caller: &str) -> String {
        format!("{}:{}", self.key_prefix, caller)
    }
}

/// Result of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Approximate end of the window, in Unix seconds.
    pub reset_at: i64,
    /// `false` when the counter store was unavailable and the request was let
    /// through unchecked.
    pub enforced: bool,
}

impl RateLimitDecision {
    /// Seconds a rejected caller should wait, never less than one.
    pub fn retry_after_seconds(&self) -> u64 {
        let remaining = self.reset_at - Utc::now().timestamp();
        u64::try_from(remaining).unwrap_or(0).max(1)
    }
}

/// Checks callers against a [`RateLimitPolicy`].
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { counters, timeout }
    }

    /// Counts one request from `caller` and decides whether it may proceed.
    pub async fn check(&self, caller: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let key = policy.key_for(caller);
        let window = i64::try_from(policy.window_seconds).unwrap_or(i64::MAX);
        let reset_at = Utc::now().timestamp().saturating_add(window);

        let count = match deadline::within(self.timeout, self.counters.incr(&key)).await {
            Some(Ok(count)) => count,
            Some(Err(e)) => {
                warn!("Rate limit check for {} failed, allowing request: {}", key, e);
                return fail_open(policy, reset_at);
            }
            None => {
                warn!(
                    "Rate limit check for {} timed out after {:?}, allowing request",
                    key, self.timeout
                );
                return fail_open(policy, reset_at);
            }
        };

        if count == 1 {
            self.start_window(&key, policy.window_seconds).await;
        }

        let used = u64::try_from(count).unwrap_or(0);
        if used > policy.max_requests {
            debug!("Rate limit exceeded for {} ({} requests)", key, used);
            return RateLimitDecision {
                allowed: false,
                limit: policy.max_requests,
                remaining: 0,
                reset_at,
                enforced: true,
            };
        }

        RateLimitDecision {
            allowed: true,
            limit: policy.max_requests,
            remaining: policy.max_requests - used,
            reset_at,
            enforced: true,
        }
    }

    // A failure here leaves the counter without expiry until the next
    // window-opening request on a fresh key; it is only logged.
    async fn start_window(&self, key: &str, window_seconds: u64) {
        match deadline::within(self.timeout, self.counters.expire(key, window_seconds)).await {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!("Failed to set expiry on {}: {}", key, e),
            None => warn!("Setting expiry on {} timed out", key),
        }
    }
}

fn fail_open(policy: &RateLimitPolicy, reset_at: i64) -> RateLimitDecision {
    RateLimitDecision {
        allowed: true,
        limit: policy.max_requests,
        remaining: policy.max_requests,
        reset_at,
        enforced: false,
    }
}
