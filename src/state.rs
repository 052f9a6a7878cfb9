//! Shared application state injected into handlers.

use std::sync::Arc;

use crate::application::services::{LinkService, RateLimitPolicy, RateLimiter};
use crate::domain::click_aggregator::ClickAggregator;

/// Services and settings shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService>,
    pub click_aggregator: Arc<ClickAggregator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub create_limit: RateLimitPolicy,
    pub redirect_limit: RateLimitPolicy,
    /// Public base URL short links are built on, without a trailing slash.
    pub base_url: String,
    pub behind_proxy: bool,
}

impl AppState {
    pub fn new(
        link_service: Arc<LinkService>,
        click_aggregator: Arc<ClickAggregator>,
        rate_limiter: Arc<RateLimiter>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            link_service,
            click_aggregator,
            rate_limiter,
            create_limit: RateLimitPolicy::create_default(),
            redirect_limit: RateLimitPolicy::redirect_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            behind_proxy: false,
        }
    }

    /// Overrides the per-route rate-limit policies.
    pub fn with_rate_limits(mut self, create: RateLimitPolicy, redirect: RateLimitPolicy) -> Self {
        self.create_limit = create;
        self.redirect_limit = redirect;
        self
    }

    /// Identifies callers by forwarding headers instead of the peer address.
    pub fn with_behind_proxy(mut self, behind_proxy: bool) -> Self {
        self.behind_proxy = behind_proxy;
        self
    }
}
