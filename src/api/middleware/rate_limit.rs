//! Fixed-window rate limiting middleware.
//!
//! Counters live in the shared counter store (Redis when configured), so every
//! service instance enforces the same budget per caller.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::application::services::{RateLimitDecision, RateLimitPolicy, RateLimiter};
use crate::error::AppError;
use crate::utils::client_ip::client_identity;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Limiter and policy bound to one route group.
#[derive(Clone)]
pub struct RateLimitGate {
    limiter: Arc<RateLimiter>,
    policy: Arc<RateLimitPolicy>,
    behind_proxy: bool,
}

impl RateLimitGate {
    /// # Arguments
    ///
    /// - `behind_proxy` - when `true`, the caller is identified by
    ///   `X-Forwarded-For` / `X-Real-IP` instead of the peer socket address;
    ///   enable only behind a trusted reverse proxy
    pub fn new(limiter: Arc<RateLimiter>, policy: RateLimitPolicy, behind_proxy: bool) -> Self {
        Self {
            limiter,
            policy: Arc::new(policy),
            behind_proxy,
        }
    }
}

/// Counts the request against the gate's policy.
///
/// Rejected requests get `429 Too Many Requests` with `Retry-After`. When the
/// counter store answered, responses carry `X-RateLimit-Limit`,
/// `X-RateLimit-Remaining` and `X-RateLimit-Reset`; when it did not, the
/// request passes without them.
///
/// # Example
///
/// ```rust,ignore
/// let routes = Router::new()
///     .route("/shorten", post(shorten_handler))
///     .route_layer(middleware::from_fn_with_state(gate, rate_limit::layer));
/// ```
pub async fn layer(State(gate): State<RateLimitGate>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let caller = client_identity(req.headers(), peer, gate.behind_proxy);

    let decision = gate.limiter.check(&caller, &gate.policy).await;

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        AppError::too_many_requests("Too many requests", decision.retry_after_seconds())
            .into_response()
    };

    if decision.enforced {
        apply_headers(response.headers_mut(), &decision);
    }
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
}
