//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`        - Short link redirect (rate limited, `rl:redirect`)
//! - `POST /api/shorten`   - Link creation (rate limited, `rl:create`)
//! - `GET  /health`        - Health check: DB, cache, click buffer
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Fixed window per caller, shared across instances
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{health_handler, redirect_handler};
use crate::api::middleware::rate_limit::{self, RateLimitGate};
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Builds the routes and middleware without path normalization.
pub fn build_router(state: AppState) -> Router {
    let create_gate = RateLimitGate::new(
        state.rate_limiter.clone(),
        state.create_limit.clone(),
        state.behind_proxy,
    );
    let redirect_gate = RateLimitGate::new(
        state.rate_limiter.clone(),
        state.redirect_limit.clone(),
        state.behind_proxy,
    );

    let api_router = api::routes::api_routes()
        .route_layer(middleware::from_fn_with_state(create_gate, rate_limit::layer));

    let redirect_router = Router::new()
        .route("/{code}", get(redirect_handler))
        .route_layer(middleware::from_fn_with_state(
            redirect_gate,
            rate_limit::layer,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(redirect_router)
        .nest("/api", api_router)
        .with_state(state)
        .layer(tracing::layer())
}

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}
