//! Application layer services implementing business logic.
//!
//! Services coordinate the link store, the resolution cache and the click
//! aggregator, and provide a small API for HTTP handlers and the admin CLI.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Short link creation and resolution
//! - [`services::rate_limiter::RateLimiter`] - Fixed-window, fail-open request limiting

pub mod services;
