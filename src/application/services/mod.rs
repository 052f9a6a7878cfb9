//! Business logic services for the application layer.

pub mod link_service;
pub mod rate_limiter;

pub use link_service::LinkService;
pub use rate_limiter::{RateLimitDecision, RateLimitPolicy, RateLimiter};
