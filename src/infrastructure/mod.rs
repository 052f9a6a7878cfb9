//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain and application
//! layers.
//!
//! # Modules
//!
//! - [`cache`] - Resolution cache (Redis and no-op implementations)
//! - [`counter`] - Rate-limit counters (Redis and in-process implementations)
//! - [`persistence`] - Link store (PostgreSQL and in-memory implementations)
//! - [`redis_client`] - Shared Redis connection setup

pub mod cache;
pub mod counter;
pub mod persistence;
pub mod redis_client;
