//! Domain layer containing business entities and logic.
//!
//! Defines the link model, the outcome of resolving a code, the repository
//! contract for the durable link store, and the click aggregator. Nothing here
//! depends on PostgreSQL, Redis or HTTP.
//!
//! # Architecture
//!
//! - [`entities`] - Link and its derived views
//! - [`resolution`] - The four possible answers for a code
//! - [`repositories`] - Link store trait definitions
//! - [`click_event`] - A single recorded click
//! - [`click_aggregator`] - In-process click buffer with batched flushes
//!
//! # Click Processing Flow
//!
//! 1. A successful resolution calls [`click_aggregator::ClickAggregator::enqueue`]
//! 2. The periodic flusher drains up to one batch and coalesces it per link
//! 3. Deltas are committed in one transaction via
//!    [`repositories::LinkRepository::increment_access_batch`]

pub mod click_aggregator;
pub mod click_event;
pub mod entities;
pub mod repositories;
pub mod resolution;
