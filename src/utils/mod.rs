//! Utility functions shared across layers.
//!
//! - [`base62`] - Id to short code codec
//! - [`deadline`] - Timeout race for advisory dependencies
//! - [`client_ip`] - Caller identity extraction from requests

pub mod base62;
pub mod client_ip;
pub mod deadline;
