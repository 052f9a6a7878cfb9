//! Core domain entities.
//!
//! - [`Link`] - A stored short link with accounting fields
//! - [`LinkSnapshot`] - The resolution-relevant subset, also the cached form
//! - [`NewLink`] / [`CreatedLink`] - Creation input and output

pub mod link;

pub use link::{CreatedLink, Link, LinkSnapshot, LinkStatus, NewLink};
