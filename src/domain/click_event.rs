//! Click event model for buffered click accounting.

/// A single successful resolution of a link, waiting to be counted.
///
/// Lives only in the [`crate::domain::click_aggregator::ClickAggregator`]
/// buffer and is destroyed when the buffer is flushed, whether or not the
/// flush commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    pub link_id: i64,
}

impl ClickEvent {
    pub fn new(link_id: i64) -> Self {
        Self { link_id }
    }
}
