//! In-process click buffer with periodic batched flushes.
//!
//! Resolution calls [`ClickAggregator::enqueue`] on every successful redirect;
//! a background task started with [`ClickAggregator::spawn_flusher`] drains the
//! buffer every few seconds, coalesces clicks per link, and commits the deltas
//! in one transaction through [`LinkRepository::increment_access_batch`].
//!
//! Accounting is best-effort: a failed flush discards its batch, and clicks
//! arriving while the buffer is full are dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::LinkRepository;

/// Default number of events drained per flush.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Default upper bound on buffered events.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// What a single flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReport {
    /// Nothing was buffered.
    Empty,
    /// Another flush was already running; nothing was drained.
    Busy,
    /// `clicks` events for `links` distinct links were committed.
    Committed { clicks: usize, links: usize },
    /// The commit failed and `discarded` events were dropped.
    Failed { discarded: usize },
}

/// Owned click buffer shared by all resolution calls.
pub struct ClickAggregator {
    buffer: Mutex<VecDeque<ClickEvent>>,
    // Serializes flushes. Never held while `buffer` is locked for appends.
    flush_lock: tokio::sync::Mutex<()>,
    links: Arc<dyn LinkRepository>,
    capacity: usize,
    max_batch_size: usize,
    dropped: AtomicU64,
}

impl ClickAggregator {
    /// Creates an aggregator writing to `links`.
    ///
    /// `capacity` and `max_batch_size` are clamped to at least 1.
    pub fn new(links: Arc<dyn LinkRepository>, capacity: usize, max_batch_size: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            flush_lock: tokio::sync::Mutex::new(()),
            links,
            capacity: capacity.max(1),
            max_batch_size: max_batch_size.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Buffers one click for `link_id`.
    ///
    /// Never blocks on I/O. Returns `false` if the buffer is full and the
    /// click was dropped.
    pub fn enqueue(&self, link_id: i64) -> bool {
        {
            let mut buffer = self.lock_buffer();
            if buffer.len() < self.capacity {
                buffer.push_back(ClickEvent::new(link_id));
                return true;
            }
        }

        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if total.is_power_of_two() {
            warn!(
                "Click buffer full (capacity {}), {} clicks dropped so far",
                self.capacity, total
            );
        }
        false
    }

    /// Number of buffered events not yet flushed.
    pub fn pending(&self) -> usize {
        self.lock_buffer().len()
    }

    /// Total events dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drains up to one batch and commits it.
    ///
    /// Returns [`FlushReport::Busy`] immediately if another flush is running.
    pub async fn flush(&self) -> FlushReport {
        let Ok(_guard) = self.flush_lock.try_lock() else {
            debug!("Click flush already in progress, skipping");
            return FlushReport::Busy;
        };

        self.flush_batch().await
    }

    /// Flushes batches until the buffer is empty or a commit fails.
    ///
    /// Waits for a running flush to finish first. Returns the number of
    /// committed clicks.
    pub async fn flush_all(&self) -> usize {
        let _guard = self.flush_lock.lock().await;

        let mut committed = 0;
        loop {
            match self.flush_batch().await {
                FlushReport::Committed { clicks, .. } => committed += clicks,
                FlushReport::Empty | FlushReport::Failed { .. } | FlushReport::Busy => break,
            }
        }
        committed
    }

    /// Starts the periodic flush task.
    ///
    /// The task flushes one batch every `interval` and, once `shutdown` turns
    /// `true` (or its sender is dropped), drains the remaining buffer and exits.
    pub fn spawn_flusher(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.flush().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            let flushed = self.flush_all().await;
            info!("Click aggregator stopped, flushed {} pending clicks", flushed);
        })
    }

    async fn flush_batch(&self) -> FlushReport {
        let batch = self.drain_batch();
        if batch.is_empty() {
            return FlushReport::Empty;
        }

        let counts = coalesce(&batch);
        match self.links.increment_access_batch(&counts).await {
            Ok(()) => {
                debug!(
                    "Flushed {} clicks for {} links",
                    batch.len(),
                    counts.len()
                );
                FlushReport::Committed {
                    clicks: batch.len(),
                    links: counts.len(),
                }
            }
            Err(e) => {
                error!("Click flush failed, discarding {} clicks: {}", batch.len(), e);
                FlushReport::Failed {
                    discarded: batch.len(),
                }
            }
        }
    }

    fn drain_batch(&self) -> Vec<ClickEvent> {
        let mut buffer = self.lock_buffer();
        let take = buffer.len().min(self.max_batch_size);
        buffer.drain(..take).collect()
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<ClickEvent>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sums clicks per link id.
fn coalesce(batch: &[ClickEvent]) -> HashMap<i64, u64> {
    let mut counts = HashMap::new();
    for event in batch {
        *counts.entry(event.link_id).or_insert(0) += 1;
    }
    counts
}
