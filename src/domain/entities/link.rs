//! Link entity and the views derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored short link with its accounting fields.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: i64,
    /// `None` only inside the creation transaction, before the code is derived.
    pub code: Option<String>,
    pub destination_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: i64,
    pub is_active: bool,
}

impl Link {
    /// Returns the fields needed to decide a resolution.
    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            id: self.id,
            destination_url: self.destination_url.clone(),
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }
}

/// Input data for creating a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub destination_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a successful creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLink {
    pub id: i64,
    pub code: String,
    pub destination_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Resolution-relevant view of a link.
///
/// This is both what the link store returns for a code lookup and what the
/// resolution cache stores (as camelCase JSON under `url:<code>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSnapshot {
    pub id: i64,
    pub destination_url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Availability of a link at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Inactive,
    Expired,
    Available,
}

impl LinkSnapshot {
    /// Evaluates the link status at `now`.
    ///
    /// Inactive is checked before expiry, so a link that is both reports
    /// [`LinkStatus::Inactive`]. A link expiring exactly at `now` is still
    /// available; it becomes expired once `expires_at` is in the past.
    pub fn status_at(&self, now: DateTime<Utc>) -> LinkStatus {
        if !self.is_active {
            return LinkStatus::Inactive;
        }
        if self.expires_at.is_some_and(|e| e < now) {
            return LinkStatus::Expired;
        }
        LinkStatus::Available
    }

    /// Cache lifetime for this snapshot, or `None` when it must not be cached.
    ///
    /// Equals `default_ttl_seconds`, shortened to the seconds remaining before
    /// expiry when the link expires sooner.
    pub fn cache_ttl_at(&self, now: DateTime<Utc>, default_ttl_seconds: u64) -> Option<u64> {
        let default_ttl = i64::try_from(default_ttl_seconds).unwrap_or(i64::MAX);
        let ttl = match self.expires_at {
            Some(expires_at) => default_ttl.min((expires_at - now).num_seconds()),
            None => default_ttl,
        };

        u64::try_from(ttl).ok().filter(|ttl| *ttl > 0)
    }
}
