//! Process-local link store with transactional semantics.
//!
//! Mirrors the PostgreSQL schema closely enough to exercise the service layer
//! without a database: ids come from a sequence that is not rolled back,
//! uncommitted rows are invisible, and codes are unique among committed rows.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::domain::entities::{Link, LinkSnapshot, NewLink};
use crate::domain::repositories::{LinkRepository, LinkUnitOfWork};
use crate::error::AppError;

#[derive(Default)]
struct StoreState {
    last_id: i64,
    rows: BTreeMap<i64, Link>,
    by_code: HashMap<String, i64>,
}

fn lock(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`LinkRepository`].
#[derive(Clone, Default)]
pub struct InMemoryLinkRepository {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed links.
    pub fn len(&self) -> usize {
        lock(&self.state).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unit of work staging rows until commit.
struct InMemoryUnitOfWork {
    state: Arc<Mutex<StoreState>>,
    staged: BTreeMap<i64, Link>,
    finished: bool,
}

impl InMemoryUnitOfWork {
    fn ensure_open(&self) -> Result<(), AppError> {
        if self.finished {
            return Err(AppError::internal(
                "Transaction already finished",
                json!({}),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkUnitOfWork for InMemoryUnitOfWork {
    async fn insert(&mut self, new_link: &NewLink) -> Result<i64, AppError> {
        self.ensure_open()?;

        let id = {
            let mut state = lock(&self.state);
            state.last_id += 1;
            state.last_id
        };

        self.staged.insert(
            id,
            Link {
                id,
                code: None,
                destination_url: new_link.destination_url.clone(),
                created_at: Utc::now(),
                expires_at: new_link.expires_at,
                last_accessed_at: None,
                access_count: 0,
                is_active: true,
            },
        );
        Ok(id)
    }

    async fn set_code(&mut self, id: i64, code: &str) -> Result<(), AppError> {
        self.ensure_open()?;

        let row = self.staged.get_mut(&id).ok_or_else(|| {
            AppError::internal("Link row not found in transaction", json!({ "id": id }))
        })?;
        row.code = Some(code.to_string());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        self.ensure_open()?;
        self.finished = true;

        let mut state = lock(&self.state);
        let mut seen = HashSet::new();
        let conflict = self
            .staged
            .values()
            .filter_map(|row| row.code.as_ref())
            .any(|code| state.by_code.contains_key(code) || !seen.insert(code.clone()));
        if conflict {
            self.staged.clear();
            return Err(AppError::internal(
                "Unique constraint violation",
                json!({ "constraint": "links_code_key" }),
            ));
        }

        for (id, row) in std::mem::take(&mut self.staged) {
            if let Some(code) = &row.code {
                state.by_code.insert(code.clone(), id);
            }
            state.rows.insert(id, row);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        self.finished = true;
        self.staged.clear();
        Ok(())
    }
}

#[async_trait]
impl LinkRepository for InMemoryLinkRepository {
    async fn begin(&self) -> Result<Box<dyn LinkUnitOfWork>, AppError> {
        Ok(Box::new(InMemoryUnitOfWork {
            state: self.state.clone(),
            staged: BTreeMap::new(),
            finished: false,
        }))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<LinkSnapshot>, AppError> {
        let state = lock(&self.state);
        Ok(state
            .by_code
            .get(code)
            .and_then(|id| state.rows.get(id))
            .map(Link::snapshot))
    }

    async fn find_details(&self, code: &str) -> Result<Option<Link>, AppError> {
        let state = lock(&self.state);
        Ok(state
            .by_code
            .get(code)
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    async fn increment_access_batch(&self, counts: &HashMap<i64, u64>) -> Result<(), AppError> {
        let now = Utc::now();
        let mut state = lock(&self.state);
        for (id, count) in counts {
            if let Some(row) = state.rows.get_mut(id) {
                row.access_count = row
                    .access_count
                    .saturating_add(i64::try_from(*count).unwrap_or(i64::MAX));
                row.last_accessed_at = Some(now);
            }
        }
        Ok(())
    }

    async fn set_active(&self, code: &str, active: bool) -> Result<bool, AppError> {
        let mut state = lock(&self.state);
        let Some(id) = state.by_code.get(code).copied() else {
            return Ok(false);
        };
        match state.rows.get_mut(&id) {
            Some(row) => {
                row.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}
