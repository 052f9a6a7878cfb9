//! PostgreSQL implementation of link repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::entities::{Link, LinkSnapshot, NewLink};
use crate::domain::repositories::{LinkRepository, LinkUnitOfWork};
use crate::error::AppError;

/// PostgreSQL repository for link storage and retrieval.
///
/// Uses bound parameters for every statement.
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: i64,
    destination_url: String,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<SnapshotRow> for LinkSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: row.id,
            destination_url: row.destination_url,
            expires_at: row.expires_at,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: i64,
    code: Option<String>,
    destination_url: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_accessed_at: Option<DateTime<Utc>>,
    access_count: i64,
    is_active: bool,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            destination_url: row.destination_url,
            created_at: row.created_at,
            expires_at: row.expires_at,
            last_accessed_at: row.last_accessed_at,
            access_count: row.access_count,
            is_active: row.is_active,
        }
    }
}

/// A database transaction. Dropping it without commit rolls back and returns
/// the connection to the pool.
struct PgLinkUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLinkUnitOfWork {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, AppError> {
        self.tx
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction already finished", json!({})))
    }
}

#[async_trait]
impl LinkUnitOfWork for PgLinkUnitOfWork {
    async fn insert(&mut self, new_link: &NewLink) -> Result<i64, AppError> {
        let tx = self.tx()?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO links (destination_url, expires_at)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&new_link.destination_url)
        .bind(new_link.expires_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }

    async fn set_code(&mut self, id: i64, code: &str) -> Result<(), AppError> {
        let tx = self.tx()?;
        let result = sqlx::query("UPDATE links SET code = $1 WHERE id = $2")
            .bind(code)
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() != 1 {
            return Err(AppError::internal(
                "Link row not found in transaction",
                json!({ "id": id }),
            ));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(AppError::internal("Transaction already finished", json!({}))),
        }
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn begin(&self) -> Result<Box<dyn LinkUnitOfWork>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLinkUnitOfWork { tx: Some(tx) }))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<LinkSnapshot>, AppError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, destination_url, expires_at, is_active
            FROM links
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(LinkSnapshot::from))
    }

    async fn find_details(&self, code: &str) -> Result<Option<Link>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, code, destination_url, created_at, expires_at,
                   last_accessed_at, access_count, is_active
            FROM links
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Link::from))
    }

    async fn increment_access_batch(&self, counts: &HashMap<i64, u64>) -> Result<(), AppError> {
        if counts.is_empty() {
            return Ok(());
        }

        // Sorted so concurrent flushes from several instances lock rows in the same order.
        let mut updates: Vec<(i64, i64)> = counts
            .iter()
            .map(|(id, count)| (*id, i64::try_from(*count).unwrap_or(i64::MAX)))
            .collect();
        updates.sort_unstable_by_key(|(id, _)| *id);

        let mut tx = self.pool.begin().await?;
        for (id, count) in updates {
            sqlx::query(
                r#"
                UPDATE links
                SET access_count = access_count + $1,
                    last_accessed_at = NOW()
                WHERE id = $2
                "#,
            )
            .bind(count)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn set_active(&self, code: &str, active: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE links SET is_active = $1 WHERE code = $2")
            .bind(active)
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool.as_ref())
            .await
            .is_ok()
    }
}
