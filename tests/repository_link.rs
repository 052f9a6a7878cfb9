//! PostgreSQL link store tests.
//!
//! `#[sqlx::test]` creates a fresh database per test from `DATABASE_URL`.

use chrono::{Duration, Utc};
use linkgate::domain::entities::NewLink;
use linkgate::domain::repositories::{LinkRepository, LinkUnitOfWork};
use linkgate::infrastructure::persistence::PgLinkRepository;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

fn new_link(url: &str) -> NewLink {
    NewLink {
        destination_url: url.to_string(),
        expires_at: None,
    }
}

async fn create_committed(repo: &PgLinkRepository, url: &str, code: &str) -> i64 {
    let mut unit = repo.begin().await.unwrap();
    let id = unit.insert(&new_link(url)).await.unwrap();
    unit.set_code(id, code).await.unwrap();
    unit.commit().await.unwrap();
    id
}

#[sqlx::test]
async fn test_committed_link_is_visible(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    let id = create_committed(&repo, "https://example.com", "abc").await;

    let snapshot = repo.find_by_code("abc").await.unwrap().unwrap();
    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.destination_url, "https://example.com");
    assert!(snapshot.is_active);
    assert!(snapshot.expires_at.is_none());
}

#[sqlx::test]
async fn test_rolled_back_link_is_invisible(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool.clone()));

    let mut unit = repo.begin().await.unwrap();
    let id = unit.insert(&new_link("https://example.com")).await.unwrap();
    unit.set_code(id, "rb").await.unwrap();
    unit.rollback().await.unwrap();

    assert!(repo.find_by_code("rb").await.unwrap().is_none());
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[sqlx::test]
async fn test_dropped_unit_rolls_back(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool.clone()));

    {
        let mut unit = repo.begin().await.unwrap();
        unit.insert(&new_link("https://example.com")).await.unwrap();
    }

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[sqlx::test]
async fn test_duplicate_code_fails(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));
    create_committed(&repo, "https://a.example", "dup").await;

    let mut unit = repo.begin().await.unwrap();
    let id = unit.insert(&new_link("https://b.example")).await.unwrap();

    assert!(unit.set_code(id, "dup").await.is_err());
}

#[sqlx::test]
async fn test_expiry_round_trips(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));
    let expires_at = Utc::now() + Duration::hours(1);

    let mut unit = repo.begin().await.unwrap();
    let id = unit
        .insert(&NewLink {
            destination_url: "https://example.com".to_string(),
            expires_at: Some(expires_at),
        })
        .await
        .unwrap();
    unit.set_code(id, "exp").await.unwrap();
    unit.commit().await.unwrap();

    let snapshot = repo.find_by_code("exp").await.unwrap().unwrap();
    let stored = snapshot.expires_at.unwrap();
    assert!((stored - expires_at).num_milliseconds().abs() < 1);
}

#[sqlx::test]
async fn test_increment_access_batch(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));
    let a = create_committed(&repo, "https://a.example", "a").await;
    let b = create_committed(&repo, "https://b.example", "b").await;

    let counts = HashMap::from([(a, 3_u64), (b, 1), (9999, 5)]);
    repo.increment_access_batch(&counts).await.unwrap();
    repo.increment_access_batch(&HashMap::from([(a, 2)]))
        .await
        .unwrap();

    let link_a = repo.find_details("a").await.unwrap().unwrap();
    let link_b = repo.find_details("b").await.unwrap().unwrap();
    assert_eq!(link_a.access_count, 5);
    assert_eq!(link_b.access_count, 1);
    assert!(link_a.last_accessed_at.is_some());
}

#[sqlx::test]
async fn test_set_active(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));
    create_committed(&repo, "https://example.com", "act").await;

    assert!(repo.set_active("act", false).await.unwrap());
    assert!(!repo.find_by_code("act").await.unwrap().unwrap().is_active);

    assert!(repo.set_active("act", true).await.unwrap());
    assert!(repo.find_by_code("act").await.unwrap().unwrap().is_active);

    assert!(!repo.set_active("missing", false).await.unwrap());
}

#[sqlx::test]
async fn test_health_check(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));
    assert!(repo.health_check().await);
}
