//! Link creation and resolution service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::click_aggregator::ClickAggregator;
use crate::domain::entities::{CreatedLink, LinkSnapshot, LinkStatus, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::domain::resolution::ResolveOutcome;
use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, link_cache_key};
use crate::utils::{base62, deadline};

/// Default lifetime of a cached snapshot, in seconds.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Default bound on a single cache call.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(100);

/// Service for creating short links and resolving codes to destinations.
///
/// Resolution reads through a bounded cache and falls back to the link store.
/// The cache may be slow, down or stale without affecting correctness of the
/// store path; only store failures surface as errors.
pub struct LinkService {
    links: Arc<dyn LinkRepository>,
    cache: Arc<dyn CacheService>,
    clicks: Arc<ClickAggregator>,
    cache_ttl_seconds: u64,
    cache_timeout: Duration,
}

impl LinkService {
    /// Creates a link service with default cache settings.
    pub fn new(
        links: Arc<dyn LinkRepository>,
        cache: Arc<dyn CacheService>,
        clicks: Arc<ClickAggregator>,
    ) -> Self {
        Self {
            links,
            cache,
            clicks,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
        }
    }

    /// Overrides the cache TTL and per-call cache timeout.
    pub fn with_cache_settings(mut self, ttl_seconds: u64, timeout: Duration) -> Self {
        self.cache_ttl_seconds = ttl_seconds;
        self.cache_timeout = timeout;
        self
    }

    /// Creates a short link whose code is the base62 encoding of its id.
    ///
    /// The insert, code derivation and code update run as one unit of work on
    /// a separate task, so dropping the returned future does not interrupt
    /// the transaction; it still commits or rolls back.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `destination_url` is empty.
    /// Returns [`AppError::Internal`] if any store step fails; nothing from
    /// the unit is visible in that case.
    pub async fn create_short_link(
        &self,
        destination_url: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CreatedLink, AppError> {
        if destination_url.trim().is_empty() {
            return Err(AppError::bad_request(
                "Destination URL is required",
                json!({ "field": "longUrl" }),
            ));
        }

        let links = Arc::clone(&self.links);
        let new_link = NewLink {
            destination_url,
            expires_at,
        };

        let task = tokio::spawn(async move { create_in_unit(links.as_ref(), new_link).await });
        let created = match task.await {
            Ok(result) => result?,
            Err(e) => {
                error!("Link creation task failed: {}", e);
                return Err(AppError::internal("Failed to create link", json!({})));
            }
        };

        info!("Created short link {} (id {})", created.code, created.id);
        Ok(created)
    }

    /// Resolves `code` to an outcome, recording a click on success.
    ///
    /// Cached snapshots are not revalidated against the store: a link
    /// deactivated after being cached keeps resolving until its entry lapses.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the cache missed and the store read
    /// failed.
    pub async fn resolve(&self, code: &str) -> Result<ResolveOutcome, AppError> {
        if !base62::is_valid_code(code) {
            debug!("Rejecting malformed code {:?}", code);
            return Ok(ResolveOutcome::NotFound);
        }

        let key = link_cache_key(code);

        if let Some(payload) = self.read_cache(&key).await {
            return Ok(match serde_json::from_str::<LinkSnapshot>(&payload) {
                Ok(snapshot) => self.settle(&snapshot, Utc::now()),
                Err(e) => {
                    warn!("Corrupt cache entry for {}, treating as not found: {}", key, e);
                    ResolveOutcome::NotFound
                }
            });
        }

        let Some(snapshot) = self.links.find_by_code(code).await? else {
            return Ok(ResolveOutcome::NotFound);
        };

        let now = Utc::now();
        let outcome = self.settle(&snapshot, now);
        if outcome.is_success() {
            self.populate_cache(key, &snapshot, now);
        }
        Ok(outcome)
    }

    /// Checks that the link store answers queries.
    pub async fn store_healthy(&self) -> bool {
        self.links.health_check().await
    }

    /// Checks the cache within the cache timeout.
    pub async fn cache_healthy(&self) -> bool {
        deadline::within(self.cache_timeout, self.cache.health_check())
            .await
            .unwrap_or(false)
    }

    async fn read_cache(&self, key: &str) -> Option<String> {
        match deadline::within(self.cache_timeout, self.cache.get(key)).await {
            Some(Ok(hit)) => hit,
            Some(Err(e)) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
            None => {
                warn!(
                    "Cache read for {} timed out after {:?}",
                    key, self.cache_timeout
                );
                None
            }
        }
    }

    fn settle(&self, snapshot: &LinkSnapshot, now: DateTime<Utc>) -> ResolveOutcome {
        match snapshot.status_at(now) {
            LinkStatus::Inactive => ResolveOutcome::Inactive,
            LinkStatus::Expired => ResolveOutcome::Expired,
            LinkStatus::Available => {
                let _ = self.clicks.enqueue(snapshot.id);
                ResolveOutcome::Success {
                    destination_url: snapshot.destination_url.clone(),
                }
            }
        }
    }

    fn populate_cache(&self, key: String, snapshot: &LinkSnapshot, now: DateTime<Utc>) {
        let Some(ttl) = snapshot.cache_ttl_at(now, self.cache_ttl_seconds) else {
            debug!("Not caching {}: expires too soon", key);
            return;
        };

        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize snapshot for {}: {}", key, e);
                return;
            }
        };

        let cache = Arc::clone(&self.cache);
        let timeout = self.cache_timeout;
        tokio::spawn(async move {
            match deadline::within(timeout, cache.set(&key, &payload, ttl)).await {
                Some(Ok(())) => debug!("Cached {} for {}s", key, ttl),
                Some(Err(e)) => warn!("Cache write failed for {}: {}", key, e),
                None => warn!("Cache write for {} timed out after {:?}", key, timeout),
            }
        });
    }
}

async fn create_in_unit(
    links: &dyn LinkRepository,
    new_link: NewLink,
) -> Result<CreatedLink, AppError> {
    let mut unit = links.begin().await?;

    let result = async {
        let id = unit.insert(&new_link).await?;
        let code = code_for_id(id)?;
        unit.set_code(id, &code).await?;
        unit.commit().await?;
        Ok::<_, AppError>((id, code))
    }
    .await;

    match result {
        Ok((id, code)) => Ok(CreatedLink {
            id,
            code,
            destination_url: new_link.destination_url,
            expires_at: new_link.expires_at,
        }),
        Err(e) => {
            if let Err(rollback_err) = unit.rollback().await {
                warn!("Rollback after failed creation also failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

fn code_for_id(id: i64) -> Result<String, AppError> {
    u64::try_from(id).map(base62::encode).map_err(|_| {
        error!("Store assigned a negative link id {}", id);
        AppError::internal("Failed to create link", json!({}))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{LinkUnitOfWork, MockLinkRepository, MockLinkUnitOfWork};
    use crate::infrastructure::cache::{CacheResult, MockCacheService, NullCache};
    use crate::infrastructure::persistence::InMemoryLinkRepository;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCache {
        entries: Mutex<HashMap<String, (String, u64)>>,
    }

    impl RecordingCache {
        fn entry(&self, key: &str) -> Option<(String, u64)> {
            self.entries.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl CacheService for RecordingCache {
        async fn get(&self, key: &str) -> CacheResult<Option<String>> {
            Ok(self.entry(key).map(|(value, _)| value))
        }

        async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl_seconds));
            Ok(())
        }

        async fn invalidate(&self, key: &str) -> CacheResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct StalledCache;

    #[async_trait]
    impl CacheService for StalledCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> CacheResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn invalidate(&self, _key: &str) -> CacheResult<()> {
            Ok(())
        }

        async fn health_check(&self) -> bool {
            tokio::time::sleep(Duration::from_secs(30)).await;
            true
        }
    }

    fn service_with(
        links: Arc<dyn LinkRepository>,
        cache: Arc<dyn CacheService>,
    ) -> (LinkService, Arc<ClickAggregator>) {
        let clicks = Arc::new(ClickAggregator::new(Arc::clone(&links), 100, 10));
        (LinkService::new(links, cache, Arc::clone(&clicks)), clicks)
    }

    fn snapshot_json(id: i64, url: &str, active: bool) -> String {
        serde_json::to_string(&LinkSnapshot {
            id,
            destination_url: url.to_string(),
            expires_at: None,
            is_active: active,
        })
        .unwrap()
    }

    async fn wait_for_entry(cache: &RecordingCache, key: &str) -> Option<(String, u64)> {
        for _ in 0..50 {
            if let Some(entry) = cache.entry(key) {
                return Some(entry);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_create_assigns_base62_of_id() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let (service, _) = service_with(repo.clone(), Arc::new(NullCache));

        let first = service
            .create_short_link("https://example.com/a".to_string(), None)
            .await
            .unwrap();
        assert_eq!(first.code, base62::encode(first.id as u64));
        assert_eq!(first.destination_url, "https://example.com/a");

        let second = service
            .create_short_link("https://example.com/a".to_string(), None)
            .await
            .unwrap();
        assert_ne!(first.code, second.code);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_url() {
        let mut repo = MockLinkRepository::new();
        repo.expect_begin().times(0);
        let (service, _) = service_with(Arc::new(repo), Arc::new(NullCache));

        let result = service.create_short_link("   ".to_string(), None).await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_code_update_fails() {
        let mut unit = MockLinkUnitOfWork::new();
        unit.expect_insert().times(1).returning(|_| Ok(125));
        unit.expect_set_code()
            .withf(|id, code| *id == 125 && code == "21")
            .times(1)
            .returning(|_, _| Err(AppError::internal("Database error", json!({}))));
        unit.expect_commit().times(0);
        unit.expect_rollback().times(1).returning(|| Ok(()));
        let unit: Box<dyn LinkUnitOfWork> = Box::new(unit);

        let mut repo = MockLinkRepository::new();
        repo.expect_begin().return_once(move || Ok(unit));
        let (service, _) = service_with(Arc::new(repo), Arc::new(NullCache));

        let result = service
            .create_short_link("https://example.com".to_string(), None)
            .await;

        assert!(matches!(result, Err(AppError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_create_does_not_touch_cache_or_clicks() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let mut cache = MockCacheService::new();
        cache.expect_set().times(0);
        cache.expect_get().times(0);
        let (service, clicks) = service_with(repo, Arc::new(cache));

        service
            .create_short_link("https://example.com".to_string(), None)
            .await
            .unwrap();

        assert_eq!(clicks.pending(), 0);
    }

    #[tokio::test]
    async fn test_resolve_miss_reads_store_and_populates_cache() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let cache = Arc::new(RecordingCache::default());
        let (service, clicks) = service_with(repo, cache.clone());
        let created = service
            .create_short_link("https://example.com/x".to_string(), None)
            .await
            .unwrap();

        let outcome = service.resolve(&created.code).await.unwrap();

        assert_eq!(
            outcome,
            ResolveOutcome::Success {
                destination_url: "https://example.com/x".to_string()
            }
        );
        assert_eq!(clicks.pending(), 1);

        let (payload, ttl) = wait_for_entry(&cache, &link_cache_key(&created.code))
            .await
            .expect("cache entry written");
        let cached: LinkSnapshot = serde_json::from_str(&payload).unwrap();
        assert_eq!(cached.id, created.id);
        assert!(cached.is_active);
        assert_eq!(ttl, DEFAULT_CACHE_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_resolve_caps_ttl_at_expiry() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let cache = Arc::new(RecordingCache::default());
        let (service, _) = service_with(repo, cache.clone());
        let expires_at = Utc::now() + ChronoDuration::seconds(120);
        let created = service
            .create_short_link("https://example.com".to_string(), Some(expires_at))
            .await
            .unwrap();

        assert!(service.resolve(&created.code).await.unwrap().is_success());

        let (_, ttl) = wait_for_entry(&cache, &link_cache_key(&created.code))
            .await
            .expect("cache entry written");
        assert!(ttl <= 120 && ttl >= 118, "ttl was {ttl}");
    }

    #[tokio::test]
    async fn test_resolve_hit_skips_store() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(0);
        let mut cache = MockCacheService::new();
        cache
            .expect_get()
            .withf(|key| key == "url:b")
            .returning(|_| Ok(Some(snapshot_json(11, "https://cached.example", true))));
        cache.expect_set().times(0);
        let (service, clicks) = service_with(Arc::new(repo), Arc::new(cache));

        let outcome = service.resolve("b").await.unwrap();

        assert_eq!(
            outcome,
            ResolveOutcome::Success {
                destination_url: "https://cached.example".to_string()
            }
        );
        assert_eq!(clicks.pending(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_fails_closed() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(0);
        let mut cache = MockCacheService::new();
        cache
            .expect_get()
            .returning(|_| Ok(Some("{not json".to_string())));
        let (service, clicks) = service_with(Arc::new(repo), Arc::new(cache));

        let outcome = service.resolve("b").await.unwrap();

        assert_eq!(outcome, ResolveOutcome::NotFound);
        assert_eq!(clicks.pending(), 0);
    }

    #[tokio::test]
    async fn test_stale_cached_snapshot_wins_over_store() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let cache = Arc::new(RecordingCache::default());
        let (service, clicks) = service_with(repo.clone(), cache.clone());
        let created = service
            .create_short_link("https://example.com".to_string(), None)
            .await
            .unwrap();

        assert!(service.resolve(&created.code).await.unwrap().is_success());
        wait_for_entry(&cache, &link_cache_key(&created.code))
            .await
            .expect("cache entry written");

        // deactivated in the store only
        assert!(repo.set_active(&created.code, false).await.unwrap());

        assert!(service.resolve(&created.code).await.unwrap().is_success());
        assert_eq!(clicks.pending(), 2);

        cache
            .invalidate(&link_cache_key(&created.code))
            .await
            .unwrap();
        assert_eq!(
            service.resolve(&created.code).await.unwrap(),
            ResolveOutcome::Inactive
        );
    }

    #[tokio::test]
    async fn test_cached_inactive_snapshot_resolves_inactive() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(0);
        let mut cache = MockCacheService::new();
        cache
            .expect_get()
            .returning(|_| Ok(Some(snapshot_json(3, "https://example.com", false))));
        let (service, clicks) = service_with(Arc::new(repo), Arc::new(cache));

        assert_eq!(service.resolve("3").await.unwrap(), ResolveOutcome::Inactive);
        assert_eq!(clicks.pending(), 0);
    }

    #[tokio::test]
    async fn test_cache_error_falls_back_to_store() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let (creator, _) = service_with(repo.clone(), Arc::new(NullCache));
        let created = creator
            .create_short_link("https://example.com".to_string(), None)
            .await
            .unwrap();

        let mut cache = MockCacheService::new();
        cache.expect_get().returning(|_| {
            Err(crate::infrastructure::cache::CacheError::ConnectionError(
                "refused".to_string(),
            ))
        });
        cache.expect_set().returning(|_, _, _| Ok(()));
        let (service, _) = service_with(repo, Arc::new(cache));

        assert!(service.resolve(&created.code).await.unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_cache_falls_back_within_timeout() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let (creator, _) = service_with(repo.clone(), Arc::new(NullCache));
        let created = creator
            .create_short_link("https://example.com".to_string(), None)
            .await
            .unwrap();
        let (service, _) = service_with(repo, Arc::new(StalledCache));

        let started = tokio::time::Instant::now();
        let outcome = service.resolve(&created.code).await.unwrap();

        assert!(outcome.is_success());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_malformed_code_never_reaches_cache_or_store() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(0);
        let mut cache = MockCacheService::new();
        cache.expect_get().times(0);
        let (service, _) = service_with(Arc::new(repo), Arc::new(cache));

        for code in ["", "abc-def", "../etc", "0abc", "zzzzzzzzzzzzzzzz"] {
            assert_eq!(service.resolve(code).await.unwrap(), ResolveOutcome::NotFound);
        }
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found_without_click() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let (service, clicks) = service_with(repo, Arc::new(NullCache));

        assert_eq!(service.resolve("zz").await.unwrap(), ResolveOutcome::NotFound);
        assert_eq!(clicks.pending(), 0);
    }

    #[tokio::test]
    async fn test_expired_link_is_gone_and_not_cached() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let cache = Arc::new(RecordingCache::default());
        let (service, clicks) = service_with(repo, cache.clone());
        let created = service
            .create_short_link(
                "https://example.com".to_string(),
                Some(Utc::now() - ChronoDuration::seconds(1)),
            )
            .await
            .unwrap();

        assert_eq!(
            service.resolve(&created.code).await.unwrap(),
            ResolveOutcome::Expired
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.entry(&link_cache_key(&created.code)).is_none());
        assert_eq!(clicks.pending(), 0);
    }

    #[tokio::test]
    async fn test_store_error_propagates_on_miss() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .returning(|_| Err(AppError::internal("Database error", json!({}))));
        let (service, _) = service_with(Arc::new(repo), Arc::new(NullCache));

        let result = service.resolve("abc").await;

        assert!(matches!(result, Err(AppError::Internal { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_health_is_bounded() {
        let repo = Arc::new(InMemoryLinkRepository::new());
        let (service, _) = service_with(repo, Arc::new(StalledCache));

        assert!(!service.cache_healthy().await);
        assert!(service.store_healthy().await);
    }
}
