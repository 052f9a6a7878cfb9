//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, Redis setup, the click flusher, and the Axum
//! server lifecycle including graceful shutdown.

use crate::application::services::{LinkService, RateLimiter};
use crate::config::Config;
use crate::domain::click_aggregator::ClickAggregator;
use crate::domain::repositories::LinkRepository;
use crate::infrastructure::cache::{CacheService, NullCache, RedisCache};
use crate::infrastructure::counter::{CounterStore, InMemoryCounterStore, RedisCounterStore};
use crate::infrastructure::persistence::PgLinkRepository;
use crate::infrastructure::redis_client;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Upper bound on the final click flush after the server stops.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens the PostgreSQL pool with the configured limits.
///
/// # Errors
///
/// Returns an error if no connection can be established.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool and migrations
/// - Redis cache and rate-limit counters (or no-op cache and in-process
///   counters when Redis is not configured or unreachable)
/// - Periodic click flusher
/// - Axum HTTP server
///
/// On Ctrl+C the server stops accepting requests, drains in-flight ones, and
/// flushes every buffered click before returning.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let (cache, counters) = connect_redis(&config).await;

    let links: Arc<dyn LinkRepository> = Arc::new(PgLinkRepository::new(Arc::new(pool)));
    let clicks = Arc::new(ClickAggregator::new(
        Arc::clone(&links),
        config.click_buffer_capacity,
        config.click_batch_size,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flusher = Arc::clone(&clicks).spawn_flusher(config.click_flush_interval(), shutdown_rx);
    tracing::info!("Click flusher started");

    let link_service = Arc::new(
        LinkService::new(links, cache, Arc::clone(&clicks))
            .with_cache_settings(config.cache_ttl_seconds, config.cache_timeout()),
    );
    let rate_limiter = Arc::new(RateLimiter::new(counters, config.rate_limit_timeout()));

    let state = AppState::new(link_service, clicks, rate_limiter, config.base_url.clone())
        .with_rate_limits(config.create_rate_limit(), config.redirect_rate_limit())
        .with_behind_proxy(config.behind_proxy);

    let app = app_router(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, flushing buffered clicks");
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, flusher).await {
        Ok(Ok(())) => tracing::info!("Click flusher finished"),
        Ok(Err(e)) => tracing::error!("Click flusher task failed: {}", e),
        Err(_) => tracing::error!(
            "Click flush did not finish within {:?}, remaining clicks are lost",
            SHUTDOWN_FLUSH_TIMEOUT
        ),
    }

    Ok(())
}

/// Builds the cache and counter store on one shared Redis connection.
///
/// Redis is optional: without it caching is disabled and rate limits are
/// enforced per process.
async fn connect_redis(config: &Config) -> (Arc<dyn CacheService>, Arc<dyn CounterStore>) {
    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Cache disabled (NullCache), rate limits per process");
        return (Arc::new(NullCache::new()), Arc::new(InMemoryCounterStore::new()));
    };

    match redis_client::connect(redis_url).await {
        Ok(conn) => {
            tracing::info!("Cache and rate-limit counters enabled (Redis)");
            (
                Arc::new(RedisCache::new(conn.clone())),
                Arc::new(RedisCounterStore::new(conn)),
            )
        }
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Redis: {}. Using NullCache and in-process counters.",
                e
            );
            (Arc::new(NullCache::new()), Arc::new(InMemoryCounterStore::new()))
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}
