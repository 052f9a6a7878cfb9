//! CLI administration tool for linkgate.
//!
//! Manages links and checks the database without going through the HTTP API
//! (and therefore without rate limits).
//!
//! # Usage
//!
//! ```bash
//! # Create a link
//! cargo run --bin admin -- link create https://example.com --expires-at 2030-01-01T00:00:00Z
//!
//! # Show a link with its click count
//! cargo run --bin admin -- link show g8
//!
//! # Deactivate a link and drop its cache entry
//! cargo run --bin admin -- link deactivate g8 --purge-cache
//!
//! # Reactivate a link
//! cargo run --bin admin -- link activate g8
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Same as the server (see `linkgate::config`). `REDIS_URL` is only needed
//! for `--purge-cache`.

use linkgate::config::{Config, mask_connection_string};
use linkgate::domain::click_aggregator::ClickAggregator;
use linkgate::domain::entities::LinkStatus;
use linkgate::domain::repositories::LinkRepository;
use linkgate::infrastructure::cache::{CacheService, NullCache, RedisCache, link_cache_key};
use linkgate::infrastructure::persistence::PgLinkRepository;
use linkgate::infrastructure::redis_client;
use linkgate::prelude::LinkService;
use linkgate::server::connect_database;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing linkgate.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage short links
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Link management subcommands.
#[derive(Subcommand)]
enum LinkAction {
    /// Create a short link
    Create {
        /// Destination URL
        url: String,

        /// Expiry timestamp (RFC 3339, e.g. 2030-01-01T00:00:00Z)
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },

    /// Show a link and its access count
    Show { code: String },

    /// Deactivate a link
    Deactivate {
        code: String,

        /// Also remove the cached snapshot so the change applies immediately
        #[arg(long)]
        purge_cache: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Reactivate a link
    Activate { code: String },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = connect_database(&config).await?;

    match cli.command {
        Commands::Link { action } => handle_link_action(action, &config, pool).await?,
        Commands::Db { action } => handle_db_action(action, &config, &pool).await?,
    }

    Ok(())
}

/// Dispatches link management commands.
async fn handle_link_action(action: LinkAction, config: &Config, pool: PgPool) -> Result<()> {
    let repo: Arc<dyn LinkRepository> = Arc::new(PgLinkRepository::new(Arc::new(pool)));

    match action {
        LinkAction::Create { url, expires_at } => create_link(repo, config, url, expires_at).await,
        LinkAction::Show { code } => show_link(repo, &code).await,
        LinkAction::Deactivate {
            code,
            purge_cache,
            yes,
        } => deactivate_link(repo, config, &code, purge_cache, yes).await,
        LinkAction::Activate { code } => activate_link(repo, &code).await,
    }
}

/// Creates a link through the same transactional path as the API.
async fn create_link(
    repo: Arc<dyn LinkRepository>,
    config: &Config,
    url: String,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    println!("{}", "🔗 Create Short Link".bright_blue().bold());
    println!();

    // the admin tool never resolves, so the click buffer stays empty
    let clicks = Arc::new(ClickAggregator::new(Arc::clone(&repo), 1, 1));
    let service = LinkService::new(repo, Arc::new(NullCache::new()), clicks);

    let created = service
        .create_short_link(url, expires_at)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create link: {}", e))?;

    println!("{}", "✅ Link created successfully!".green().bold());
    println!();
    println!("  Code:      {}", created.code.bright_yellow().bold());
    println!(
        "  Short URL: {}/{}",
        config.base_url.trim_end_matches('/').cyan(),
        created.code.cyan()
    );
    println!("  Target:    {}", created.destination_url);
    if let Some(expires_at) = created.expires_at {
        println!("  Expires:   {}", expires_at.to_rfc3339().bright_black());
    }
    println!();

    Ok(())
}

/// Shows a link with its current status.
///
/// # Output Format
///
/// ```text
/// 📋 Link g8
///
///   ID:            500
///   Target:        https://example.com
///   Status:        ACTIVE
///   Created:       2026-01-15 10:30
///   Expires:       never
///   Access count:  42
///   Last accessed: 2026-01-16 14:20
/// ```
async fn show_link(repo: Arc<dyn LinkRepository>, code: &str) -> Result<()> {
    let link = repo
        .find_details(code)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("Link not found")?;

    println!("{}", format!("📋 Link {code}").bright_blue().bold());
    println!();

    let status = match link.snapshot().status_at(Utc::now()) {
        LinkStatus::Available => "ACTIVE".green(),
        LinkStatus::Inactive => "INACTIVE".red(),
        LinkStatus::Expired => "EXPIRED".yellow(),
    };

    println!("  ID:            {}", link.id.to_string().bright_black());
    println!("  Target:        {}", link.destination_url.cyan());
    println!("  Status:        {}", status);
    println!(
        "  Created:       {}",
        link.created_at.format("%Y-%m-%d %H:%M")
    );
    println!(
        "  Expires:       {}",
        link.expires_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!(
        "  Access count:  {}",
        link.access_count.to_string().bright_green().bold()
    );
    println!(
        "  Last accessed: {}",
        link.last_accessed_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string())
            .bright_black()
    );
    println!();

    Ok(())
}

/// Deactivates a link with confirmation prompt.
///
/// Cached snapshots are not revalidated, so without `--purge-cache` the link
/// keeps redirecting until its cache entry expires.
async fn deactivate_link(
    repo: Arc<dyn LinkRepository>,
    config: &Config,
    code: &str,
    purge_cache: bool,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🔒 Deactivate Link".bright_blue().bold());
    println!();

    let link = repo
        .find_details(code)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("Link not found")?;

    if !link.is_active {
        println!("{}", "⚠️  This link is already inactive".yellow());
        return Ok(());
    }

    println!("  Code:   {}", code.cyan());
    println!("  Target: {}", link.destination_url);
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Deactivate this link?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    repo.set_active(code, false)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to deactivate link: {}", e))?;

    println!();
    println!("{}", "✅ Link deactivated".green().bold());

    if purge_cache {
        purge_cached_snapshot(config, code).await?;
    } else if config.is_cache_enabled() {
        println!(
            "{}",
            format!(
                "⚠️  Cached redirects may continue for up to {}s (use --purge-cache)",
                config.cache_ttl_seconds
            )
            .yellow()
        );
    }
    println!();

    Ok(())
}

/// Reactivates a link.
async fn activate_link(repo: Arc<dyn LinkRepository>, code: &str) -> Result<()> {
    let updated = repo
        .set_active(code, true)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to activate link: {}", e))?;

    if !updated {
        anyhow::bail!("Link not found");
    }

    println!("{}", "✅ Link activated".green().bold());
    Ok(())
}

async fn purge_cached_snapshot(config: &Config, code: &str) -> Result<()> {
    let Some(redis_url) = &config.redis_url else {
        println!("{}", "  Cache disabled, nothing to purge".bright_black());
        return Ok(());
    };

    let conn = redis_client::connect(redis_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;
    let cache = RedisCache::new(conn);

    cache
        .invalidate(&link_cache_key(code))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to purge cache entry: {}", e))?;

    println!("{}", "✅ Cache entry purged".green());
    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, config: &Config, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());
            println!(
                "  {}",
                mask_connection_string(&config.database_url).bright_black()
            );

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
                .fetch_one(pool)
                .await
                .context("Links table missing; start the server once to run migrations")?;

            println!("{}", "✅ Database connection OK".green().bold());
            println!("  Links: {}", links.to_string().bright_green().bold());
        }
    }

    Ok(())
}
