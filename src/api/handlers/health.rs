//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Database**: `SELECT 1` against the link store
/// 2. **Cache**: PING, bounded by the cache timeout
/// 3. **Click Buffer**: fill level against capacity; a full buffer is degraded
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected" },
///     "cache": { "status": "ok", "message": "Connected" },
///     "click_buffer": { "status": "ok", "message": "12/100000 pending, 0 dropped" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let (store_ok, cache_ok) = tokio::join!(
        state.link_service.store_healthy(),
        state.link_service.cache_healthy()
    );

    let database = if store_ok {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Database query failed")
    };

    let cache = if cache_ok {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Cache unreachable")
    };

    let click_buffer = check_click_buffer(&state);

    let all_healthy = database.is_ok() && cache.is_ok() && click_buffer.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            cache,
            click_buffer,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

fn check_click_buffer(state: &AppState) -> CheckStatus {
    let clicks = &state.click_aggregator;
    let pending = clicks.pending();
    let message = format!(
        "{}/{} pending, {} dropped",
        pending,
        clicks.capacity(),
        clicks.dropped()
    );

    if pending >= clicks.capacity() {
        CheckStatus::error(message)
    } else {
        CheckStatus::ok(message)
    }
}
