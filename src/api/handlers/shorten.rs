//! Handler for link shortening endpoint.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link for one destination URL.
///
/// # Endpoint
///
/// `POST /api/shorten`
///
/// # Request Body
///
/// ```json
/// {
///   "longUrl": "https://example.com/some/long/path",
///   "expiresAt": "2030-01-01T00:00:00Z"
/// }
/// ```
///
/// # Response
///
/// `201 Created`
///
/// ```json
/// {
///   "shortCode": "g8",
///   "shortUrl": "http://localhost:3000/g8",
///   "longUrl": "https://example.com/some/long/path",
///   "expiresAt": "2030-01-01T00:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// Returns 400 Bad Request if validation fails, 500 if the store fails.
pub async fn shorten_handler(
    State(state): State<AppState>,
    Json(payload): Json<ShortenRequest>,
) -> Result<(StatusCode, Json<ShortenResponse>), AppError> {
    payload.validate()?;

    let destination_url = payload.normalized_url().ok_or_else(|| {
        AppError::bad_request("Invalid URL format", json!({ "long_url": payload.long_url }))
    })?;

    let created = state
        .link_service
        .create_short_link(destination_url, payload.expires_at)
        .await?;

    let short_url = format!("{}/{}", state.base_url.trim_end_matches('/'), created.code);

    Ok((
        StatusCode::CREATED,
        Json(ShortenResponse {
            short_code: created.code,
            short_url,
            long_url: created.destination_url,
            expires_at: created.expires_at,
        }),
    ))
}
