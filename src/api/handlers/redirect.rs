//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use serde_json::json;

use crate::domain::resolution::ResolveOutcome;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its destination URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Response Codes
///
/// - **307 Temporary Redirect**: link is available; a click is recorded
/// - **403 Forbidden**: link was deactivated
/// - **404 Not Found**: no link has this code
/// - **410 Gone**: link has expired
/// - **500 Internal Server Error**: cache missed and the store failed
///
/// Resolution goes through [`crate::application::services::LinkService::resolve`],
/// which reads the cache first and falls back to the store.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    match state.link_service.resolve(&code).await? {
        ResolveOutcome::Success { destination_url } => Ok(Redirect::temporary(&destination_url)),
        ResolveOutcome::NotFound => Err(AppError::not_found(
            "Short link not found",
            json!({ "code": code }),
        )),
        ResolveOutcome::Inactive => Err(AppError::forbidden(
            "Short link is inactive",
            json!({ "code": code }),
        )),
        ResolveOutcome::Expired => Err(AppError::gone(
            "Short link has expired",
            json!({ "code": code }),
        )),
    }
}
