//! DTOs for link shortening endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

/// Request to shorten one URL.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShortenRequest {
    /// The destination URL (absolute, HTTP or HTTPS).
    #[validate(
        length(min = 1, max = 2048, message = "URL must be 1 to 2048 characters"),
        custom(function = "validate_http_url")
    )]
    pub long_url: String,

    /// Optional expiry timestamp. After this time, the link returns 410 Gone.
    #[validate(custom(function = "validate_future"))]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response for a created short link.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenResponse {
    pub short_code: String,
    pub short_url: String,
    pub long_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShortenRequest {
    /// Serialized form of `long_url` as parsed by the `url` crate.
    ///
    /// Non-ASCII input comes back percent-encoded, so the stored destination
    /// is always a valid `Location` header value. Returns `None` if the URL
    /// does not parse, which `validate()` already rejects.
    pub fn normalized_url(&self) -> Option<String> {
        Url::parse(&self.long_url).ok().map(String::from)
    }
}

fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    // the parser silently drops tabs and newlines, so reject them up front
    if value.chars().any(char::is_control) {
        return Err(invalid("invalid_url", "URL must not contain control characters"));
    }

    let parsed = Url::parse(value).map_err(|_| invalid("invalid_url", "Invalid URL format"))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        "http" | "https" => Err(invalid("invalid_url", "URL must have a host")),
        _ => Err(invalid("invalid_scheme", "Only http and https URLs are allowed")),
    }
}

fn validate_future(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *value <= Utc::now() {
        return Err(invalid("expired", "expiresAt must be in the future"));
    }
    Ok(())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}
