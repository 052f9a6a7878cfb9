//! Outcome of resolving a short code.

use serde::Serialize;

/// Exactly one of the four possible answers for a short code.
///
/// These are values, not errors: the HTTP layer maps each to its own status.
/// Store failures are reported separately as [`crate::error::AppError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolveOutcome {
    NotFound,
    Inactive,
    Expired,
    Success {
        #[serde(rename = "longUrl")]
        destination_url: String,
    },
}

impl ResolveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ResolveOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tags() {
        assert_eq!(
            serde_json::to_value(ResolveOutcome::NotFound).unwrap(),
            serde_json::json!({ "status": "not_found" })
        );
        assert_eq!(
            serde_json::to_value(ResolveOutcome::Success {
                destination_url: "https://example.com".to_string()
            })
            .unwrap(),
            serde_json::json!({ "status": "success", "longUrl": "https://example.com" })
        );
    }

    #[test]
    fn test_is_success() {
        assert!(!ResolveOutcome::Expired.is_success());
        assert!(
            ResolveOutcome::Success {
                destination_url: "https://a.b".to_string()
            }
            .is_success()
        );
    }
}
