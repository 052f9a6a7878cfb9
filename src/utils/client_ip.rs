//! Caller identity extraction for rate limiting.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Identity used when neither headers nor the socket reveal the caller.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Determines the caller identity for a request.
///
/// When `behind_proxy` is set, the first address in `X-Forwarded-For` wins,
/// then `X-Real-IP`. Otherwise (or if both are absent) the peer socket address
/// is used. Headers are ignored without a trusted proxy because any client can
/// forge them.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    behind_proxy: bool,
) -> String {
    if behind_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded.or(real_ip) {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
