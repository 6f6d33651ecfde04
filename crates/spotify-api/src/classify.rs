//! HTTP status classification for Web API responses
//!
//! The mapping is fixed and exhaustive: 401 and 403 are credential problems,
//! 429 carries a back-off hint, and every other non-2xx status is transient.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::{UpstreamError, UpstreamErrorKind};

/// Classify a non-2xx status into an error kind.
pub fn classify_status(status: u16) -> UpstreamErrorKind {
    match status {
        401 => UpstreamErrorKind::Unauthorized,
        403 => UpstreamErrorKind::Forbidden,
        429 => UpstreamErrorKind::RateLimited,
        _ => UpstreamErrorKind::Transient,
    }
}

/// `Retry-After` as a delay. Only the delta-seconds form is understood;
/// HTTP dates and garbage are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Build the error for a non-2xx response.
pub fn error_for_response(endpoint: &str, status: u16, headers: &HeaderMap) -> UpstreamError {
    let kind = classify_status(status);
    let mut err = UpstreamError::new(kind, endpoint).with_status(status);
    if kind == UpstreamErrorKind::RateLimited {
        err.retry_after = parse_retry_after(headers);
    }
    err
}
