//! Failure values returned by the gateway
//!
//! Every upstream failure is folded into one `UpstreamError` whose `kind`
//! tells the caller what to do next. The gateway itself never acts on it.

use std::fmt;
use std::time::Duration;

/// What went wrong upstream, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// No credential, or the service rejected it (401). Caller should log out.
    Unauthorized,
    /// Credential valid but lacks scope or the account is barred (403)
    Forbidden,
    /// Too many requests (429); see `retry_after`
    RateLimited,
    /// Timeout, connection failure or any other non-2xx status
    Transient,
    /// 2xx response whose body did not decode into the expected shape
    Malformed,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamErrorKind::Unauthorized => "unauthorized",
            UpstreamErrorKind::Forbidden => "forbidden",
            UpstreamErrorKind::RateLimited => "rate_limited",
            UpstreamErrorKind::Transient => "transient",
            UpstreamErrorKind::Malformed => "malformed",
        }
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{endpoint}: {kind}{}", status_suffix(.status))]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    /// HTTP status when a response was received
    pub status: Option<u16>,
    /// Server-requested wait, only for `RateLimited`
    pub retry_after: Option<Duration>,
    /// Endpoint path the request targeted
    pub endpoint: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, endpoint: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            retry_after: None,
            endpoint: endpoint.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// How long to wait before trying again, if the service said.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// The caller should drop the session.
    pub fn is_unauthorized(&self) -> bool {
        self.kind == UpstreamErrorKind::Unauthorized
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_endpoint_kind_and_status() {
        let err = UpstreamError::new(UpstreamErrorKind::Forbidden, "/me/top/artists")
            .with_status(403);
        assert_eq!(err.to_string(), "/me/top/artists: forbidden (HTTP 403)");
    }

    #[test]
    fn display_without_status() {
        let err = UpstreamError::new(UpstreamErrorKind::Unauthorized, "/me");
        assert_eq!(err.to_string(), "/me: unauthorized");
        assert!(err.is_unauthorized());
        assert!(err.retry_after().is_none());
    }
}
