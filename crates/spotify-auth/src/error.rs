//! Error types for the handshake and session lifecycle
//!
//! Messages carry endpoint and status context only. Token and verifier
//! values never appear here.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The user (or the service) declined the authorization request
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Callback code was empty, oversized or contained unexpected characters
    #[error("invalid authorization code")]
    InvalidCode,

    /// Callback arrived with no live handshake (stale, replayed or expired)
    #[error("no pending handshake")]
    NoPendingHandshake,

    /// Token endpoint rejected the exchange or returned an unusable payload
    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),

    /// Network failure or timeout talking to the token endpoint
    #[error("transient token endpoint failure: {0}")]
    Transient(String),

    /// Refresh token was rejected by the token endpoint
    #[error("refresh rejected: {0}")]
    RefreshRejected(String),

    /// Operation is not valid from the current session state
    #[error("operation {operation} not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Client configuration cannot produce a usable request
    #[error("invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    /// The OS random source could not be read
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// Key-value store read or write failed
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
