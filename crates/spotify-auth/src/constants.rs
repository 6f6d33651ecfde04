//! Spotify OAuth defaults
//!
//! Endpoints and scopes used when the config file leaves them out. The
//! client ID is public (PKCE clients carry no secret); it still has to be
//! supplied per deployment because each app registration has its own.

/// Authorization endpoint the browser is redirected to
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Token endpoint for code exchange and refresh
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Loopback redirect registered for local use
pub const REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Read-only scopes needed for profile, top items and listening history.
pub const SCOPES: &str = "user-read-private user-read-email user-top-read user-read-recently-played";

/// Seconds before a token exchange or refresh request is abandoned
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Seconds a pending handshake stays redeemable
pub const DEFAULT_HANDSHAKE_TTL_SECS: u64 = 600;

/// Upper bound on an authorization code we are willing to forward
pub const MAX_CODE_LEN: usize = 2048;
