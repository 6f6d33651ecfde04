//! Spotify OAuth session library
//!
//! PKCE authorization, token exchange and refresh, persistent storage and
//! the `SessionManager` that ties them into one state machine. Nothing here
//! talks to the Web API itself; `spotify-api` asks the session for a
//! credential and leaves the lifecycle to this crate.
//!
//! Flow:
//! 1. `SessionManager::initiate()` stores a fresh verifier and returns the
//!    `AuthorizationRequest` to open in a browser
//! 2. The browser lands on the redirect; `CallbackParams::from_redirect_url()`
//!    pulls out `code` or `error`
//! 3. `SessionManager::complete_handshake()` exchanges the code via
//!    `token::exchange_code()` and persists the `Credential`
//! 4. `SessionManager::current_credential()` hands it out, refreshing with
//!    `token::refresh_token()` once it has expired
//! 5. `SessionManager::logout()` wipes everything

pub mod callback;
pub mod clock;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod pkce;
pub mod session;
pub mod store;
pub mod token;

pub use callback::CallbackParams;
pub use clock::{Clock, SystemClock};
pub use config::OAuthConfig;
pub use credentials::{Credential, TokenStore};
pub use error::{Error, Result};
pub use pkce::{AuthorizationRequest, EntropySource, OsEntropy, compute_challenge};
pub use session::{SessionManager, SessionState, SignedOutReason};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use token::{TokenResponse, exchange_code, refresh_token};
