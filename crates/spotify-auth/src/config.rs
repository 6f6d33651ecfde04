//! OAuth client configuration
//!
//! Deserialized from the `[oauth]` table of the binary's TOML file. Every
//! field except `client_id` has a default from `constants`.

use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    AUTHORIZE_ENDPOINT, DEFAULT_HANDSHAKE_TTL_SECS, DEFAULT_TIMEOUT_SECS, REDIRECT_URI, SCOPES,
    TOKEN_ENDPOINT,
};

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    /// Ask the service to show the consent dialog even if already granted
    #[serde(default = "default_show_dialog")]
    pub show_dialog: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_handshake_ttl_secs")]
    pub handshake_ttl_secs: u64,
}

impl OAuthConfig {
    /// Config with Spotify's endpoints for the given client.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: default_redirect_uri(),
            authorize_endpoint: default_authorize_endpoint(),
            token_endpoint: default_token_endpoint(),
            scopes: default_scopes(),
            show_dialog: default_show_dialog(),
            timeout_secs: default_timeout_secs(),
            handshake_ttl_secs: default_handshake_ttl_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn handshake_ttl(&self) -> Duration {
        Duration::from_secs(self.handshake_ttl_secs)
    }
}

impl Default for OAuthConfig {
    /// Spotify defaults with no client ID; callers must fill it in.
    fn default() -> Self {
        Self::new("")
    }
}

fn default_redirect_uri() -> String {
    REDIRECT_URI.to_string()
}

fn default_authorize_endpoint() -> String {
    AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_scopes() -> String {
    SCOPES.to_string()
}

fn default_show_dialog() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_handshake_ttl_secs() -> u64 {
    DEFAULT_HANDSHAKE_TTL_SECS
}
