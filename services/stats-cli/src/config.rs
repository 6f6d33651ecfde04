//! Configuration types and loading
//!
//! Precedence: CLI args > env vars > config file > defaults.
//! The client ID may come from `SPOTIFY_CLIENT_ID` so a shared config file
//! can be used with different app registrations.

use serde::Deserialize;
use spotify_api::ApiConfig;
use spotify_auth::OAuthConfig;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "stats-cli.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where the session file lives
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from("music-stats-session.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| common::Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Defaults plus environment, for when no config file exists.
    pub fn from_env() -> common::Result<Self> {
        Config::default().finish()
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(client_id) = std::env::var("SPOTIFY_CLIENT_ID") {
            let client_id = client_id.trim();
            if !client_id.is_empty() {
                self.oauth.client_id = client_id.to_string();
            }
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(common::Error::invalid(
                "oauth.client_id",
                "empty; set it in the config file or SPOTIFY_CLIENT_ID",
            ));
        }

        for (field, url) in [
            ("oauth.authorize_endpoint", &self.oauth.authorize_endpoint),
            ("oauth.token_endpoint", &self.oauth.token_endpoint),
            ("oauth.redirect_uri", &self.oauth.redirect_uri),
            ("api.base_url", &self.api.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::invalid(
                    field,
                    format!("must start with http:// or https://, got: {url}"),
                ));
            }
        }

        for (field, secs) in [
            ("oauth.timeout_secs", self.oauth.timeout_secs),
            ("oauth.handshake_ttl_secs", self.oauth.handshake_ttl_secs),
            ("api.timeout_secs", self.api.timeout_secs),
        ] {
            if secs == 0 {
                return Err(common::Error::invalid(field, "must be greater than 0"));
            }
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(common::Error::invalid("storage.path", "must not be empty"));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag is `true` when the path was asked for explicitly, in which
    /// case a missing file is an error rather than "use defaults".
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }
}
