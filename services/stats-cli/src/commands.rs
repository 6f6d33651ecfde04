//! Subcommand implementations
//!
//! Each command returns the text to print so the handlers can be tested
//! without capturing stdout. Gateway failures are turned into user-facing
//! errors here: `Unauthorized` signs the session out, `RateLimited` reports
//! how long to wait.

use anyhow::{Context, Result, anyhow};
use insights::{genre_distribution, rank_groups};
use spotify_api::{
    ApiConfig, Gateway, TimeRange, UpstreamError, UpstreamErrorKind, current_user,
    recently_played, top_artists,
};
use spotify_auth::{
    CallbackParams, Clock, FileStore, KeyValueStore, OAuthConfig, SessionManager, SessionState,
    SystemClock,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;

/// Most recent plays the history endpoint returns in one page
const HISTORY_PAGE: u32 = 50;

pub struct App {
    session: Arc<SessionManager>,
    gateway: Gateway,
    json: bool,
}

impl App {
    /// Wire the session to the file store named in `config`.
    pub fn open(config: &Config, json: bool) -> Result<Self> {
        let store = FileStore::open(config.storage.path.clone()).with_context(|| {
            format!(
                "failed to open session store {}",
                config.storage.path.display()
            )
        })?;
        Self::with_store(config.oauth.clone(), &config.api, Arc::new(store), json)
    }

    pub fn with_store(
        oauth: OAuthConfig,
        api: &ApiConfig,
        store: Arc<dyn KeyValueStore>,
        json: bool,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("music-stats/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let session = Arc::new(SessionManager::new(oauth, client.clone(), store));
        let gateway = Gateway::new(session.clone(), client, api);
        Ok(Self {
            session,
            gateway,
            json,
        })
    }

    pub async fn login(&self) -> Result<String> {
        let request = self
            .session
            .initiate()
            .await
            .context("cannot start login")?;
        let url = request.url()?;
        info!("authorization URL issued");
        Ok(format!(
            "Open this URL in a browser and approve access:\n\n  {url}\n\n\
             Then run `music-stats callback '<redirect URL>'` with the address you land on."
        ))
    }

    pub async fn callback(&self, redirect_url: &str) -> Result<String> {
        let params = CallbackParams::from_redirect_url(redirect_url)?;
        let state = self
            .session
            .complete_handshake(params.code.as_deref(), params.error.as_deref())
            .await
            .context("login failed")?;
        Ok(format!("Logged in ({})", state.label()))
    }

    pub fn status(&self) -> String {
        let state = self.session.state();
        match (state, self.session.credential_if_fresh()) {
            (SessionState::Authenticated, Some(credential)) => {
                let remaining = credential.remaining_millis(SystemClock.now_millis()) / 1000;
                format!(
                    "{}; token valid for {}m {}s",
                    state.label(),
                    remaining / 60,
                    remaining % 60
                )
            }
            (SessionState::Authenticated, None) if self.session.can_refresh() => {
                format!("{}; token expired, refreshes on next request", state.label())
            }
            (SessionState::Authenticated, None) => format!(
                "{}; token expired and cannot be refreshed, run `music-stats login`",
                state.label()
            ),
            _ => state.label().to_string(),
        }
    }

    pub fn logout(&self) -> String {
        self.session.logout();
        "Logged out".to_string()
    }

    pub async fn whoami(&self) -> Result<String> {
        let profile = current_user(&self.gateway)
            .await
            .map_err(|e| self.upstream_failure(e))?;
        if self.json {
            return Ok(serde_json::json!({
                "id": profile.id,
                "display_name": profile.display_name,
                "country": profile.country,
                "product": profile.product,
            })
            .to_string());
        }
        let name = profile.display_name.as_deref().unwrap_or(&profile.id);
        Ok(format!(
            "{name} ({}), {} plan",
            profile.id,
            profile.product.as_deref().unwrap_or("unknown")
        ))
    }

    pub async fn genres(&self, range: TimeRange, limit: u32) -> Result<String> {
        let artists = top_artists(&self.gateway, range, limit)
            .await
            .map_err(|e| self.upstream_failure(e))?;
        let shares = genre_distribution(&artists.items, |a| a.genres.as_slice());
        if self.json {
            return Ok(serde_json::to_string_pretty(&shares)?);
        }
        if shares.is_empty() {
            return Ok(format!("No genres found in your top artists ({range})"));
        }
        let mut out = String::new();
        writeln!(out, "Genres across {} top artists ({range}):", artists.items.len())?;
        for share in &shares {
            writeln!(
                out,
                "  {:<32} {:>4}  {:>5.1}%",
                share.genre, share.count, share.percentage
            )?;
        }
        Ok(out.trim_end().to_string())
    }

    pub async fn albums(&self, limit: usize) -> Result<String> {
        let history = recently_played(&self.gateway, HISTORY_PAGE)
            .await
            .map_err(|e| self.upstream_failure(e))?;
        let ranked = rank_groups(
            &history.items,
            |play| play.track.album.id.clone(),
            |play| {
                let album = &play.track.album;
                let artists: Vec<&str> = album.artists.iter().map(|a| a.name.as_str()).collect();
                if artists.is_empty() {
                    album.name.clone()
                } else {
                    format!("{} by {}", album.name, artists.join(", "))
                }
            },
            |play| f64::from(play.track.popularity),
            limit,
        );
        if self.json {
            return Ok(serde_json::to_string_pretty(&ranked)?);
        }
        if ranked.is_empty() {
            return Ok("No recent plays".to_string());
        }
        let mut out = String::new();
        writeln!(out, "Most played albums in the last {} plays:", history.items.len())?;
        for (pos, group) in ranked.iter().enumerate() {
            writeln!(
                out,
                "  {:>2}. {:<48} {:>3} plays  avg popularity {:.0}",
                pos + 1,
                group.label,
                group.count,
                group.average
            )?;
        }
        Ok(out.trim_end().to_string())
    }

    /// Turn a gateway failure into the message the user sees, signing out
    /// when the service no longer accepts the session.
    fn upstream_failure(&self, err: UpstreamError) -> anyhow::Error {
        match err.kind {
            UpstreamErrorKind::Unauthorized => {
                warn!(endpoint = %err.endpoint, status = ?err.status, "session unauthorized, logging out");
                self.session.logout();
                if err.status.is_some() {
                    anyhow!("Spotify rejected the session; logged out. Run `music-stats login`.")
                } else {
                    anyhow!("Not logged in. Run `music-stats login`.")
                }
            }
            UpstreamErrorKind::RateLimited => match err.retry_after() {
                Some(wait) => anyhow!("Rate limited by Spotify; retry after {}s", wait.as_secs()),
                None => anyhow!("Rate limited by Spotify; try again later"),
            },
            UpstreamErrorKind::Forbidden => {
                anyhow!("{err}: access forbidden (missing scope? run `music-stats login` again)")
            }
            UpstreamErrorKind::Transient | UpstreamErrorKind::Malformed => anyhow!(err),
        }
    }
}
