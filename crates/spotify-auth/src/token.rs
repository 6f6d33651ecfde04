//! Token endpoint calls: authorization code exchange and refresh
//!
//! Both POST form bodies to `OAuthConfig::token_endpoint` with different
//! grant types and share one response shape. Every request carries the
//! configured timeout; a timeout or connection failure surfaces as
//! `Error::Transient` so callers can tell it apart from an upstream refusal.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// Longest slice of an error body kept in an error message
const MAX_ERROR_BODY: usize = 200;

/// Response from the token endpoint for both exchange and refresh.
///
/// `refresh_token` is optional: Spotify omits it on some refreshes, in which
/// case the previous refresh token stays valid.
#[derive(Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchange an authorization code plus PKCE verifier for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_endpoint)
        .timeout(config.timeout())
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| transport_error("token exchange", e))?;

    let status = response.status();
    debug!(endpoint = %config.token_endpoint, status = status.as_u16(), "token exchange response");
    if !status.is_success() {
        let body = error_body(response).await;
        return Err(Error::ExchangeFailed(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::ExchangeFailed(format!("invalid token response: {e}")))
}

/// Trade a refresh token for a new access token.
///
/// 400/401/403 mean the refresh token is revoked or unknown
/// (`RefreshRejected`); other non-2xx statuses are reported as `Transient`.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &OAuthConfig,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_endpoint)
        .timeout(config.timeout())
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", config.client_id.as_str()),
        ])
        .send()
        .await
        .map_err(|e| transport_error("token refresh", e))?;

    let status = response.status();
    debug!(endpoint = %config.token_endpoint, status = status.as_u16(), "token refresh response");
    if !status.is_success() {
        let body = error_body(response).await;
        return match status.as_u16() {
            400 | 401 | 403 => Err(Error::RefreshRejected(format!(
                "token endpoint returned {status}: {body}"
            ))),
            _ => Err(Error::Transient(format!(
                "token refresh returned {status}: {body}"
            ))),
        };
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::ExchangeFailed(format!("invalid refresh response: {e}")))
}

fn transport_error(operation: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Transient(format!("{operation} timed out"))
    } else {
        Error::Transient(format!("{operation} request failed: {e}"))
    }
}

async fn error_body(response: reqwest::Response) -> String {
    let mut body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
