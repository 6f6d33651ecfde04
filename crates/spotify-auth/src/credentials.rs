//! Credential type and the token store that persists it
//!
//! Layout in the key-value store, each key independent:
//! - `session.credential`: JSON `{"access_token", "refresh_token"?}`
//! - `session.expires_at`: unix milliseconds as a decimal string
//! - `session.verifier`: pending PKCE verifier
//!
//! A credential blob without a readable expiry (or the reverse) is treated
//! as no credential at all.

use std::sync::Arc;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use crate::token::TokenResponse;

pub const CREDENTIAL_KEY: &str = "session.credential";
pub const EXPIRES_AT_KEY: &str = "session.expires_at";
pub const VERIFIER_KEY: &str = "session.verifier";
pub const VERIFIER_CREATED_AT_KEY: &str = "session.verifier_created_at";

/// Access token, optional refresh token and absolute expiry.
///
/// Construction goes through [`Credential::issue`] or the store, so an empty
/// access token never makes it into a `Credential`.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    access_token: Secret<String>,
    refresh_token: Option<Secret<String>>,
    /// Expiration as unix timestamp in milliseconds
    expires_at: u64,
}

impl Credential {
    /// Build a credential from a token response received at `issued_at`
    /// (unix millis). A response without a refresh token inherits
    /// `previous_refresh`.
    pub fn issue(
        response: TokenResponse,
        issued_at: u64,
        previous_refresh: Option<&Secret<String>>,
    ) -> Result<Self> {
        let TokenResponse {
            access_token,
            refresh_token,
            expires_in,
        } = response;
        if access_token.is_empty() {
            return Err(Error::ExchangeFailed(
                "token response has an empty access_token".into(),
            ));
        }
        let refresh_token = match refresh_token {
            Some(token) if !token.is_empty() => Some(Secret::new(token)),
            _ => previous_refresh.cloned(),
        };
        Ok(Self {
            access_token: Secret::new(access_token),
            refresh_token,
            expires_at: issued_at.saturating_add(expires_in.saturating_mul(1000)),
        })
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose()
    }

    pub fn refresh_token(&self) -> Option<&Secret<String>> {
        self.refresh_token.as_ref()
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Still usable at `now` (unix millis).
    pub fn is_fresh(&self, now: u64) -> bool {
        now < self.expires_at
    }

    /// Milliseconds of validity left at `now`, zero once expired.
    pub fn remaining_millis(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// Typed view over the session keys of a [`KeyValueStore`].
#[derive(Clone)]
pub struct TokenStore {
    kv: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Read the stored credential, if both keys are present and valid.
    pub fn load_credential(&self) -> Option<Credential> {
        let blob = self.kv.get(CREDENTIAL_KEY)?;
        let expires_at = match self.kv.get(EXPIRES_AT_KEY)?.trim().parse::<u64>() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stored expiry is not a timestamp, ignoring credential");
                return None;
            }
        };
        let stored: StoredCredential = match serde_json::from_str(&blob) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "stored credential blob is unreadable, ignoring");
                return None;
            }
        };
        if stored.access_token.is_empty() {
            warn!("stored credential has an empty access token, ignoring");
            return None;
        }
        Some(Credential {
            access_token: Secret::new(stored.access_token),
            refresh_token: stored
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(Secret::new),
            expires_at,
        })
    }

    /// Whether any credential key exists, valid or not.
    pub fn has_credential_material(&self) -> bool {
        self.kv.get(CREDENTIAL_KEY).is_some() || self.kv.get(EXPIRES_AT_KEY).is_some()
    }

    pub fn save_credential(&self, credential: &Credential) -> Result<()> {
        let blob = serde_json::to_string(&StoredCredential {
            access_token: credential.access_token.expose().clone(),
            refresh_token: credential.refresh_token.as_ref().map(|t| t.expose().clone()),
        })
        .map_err(|e| Error::Storage(format!("serializing credential: {e}")))?;
        self.kv.set(CREDENTIAL_KEY, &blob)?;
        self.kv
            .set(EXPIRES_AT_KEY, &credential.expires_at.to_string())
    }

    /// Remove both credential keys. Both removals are attempted even if the
    /// first fails.
    pub fn clear_credential(&self) -> Result<()> {
        let blob = self.kv.remove(CREDENTIAL_KEY);
        let expiry = self.kv.remove(EXPIRES_AT_KEY);
        blob.and(expiry)
    }

    /// Read the pending verifier and the unix-millis time it was created.
    ///
    /// A verifier without a readable creation time is ignored: its age is
    /// unknown, so it cannot be held to the handshake TTL.
    pub fn load_verifier(&self) -> Option<(Secret<String>, u64)> {
        let verifier = self.kv.get(VERIFIER_KEY).filter(|v| !v.is_empty())?;
        let created_at = match self.kv.get(VERIFIER_CREATED_AT_KEY)?.trim().parse::<u64>() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stored verifier time is not a timestamp, ignoring verifier");
                return None;
            }
        };
        Some((Secret::new(verifier), created_at))
    }

    /// Whether any verifier key exists, valid or not.
    pub fn has_verifier_material(&self) -> bool {
        self.kv.get(VERIFIER_KEY).is_some() || self.kv.get(VERIFIER_CREATED_AT_KEY).is_some()
    }

    pub fn save_verifier(&self, verifier: &Secret<String>, created_at: u64) -> Result<()> {
        self.kv.set(VERIFIER_KEY, verifier.expose())?;
        self.kv
            .set(VERIFIER_CREATED_AT_KEY, &created_at.to_string())
    }

    /// Remove both verifier keys. Both removals are attempted even if the
    /// first fails.
    pub fn clear_verifier(&self) -> Result<()> {
        let verifier = self.kv.remove(VERIFIER_KEY);
        let created_at = self.kv.remove(VERIFIER_CREATED_AT_KEY);
        verifier.and(created_at)
    }

    /// Remove every session key.
    pub fn clear_all(&self) -> Result<()> {
        let credential = self.clear_credential();
        let verifier = self.clear_verifier();
        credential.and(verifier)
    }
}
