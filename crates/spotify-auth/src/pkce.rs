//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The verifier stays with the session and is sent during the token
//! exchange; the S256 challenge goes into the authorization redirect so the
//! service can check that whoever redeems the code also started the flow.
//!
//! Randomness comes from an injected [`EntropySource`]. Production uses
//! [`OsEntropy`]; a read failure is an error, never a silent fallback.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// Random bytes behind each verifier. 64 bytes encode to 86 characters,
/// inside RFC 7636's 43..=128 range.
const VERIFIER_BYTES: usize = 64;

/// Source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        rand::rngs::OsRng
            .try_fill_bytes(dest)
            .map_err(|e| Error::Entropy(e.to_string()))
    }
}

/// A fresh verifier and its S256 challenge.
#[derive(Debug)]
pub struct Challenge {
    pub verifier: common::Secret<String>,
    pub challenge: String,
}

/// Generate a verifier from `entropy` and derive its challenge.
pub fn create_challenge(entropy: &dyn EntropySource) -> Result<Challenge> {
    let mut bytes = [0u8; VERIFIER_BYTES];
    entropy.fill(&mut bytes)?;
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    bytes.zeroize();
    let challenge = compute_challenge(&verifier);
    Ok(Challenge {
        verifier: common::Secret::new(verifier),
        challenge,
    })
}

/// `BASE64URL_NOPAD(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Authorization redirect: target endpoint plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub endpoint: String,
    pub params: Vec<(&'static str, String)>,
}

impl AuthorizationRequest {
    /// Look up one query parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Render the full redirect URL with form-encoded parameters.
    pub fn url(&self) -> Result<String> {
        reqwest::Url::parse_with_params(&self.endpoint, &self.params)
            .map(String::from)
            .map_err(|e| Error::InvalidConfig(format!("authorize endpoint: {e}")))
    }
}

/// Build the authorization request for `challenge` from client config.
pub fn build_authorization_request(config: &OAuthConfig, challenge: &str) -> AuthorizationRequest {
    AuthorizationRequest {
        endpoint: config.authorize_endpoint.clone(),
        params: vec![
            ("client_id", config.client_id.clone()),
            ("response_type", "code".to_string()),
            ("redirect_uri", config.redirect_uri.clone()),
            ("scope", config.scopes.clone()),
            ("code_challenge_method", "S256".to_string()),
            ("code_challenge", challenge.to_string()),
            ("show_dialog", config.show_dialog.to_string()),
        ],
    }
}
