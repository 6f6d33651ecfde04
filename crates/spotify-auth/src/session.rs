//! Session lifecycle: PKCE handshake, credential refresh and logout
//!
//! ```text
//! Unauthenticated ──initiate──▶ HandshakePending ──complete──▶ Authenticated
//!        ▲                             │ (denied / bad code /        │
//!        │                             │  exchange failure)          │ expired
//!        └─────────────────────────────┘                             ▼
//!        ◀────────────── refresh failed / no refresh token ──── Refreshing
//! ```
//! `logout()` returns to `Unauthenticated` from any state.
//!
//! Locking: `serial` (async) is held for the whole of `initiate`,
//! `complete_handshake` and `current_credential`, so two refreshes never
//! overlap. `shared` (sync) guards the handshake, the logout epoch and every
//! store write. Logout bumps the epoch under `shared`; a network result is
//! only committed if the epoch it started under is still current, checked
//! under the same lock. In-flight calls are also raced against the epoch
//! channel so logout abandons them immediately.

use std::future::Future;
use std::sync::Arc;

use common::Secret;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::OAuthConfig;
use crate::constants::MAX_CODE_LEN;
use crate::credentials::{Credential, TokenStore};
use crate::error::{Error, Result};
use crate::pkce::{self, AuthorizationRequest, EntropySource, OsEntropy};
use crate::store::KeyValueStore;
use crate::token;

/// Why the session is signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedOutReason {
    /// Nothing stored yet
    Initial,
    LoggedOut,
    /// Credential expired and could not be refreshed
    Expired,
    /// Last handshake was denied, malformed or failed at the token endpoint
    HandshakeFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated(SignedOutReason),
    HandshakePending,
    Authenticated,
    Refreshing,
}

impl SessionState {
    /// Label for logs and status output.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated(SignedOutReason::Expired) => "unauthenticated(expired)",
            SessionState::Unauthenticated(_) => "unauthenticated",
            SessionState::HandshakePending => "handshake_pending",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
        }
    }
}

struct HandshakeState {
    verifier: Secret<String>,
    created_at: u64,
}

struct Shared {
    handshake: Option<HandshakeState>,
    epoch: u64,
}

/// Owner of the credential and the handshake for one user session.
///
/// Share it with `Arc`; every consumer goes through these methods.
pub struct SessionManager {
    config: OAuthConfig,
    client: reqwest::Client,
    store: TokenStore,
    entropy: Arc<dyn EntropySource>,
    clock: Arc<dyn Clock>,
    serial: tokio::sync::Mutex<()>,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<SessionState>,
    epoch_tx: watch::Sender<u64>,
}

impl SessionManager {
    /// Session backed by `kv`, using the OS random source and system time.
    pub fn new(config: OAuthConfig, client: reqwest::Client, kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_parts(config, client, kv, Arc::new(OsEntropy), Arc::new(SystemClock))
    }

    /// Session with explicit entropy and clock sources.
    ///
    /// Restores from `kv`: a stored credential means `Authenticated`, a stored
    /// verifier means `HandshakePending`, anything else `Unauthenticated`.
    pub fn with_parts(
        config: OAuthConfig,
        client: reqwest::Client,
        kv: Arc<dyn KeyValueStore>,
        entropy: Arc<dyn EntropySource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = TokenStore::new(kv);
        let (state, handshake) = restore(&store);
        info!(state = state.label(), "session restored");
        let (state_tx, _) = watch::channel(state);
        let (epoch_tx, _) = watch::channel(0);
        Self {
            config,
            client,
            store,
            entropy,
            clock,
            serial: tokio::sync::Mutex::new(()),
            shared: Mutex::new(Shared {
                handshake,
                epoch: 0,
            }),
            state_tx,
            epoch_tx,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Start a handshake: new verifier, persisted, plus the redirect to send
    /// the user to. Replaces any pending handshake.
    pub async fn initiate(&self) -> Result<AuthorizationRequest> {
        let _serial = self.serial.lock().await;
        let mut shared = self.shared.lock();

        let state = self.state();
        if matches!(
            state,
            SessionState::Authenticated | SessionState::Refreshing
        ) {
            return Err(Error::InvalidState {
                operation: "initiate",
                state: state.label(),
            });
        }

        let pair = pkce::create_challenge(self.entropy.as_ref())?;
        let created_at = self.clock.now_millis();
        self.store.save_verifier(&pair.verifier, created_at)?;
        if shared.handshake.is_some() {
            debug!("replacing pending handshake");
        }
        shared.handshake = Some(HandshakeState {
            verifier: pair.verifier,
            created_at,
        });
        self.set_state(SessionState::HandshakePending);
        info!("handshake initiated");

        Ok(pkce::build_authorization_request(
            &self.config,
            &pair.challenge,
        ))
    }

    /// Finish the handshake with the redirect's `code` or `error`.
    ///
    /// The pending handshake is consumed by this call whatever the outcome;
    /// a failed attempt needs a fresh `initiate()`.
    pub async fn complete_handshake(
        &self,
        code: Option<&str>,
        reported_error: Option<&str>,
    ) -> Result<SessionState> {
        let _serial = self.serial.lock().await;

        let (handshake, epoch) = {
            let mut shared = self.shared.lock();
            match shared.handshake.take() {
                Some(h) => (h, shared.epoch),
                None => {
                    debug!("callback without pending handshake");
                    return Err(Error::NoPendingHandshake);
                }
            }
        };

        let age = self.clock.now_millis().saturating_sub(handshake.created_at);
        if u128::from(age) > self.config.handshake_ttl().as_millis() {
            warn!(age_secs = age / 1000, "pending handshake expired");
            self.fail_handshake(epoch);
            return Err(Error::NoPendingHandshake);
        }

        if let Some(reason) = reported_error {
            warn!(error = reason, "authorization denied by user or service");
            self.fail_handshake(epoch);
            return Err(Error::AuthorizationDenied(reason.to_string()));
        }

        let code = code.unwrap_or_default();
        if !is_valid_code(code) {
            warn!(len = code.len(), "rejecting malformed authorization code");
            self.fail_handshake(epoch);
            return Err(Error::InvalidCode);
        }

        let exchange = token::exchange_code(
            &self.client,
            &self.config,
            code,
            handshake.verifier.expose(),
        );
        let response = match self.abortable(epoch, exchange).await {
            None => {
                info!("logout during token exchange, discarding result");
                return Err(Error::NoPendingHandshake);
            }
            Some(Err(e)) => {
                warn!(endpoint = %self.config.token_endpoint, error = %e, "token exchange failed");
                self.fail_handshake(epoch);
                return Err(match e {
                    Error::Transient(_) | Error::ExchangeFailed(_) => e,
                    other => Error::ExchangeFailed(other.to_string()),
                });
            }
            Some(Ok(response)) => response,
        };
        drop(handshake);

        let credential = match Credential::issue(response, self.clock.now_millis(), None) {
            Ok(c) => c,
            Err(e) => {
                self.fail_handshake(epoch);
                return Err(e);
            }
        };

        let shared = self.shared.lock();
        if shared.epoch != epoch {
            info!("logout during token exchange, discarding result");
            return Err(Error::NoPendingHandshake);
        }
        if let Err(e) = self.store.save_credential(&credential) {
            warn!(error = %e, "failed to persist credential");
            self.clear_store();
            self.set_state(SessionState::Unauthenticated(
                SignedOutReason::HandshakeFailed,
            ));
            return Err(e);
        }
        if let Err(e) = self.store.clear_verifier() {
            warn!(error = %e, "failed to clear verifier");
        }
        self.set_state(SessionState::Authenticated);
        info!(
            expires_in_secs = credential.remaining_millis(self.clock.now_millis()) / 1000,
            "handshake complete"
        );
        Ok(SessionState::Authenticated)
    }

    /// The current credential, refreshing it first if it has expired.
    ///
    /// Returns `None` when signed out. Never returns an expired credential:
    /// if refresh is impossible or fails, every stored key is cleared and
    /// the session moves to `Unauthenticated(Expired)`.
    pub async fn current_credential(&self) -> Option<Credential> {
        let _serial = self.serial.lock().await;

        let (credential, epoch) = {
            let shared = self.shared.lock();
            if self.state() != SessionState::Authenticated {
                return None;
            }
            (self.store.load_credential(), shared.epoch)
        };

        let Some(credential) = credential else {
            warn!("credential missing from store");
            self.expire(epoch);
            return None;
        };
        if credential.is_fresh(self.clock.now_millis()) {
            return Some(credential);
        }

        let Some(refresh) = credential.refresh_token().cloned() else {
            info!("credential expired with no refresh token");
            self.expire(epoch);
            return None;
        };

        {
            let shared = self.shared.lock();
            if shared.epoch != epoch {
                return None;
            }
            self.set_state(SessionState::Refreshing);
        }
        debug!("credential expired, refreshing");

        let refreshed = token::refresh_token(&self.client, &self.config, refresh.expose());
        let response = match self.abortable(epoch, refreshed).await {
            None => {
                info!("logout during refresh, discarding result");
                return None;
            }
            Some(Err(e)) => {
                warn!(endpoint = %self.config.token_endpoint, error = %e, "token refresh failed, signing out");
                metrics::counter!("session_refresh_total", "outcome" => "failed").increment(1);
                self.expire(epoch);
                return None;
            }
            Some(Ok(response)) => response,
        };

        let now = self.clock.now_millis();
        let credential = match Credential::issue(response, now, Some(&refresh)) {
            Ok(c) if c.is_fresh(now) => c,
            Ok(_) => {
                warn!("refresh returned an already expired token, signing out");
                metrics::counter!("session_refresh_total", "outcome" => "failed").increment(1);
                self.expire(epoch);
                return None;
            }
            Err(e) => {
                warn!(error = %e, "refresh response unusable, signing out");
                metrics::counter!("session_refresh_total", "outcome" => "failed").increment(1);
                self.expire(epoch);
                return None;
            }
        };

        let shared = self.shared.lock();
        if shared.epoch != epoch {
            info!("logout during refresh, discarding result");
            return None;
        }
        if let Err(e) = self.store.save_credential(&credential) {
            warn!(error = %e, "failed to persist refreshed credential");
        }
        self.set_state(SessionState::Authenticated);
        metrics::counter!("session_refresh_total", "outcome" => "success").increment(1);
        info!("credential refreshed");
        Some(credential)
    }

    /// The current credential only if it is unexpired. Never refreshes and
    /// never changes state; for callers that cannot await.
    pub fn credential_if_fresh(&self) -> Option<Credential> {
        let _shared = self.shared.lock();
        if !matches!(
            self.state(),
            SessionState::Authenticated | SessionState::Refreshing
        ) {
            return None;
        }
        self.store
            .load_credential()
            .filter(|c| c.is_fresh(self.clock.now_millis()))
    }

    /// Whether the stored credential carries a refresh token, expired or not.
    pub fn can_refresh(&self) -> bool {
        let _shared = self.shared.lock();
        self.store
            .load_credential()
            .is_some_and(|c| c.refresh_token().is_some())
    }

    /// Drop the credential and any pending handshake. Valid from any state;
    /// an in-flight exchange or refresh is abandoned and cannot write back.
    pub fn logout(&self) {
        let mut shared = self.shared.lock();
        shared.epoch += 1;
        shared.handshake = None;
        self.clear_store();
        self.epoch_tx.send_replace(shared.epoch);
        self.set_state(SessionState::Unauthenticated(SignedOutReason::LoggedOut));
        info!("logged out");
    }

    /// Run `fut` unless logout happens first.
    async fn abortable<F, T>(&self, epoch: u64, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let mut epochs = self.epoch_tx.subscribe();
        if *epochs.borrow_and_update() != epoch {
            return None;
        }
        let logged_out = async {
            let _ = epochs.wait_for(|current| *current != epoch).await;
        };
        tokio::select! {
            out = fut => Some(out),
            () = logged_out => None,
        }
    }

    /// Terminal handshake failure for the attempt started under `epoch`.
    fn fail_handshake(&self, epoch: u64) {
        let shared = self.shared.lock();
        if shared.epoch != epoch {
            return;
        }
        if let Err(e) = self.store.clear_verifier() {
            warn!(error = %e, "failed to clear verifier");
        }
        self.set_state(SessionState::Unauthenticated(
            SignedOutReason::HandshakeFailed,
        ));
    }

    /// Irrecoverable expiry: clear everything for the session under `epoch`.
    fn expire(&self, epoch: u64) {
        let shared = self.shared.lock();
        if shared.epoch != epoch {
            return;
        }
        self.clear_store();
        self.set_state(SessionState::Unauthenticated(SignedOutReason::Expired));
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear_all() {
            warn!(error = %e, "failed to clear session store");
        }
    }

    fn set_state(&self, next: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = current.label(), to = next.label(), "session transition");
            *current = next;
            true
        });
    }
}

/// Rebuild state from persisted keys.
///
/// A restored handshake keeps its stored creation time, so its TTL runs
/// across process restarts.
fn restore(store: &TokenStore) -> (SessionState, Option<HandshakeState>) {
    if store.load_credential().is_some() {
        if store.has_verifier_material() {
            if let Err(e) = store.clear_verifier() {
                warn!(error = %e, "failed to clear stale verifier");
            }
        }
        return (SessionState::Authenticated, None);
    }
    if store.has_credential_material() {
        warn!("clearing incomplete credential");
        if let Err(e) = store.clear_credential() {
            warn!(error = %e, "failed to clear incomplete credential");
        }
    }
    match store.load_verifier() {
        Some((verifier, created_at)) => (
            SessionState::HandshakePending,
            Some(HandshakeState {
                verifier,
                created_at,
            }),
        ),
        None => {
            if store.has_verifier_material() {
                warn!("clearing incomplete verifier");
                if let Err(e) = store.clear_verifier() {
                    warn!(error = %e, "failed to clear incomplete verifier");
                }
            }
            (SessionState::Unauthenticated(SignedOutReason::Initial), None)
        }
    }
}

/// Authorization codes are opaque but drawn from the URL-unreserved set.
/// Anything else is rejected outright, never trimmed or repaired.
fn is_valid_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}
