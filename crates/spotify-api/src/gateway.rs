//! Authenticated gateway to the Web API
//!
//! Each call asks a [`CredentialSource`] for a credential, sends it as a
//! bearer token and turns the response into either the decoded body or an
//! [`UpstreamError`]. The gateway holds no locks across the network call,
//! never retries and never touches session state; reacting to
//! `Unauthorized` (logging out) is the caller's decision.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use spotify_auth::{Credential, SessionManager};
use tracing::{debug, warn};

use crate::classify::error_for_response;
use crate::config::ApiConfig;
use crate::error::{UpstreamError, UpstreamErrorKind};
use crate::metrics;

/// Supplier of the credential for the next request.
///
/// Uses `Pin<Box<dyn Future>>` so it can sit behind `Arc<dyn CredentialSource>`.
pub trait CredentialSource: Send + Sync {
    /// A usable credential, refreshed if needed, or `None` when signed out.
    fn credential(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>>;
}

impl CredentialSource for SessionManager {
    fn credential(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>> {
        Box::pin(self.current_credential())
    }
}

pub struct Gateway {
    source: Arc<dyn CredentialSource>,
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Gateway {
    pub fn new(source: Arc<dyn CredentialSource>, client: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            source,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        }
    }

    /// GET `endpoint` (a path under the base URL) with query `params` and
    /// decode the JSON body into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let started = Instant::now();
        let result = self.send(endpoint, params).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind.as_str(),
        };
        metrics::record_request(outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let Some(credential) = self.source.credential().await else {
            debug!(endpoint, "no credential, not sending request");
            return Err(UpstreamError::new(UpstreamErrorKind::Unauthorized, endpoint));
        };

        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.access_token())
            .query(params)
            .timeout(self.timeout)
            .send()
            .await;
        drop(credential);

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    warn!(endpoint, timeout_secs = self.timeout.as_secs(), "upstream request timed out");
                } else {
                    warn!(endpoint, error = %e, "upstream request failed");
                }
                return Err(UpstreamError::new(UpstreamErrorKind::Transient, endpoint));
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let err = error_for_response(endpoint, status, response.headers());
            warn!(
                endpoint,
                status,
                kind = %err.kind,
                retry_after_secs = err.retry_after.map(|d| d.as_secs()),
                "upstream returned error status"
            );
            return Err(err);
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(endpoint, status, error = %e, "failed to read upstream body");
                return Err(
                    UpstreamError::new(UpstreamErrorKind::Transient, endpoint).with_status(status)
                );
            }
        };

        serde_json::from_slice(&body).map_err(|e| {
            warn!(endpoint, status, error = %e, "upstream body did not match expected shape");
            UpstreamError::new(UpstreamErrorKind::Malformed, endpoint).with_status(status)
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use serde::Deserialize;
    use spotify_auth::{KeyValueStore, MemoryStore, OAuthConfig, TokenResponse};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Credential source that hands out a fixed answer and counts calls.
    pub(crate) struct StaticSource {
        credential: Option<Credential>,
        pub(crate) calls: AtomicUsize,
    }

    impl StaticSource {
        pub(crate) fn token(access: &str) -> Arc<Self> {
            let response = TokenResponse {
                access_token: access.to_string(),
                refresh_token: None,
                expires_in: 3600,
            };
            Arc::new(Self {
                credential: Some(Credential::issue(response, 0, None).unwrap()),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn signed_out() -> Arc<Self> {
            Arc::new(Self {
                credential: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl CredentialSource for StaticSource {
        fn credential(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let credential = self.credential.clone();
            Box::pin(async move { credential })
        }
    }

    pub(crate) struct MockApi {
        pub(crate) base_url: String,
        pub(crate) hits: Arc<AtomicUsize>,
        pub(crate) auth_headers: Arc<Mutex<Vec<String>>>,
        pub(crate) queries: Arc<Mutex<Vec<String>>>,
    }

    /// Stub Web API: `/status/{code}` answers with that status, `/garbage`
    /// with undecodable JSON, `/slow` after ten seconds, and any other path
    /// with `body`.
    pub(crate) async fn start_api(body: &'static str) -> MockApi {
        let hits = Arc::new(AtomicUsize::new(0));
        let auth_headers = Arc::new(Mutex::new(Vec::new()));
        let queries = Arc::new(Mutex::new(Vec::new()));
        let (h, a, q) = (hits.clone(), auth_headers.clone(), queries.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/status/{code}",
                    axum::routing::get(|Path(code): Path<u16>| async move {
                        let status = StatusCode::from_u16(code).unwrap();
                        let mut headers = HeaderMap::new();
                        if code == 429 {
                            headers.insert("retry-after", "30".parse().unwrap());
                        }
                        (status, headers, r#"{"error":{"status":0,"message":"x"}}"#)
                    }),
                )
                .route("/garbage", axum::routing::get(|| async { "<html>oops</html>" }))
                .route(
                    "/slow",
                    axum::routing::get(|| async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        "{}"
                    }),
                )
                .fallback(move |headers: HeaderMap, uri: axum::http::Uri| {
                    let (h, a, q) = (h.clone(), a.clone(), q.clone());
                    async move {
                        h.fetch_add(1, Ordering::SeqCst);
                        if let Some(v) = headers.get("authorization") {
                            a.lock().unwrap().push(v.to_str().unwrap().to_string());
                        }
                        q.lock()
                            .unwrap()
                            .push(uri.query().unwrap_or_default().to_string());
                        (
                            [(axum::http::header::CONTENT_TYPE, "application/json")],
                            body,
                        )
                            .into_response()
                    }
                });
            axum::serve(listener, app).await.unwrap();
        });

        MockApi {
            base_url: format!("http://{addr}"),
            hits,
            auth_headers,
            queries,
        }
    }

    pub(crate) fn gateway(source: Arc<dyn CredentialSource>, base_url: &str) -> Gateway {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: 1,
        };
        Gateway::new(source, reqwest::Client::new(), &config)
    }

    #[derive(Debug, Deserialize)]
    struct Profile {
        id: String,
    }

    #[tokio::test]
    async fn sends_bearer_and_decodes() {
        let api = start_api(r#"{"id":"user-1"}"#).await;
        let gw = gateway(StaticSource::token("BQD-abc"), &api.base_url);

        let profile: Profile = gw
            .request("/me", &[("limit", "5".to_string())])
            .await
            .unwrap();
        assert_eq!(profile.id, "user-1");
        assert_eq!(api.auth_headers.lock().unwrap()[0], "Bearer BQD-abc");
        assert_eq!(api.queries.lock().unwrap()[0], "limit=5");
    }

    #[tokio::test]
    async fn no_credential_means_unauthorized_without_network() {
        let api = start_api(r#"{"id":"user-1"}"#).await;
        let source = StaticSource::signed_out();
        let gw = gateway(source.clone(), &api.base_url);

        let err = gw.request::<Profile>("/me", &[]).await.unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Unauthorized);
        assert_eq!(err.status, None);
        assert_eq!(err.endpoint, "/me");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn status_mapping_is_exact() {
        let api = start_api("{}").await;
        let gw = gateway(StaticSource::token("t"), &api.base_url);

        let cases = [
            (401, UpstreamErrorKind::Unauthorized),
            (403, UpstreamErrorKind::Forbidden),
            (429, UpstreamErrorKind::RateLimited),
            (400, UpstreamErrorKind::Transient),
            (404, UpstreamErrorKind::Transient),
            (500, UpstreamErrorKind::Transient),
            (502, UpstreamErrorKind::Transient),
            (503, UpstreamErrorKind::Transient),
        ];
        for (status, kind) in cases {
            let endpoint = format!("/status/{status}");
            let err = gw
                .request::<serde_json::Value>(&endpoint, &[])
                .await
                .unwrap_err();
            assert_eq!(err.kind, kind, "status {status}");
            assert_eq!(err.status, Some(status));
            assert_eq!(err.endpoint, endpoint);
        }
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let api = start_api("{}").await;
        let gw = gateway(StaticSource::token("t"), &api.base_url);

        let err = gw
            .request::<serde_json::Value>("/status/429", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let api = start_api("{}").await;
        let gw = gateway(StaticSource::token("t"), &api.base_url);

        let err = gw.request::<Profile>("/garbage", &[]).await.unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Malformed);
        assert_eq!(err.status, Some(200));

        let err = gw.request::<Profile>("/me", &[]).await.unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Malformed, "missing field");
    }

    #[tokio::test]
    async fn timeout_is_transient() {
        let api = start_api("{}").await;
        let gw = gateway(StaticSource::token("t"), &api.base_url);

        let err = gw
            .request::<serde_json::Value>("/slow", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Transient);
        assert_eq!(err.status, None);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gw = gateway(StaticSource::token("t"), &format!("http://{addr}"));
        let err = gw
            .request::<serde_json::Value>("/me", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Transient);
    }

    #[tokio::test]
    async fn unauthorized_leaves_session_alone() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("session.credential", r#"{"access_token":"at_live"}"#)
            .unwrap();
        kv.set("session.expires_at", &u64::MAX.to_string()).unwrap();
        let session = Arc::new(SessionManager::new(
            OAuthConfig::new("client-test"),
            reqwest::Client::new(),
            kv.clone(),
        ));

        let api = start_api("{}").await;
        let gw = gateway(session.clone(), &api.base_url);
        let err = gw
            .request::<serde_json::Value>("/status/401", &[])
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(session.state(), spotify_auth::SessionState::Authenticated);
        assert!(kv.get("session.credential").is_some());
    }
}
