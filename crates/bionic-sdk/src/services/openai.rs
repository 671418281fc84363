//! Shared HTTP plumbing for OpenAI-compatible endpoints.
//!
//! Requests are retried with exponential backoff (`base · 2^attempt`) and every
//! failure is reported as an [`SDKError`]; callers never see a partially
//! parsed body.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{SDKError, SDKResult};

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for one OpenAI-compatible base URL.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    backoff: Duration,
    service: &'static str,
}

impl OpenAiClient {
    pub fn new(service: &'static str, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            max_retries: 0,
            backoff: Duration::from_secs(1),
            service,
        }
    }

    /// Retries after the first attempt.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay doubled on every retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base_url}/{path}` and decode the JSON response.
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req, timeout: Duration) -> SDKResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let attempts = self.max_retries + 1;
        let mut attempt = 0;
        loop {
            match self.post_once(path, body, timeout).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt + 1 < attempts => {
                    let wait = self.backoff * 2u32.saturating_pow(attempt);
                    warn!(
                        service = self.service,
                        attempt = attempt + 1,
                        attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once<Req, Resp>(&self, path: &str, body: &Req, timeout: Duration) -> SDKResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(service = self.service, url = %url, "Sending request");

        let mut request = self.client.post(&url).timeout(timeout).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SDKError::timeout(timeout.as_millis() as u64)
            } else {
                SDKError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(SDKError::malformed(
                self.service,
                format!("HTTP {}: {}", status, message),
            ));
        }

        serde_json::from_str(&text)
            .map_err(|e| SDKError::malformed(self.service, format!("undecodable body: {}", e)))
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal axum server standing in for a remote API in tests.

    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Deserialize)]
    struct Echo {
        ok: bool,
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/ping",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": {"message": "busy"}})))
                    } else {
                        (StatusCode::OK, Json(json!({"ok": true})))
                    }
                }
            }),
        );
        let base = test_server::spawn(router).await;

        let client = OpenAiClient::new("test", base, None)
            .with_retries(2)
            .with_backoff(Duration::from_millis(1));
        let resp: Echo = client
            .post_json("ping", &json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(resp.ok);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let router = Router::new().route(
            "/ping",
            post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "bad model"}}))) }),
        );
        let base = test_server::spawn(router).await;

        let client = OpenAiClient::new("test", base, Some("sk-test".into()))
            .with_retries(1)
            .with_backoff(Duration::from_millis(1));
        let err = client
            .post_json::<Value, Echo>("ping", &json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad model"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed() {
        let router = Router::new().route("/ping", post(|| async { Json(json!({"unexpected": 1})) }));
        let base = test_server::spawn(router).await;

        let client = OpenAiClient::new("test", format!("{}/", base), None);
        let err = client
            .post_json::<Value, Echo>("/ping", &json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SDKError::MalformedResponse { .. }));
    }
}
