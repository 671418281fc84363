//! API route modules.

pub mod cleanup;
pub mod health;
pub mod memory;

use axum::{http::StatusCode, routing::get, Router};
use bionic_sdk::SDKError;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .merge(memory::router())
        .merge(cleanup::router());

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map an SDK error onto an HTTP status and message
pub(crate) fn error_response(err: SDKError) -> (StatusCode, String) {
    let status = match &err {
        e if e.is_access_denied() => StatusCode::FORBIDDEN,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        e if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        SDKError::Config(_) => StatusCode::BAD_REQUEST,
        SDKError::Core(bionic_core::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
        SDKError::Core(bionic_core::Error::Collaborator { .. }) | SDKError::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-process router over an in-memory store and a deterministic embedder.

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use bionic_core::InMemoryVectorStore;
    use bionic_sdk::memory::testing::WordEmbedder;
    use bionic_sdk::{SDKConfig, SchedulerConfig, SDK};
    use serde_json::Value;
    use tower::ServiceExt;

    pub async fn test_app() -> (Router, Arc<AppState>) {
        let config = SDKConfig::default().with_scheduler(SchedulerConfig {
            enabled: false,
            ..Default::default()
        });
        let mut sdk = SDK::with_collaborators(
            config,
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(WordEmbedder::default()),
            None,
        )
        .unwrap();
        sdk.initialize().await.unwrap();

        let state = AppState::new(&sdk);
        (create_router(state.clone()), state)
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let denied = SDKError::Core(bionic_core::Error::access_denied("a", "b", "delete"));
        assert_eq!(error_response(denied).0, StatusCode::FORBIDDEN);

        let missing = SDKError::Core(bionic_core::Error::JobNotFound("nightly".into()));
        assert_eq!(error_response(missing).0, StatusCode::NOT_FOUND);

        let invalid = SDKError::Core(bionic_core::Error::InvalidInput("user_id".into()));
        assert_eq!(error_response(invalid).0, StatusCode::BAD_REQUEST);

        let upstream = SDKError::Core(bionic_core::Error::collaborator("embedder", "down"));
        assert_eq!(error_response(upstream).0, StatusCode::BAD_GATEWAY);

        assert_eq!(error_response(SDKError::timeout(10)).0, StatusCode::GATEWAY_TIMEOUT);
    }
}
