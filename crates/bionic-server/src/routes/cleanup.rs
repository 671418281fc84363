//! Cleanup scheduler routes.
//!
//! - POST /cleanup/run - Sweep both tiers now
//! - GET/POST /cleanup/jobs - Inspect or register cleanup jobs
//! - POST /cleanup/jobs/{id}/pause|resume - Toggle a job
//! - DELETE /cleanup/jobs/{id} - Unregister a job

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use bionic_sdk::{CleanupReport, MemoryTier, SchedulerStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::error_response;
use crate::state::AppState;

/// Create cleanup router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cleanup/run", post(run_cleanup))
        .route("/cleanup/jobs", get(list_jobs).post(add_job))
        .route("/cleanup/jobs/{id}", delete(remove_job))
        .route("/cleanup/jobs/{id}/pause", post(pause_job))
        .route("/cleanup/jobs/{id}/resume", post(resume_job))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCleanupRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddJobRequest {
    pub id: String,
    pub tier: MemoryTier,
    pub interval_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSweep {
    pub tier: Option<MemoryTier>,
    pub scanned: usize,
    pub deleted: usize,
    pub threshold: f64,
}

impl From<CleanupReport> for TierSweep {
    fn from(report: CleanupReport) -> Self {
        Self {
            deleted: report.deleted(),
            tier: report.tier,
            scanned: report.scanned,
            threshold: report.threshold,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCleanupResponse {
    pub sweeps: Vec<TierSweep>,
    pub total_deleted: usize,
}

/// Sweep both tiers immediately, optionally for one user
pub async fn run_cleanup(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RunCleanupResponse>, (StatusCode, String)> {
    let req: RunCleanupRequest = if body.is_empty() {
        RunCleanupRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    };
    let reports = state
        .scheduler
        .run_cleanup_now(req.user_id.as_deref())
        .await
        .map_err(error_response)?;

    let total_deleted = reports.iter().map(CleanupReport::deleted).sum();
    Ok(Json(RunCleanupResponse {
        sweeps: reports.into_iter().map(Into::into).collect(),
        total_deleted,
    }))
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

/// Register (or replace) an interval job
pub async fn add_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddJobRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .scheduler
        .add_custom_job(&req.id, req.tier, Duration::from_secs(req.interval_secs))
        .await
        .map_err(error_response)?;
    Ok(StatusCode::CREATED)
}

pub async fn pause_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.scheduler.pause_job(&id).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.scheduler.resume_job(&id).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.scheduler.remove_job(&id).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{empty_request, json_request, send, test_app};
    use bionic_sdk::{LONG_TERM_JOB, SHORT_TERM_JOB};
    use serde_json::json;

    #[tokio::test]
    async fn test_run_cleanup_without_body() {
        let (app, _) = test_app().await;

        let (status, body) = send(&app, empty_request("POST", "/api/cleanup/run")).await;
        assert_eq!(status, StatusCode::OK);
        let sweeps = body["sweeps"].as_array().unwrap();
        assert_eq!(sweeps.len(), 2);
        assert_eq!(sweeps[0]["tier"], "short_term");
        assert_eq!(sweeps[1]["tier"], "long_term");
        assert_eq!(body["totalDeleted"], 0);
    }

    #[tokio::test]
    async fn test_fresh_records_survive_cleanup() {
        let (app, _) = test_app().await;
        send(
            &app,
            json_request("POST", "/api/memory/turn", json!({"userId": "alice", "content": "I like tea"})),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request("POST", "/api/cleanup/run", json!({"userId": "alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sweeps"][0]["scanned"], 1);
        assert_eq!(body["totalDeleted"], 0);
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let (app, _) = test_app().await;

        let (status, body) = send(&app, empty_request("GET", "/api/cleanup/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], false);
        let ids: Vec<&str> = body["jobs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|j| j["id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&SHORT_TERM_JOB));
        assert!(ids.contains(&LONG_TERM_JOB));

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/cleanup/jobs",
                json!({"id": "hourly_sweep", "tier": "short_term", "intervalSecs": 3600}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(&app, empty_request("POST", "/api/cleanup/jobs/hourly_sweep/pause")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&app, empty_request("GET", "/api/cleanup/jobs")).await;
        let job = body["jobs"]
            .as_array()
            .unwrap()
            .iter()
            .find(|j| j["id"] == "hourly_sweep")
            .cloned()
            .unwrap();
        assert_eq!(job["paused"], true);
        assert_eq!(job["trigger"], "every 3600s");

        let (status, _) = send(&app, empty_request("POST", "/api/cleanup/jobs/hourly_sweep/resume")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, empty_request("DELETE", "/api/cleanup/jobs/hourly_sweep")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, empty_request("DELETE", "/api/cleanup/jobs/hourly_sweep")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_job_is_rejected() {
        let (app, _) = test_app().await;

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/cleanup/jobs",
                json!({"id": "zero", "tier": "long_term", "intervalSecs": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, empty_request("POST", "/api/cleanup/jobs/missing/pause")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
