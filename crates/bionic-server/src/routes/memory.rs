//! Memory routes.
//!
//! - POST /memory/turn - Remember a user utterance and build the reply prompt
//! - POST /memory/reply - Remember an agent reply in the background
//! - GET /memory/stats - Record counts per tier
//! - DELETE /memory/users/{user_id} - Forget everything about a user

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use bionic_sdk::{ClearStats, MemoryRecord, MemoryStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error_response;
use crate::state::AppState;

/// Create memory router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/memory/turn", post(process_turn))
        .route("/memory/reply", post(store_reply))
        .route("/memory/stats", get(get_stats))
        .route("/memory/users/{user_id}", delete(clear_user))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub user_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: String,
    pub text: String,
    pub source_type: String,
    pub valid_access_count: f64,
    pub total_access_count: u64,
    pub cluster_size: usize,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<MemoryRecord> for RecordResponse {
    fn from(record: MemoryRecord) -> Self {
        Self {
            text: record.display_text().to_string(),
            id: record.id,
            source_type: record.metadata.source_type.to_string(),
            valid_access_count: record.metadata.valid_access_count,
            total_access_count: record.metadata.total_access_count,
            cluster_size: record.cluster_size,
            created_at: record.metadata.created_at,
            last_updated: record.metadata.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub records: Vec<RecordResponse>,
    pub prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub long_term: usize,
    pub short_term: usize,
}

impl StatsResponse {
    fn new(user_id: Option<String>, stats: MemoryStats) -> Self {
        Self {
            user_id,
            long_term: stats.long_term.total_records,
            short_term: stats.short_term.total_records,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub long_term_deleted: usize,
    pub short_term_deleted: usize,
    pub total_deleted: usize,
}

impl From<ClearStats> for ClearResponse {
    fn from(stats: ClearStats) -> Self {
        Self {
            long_term_deleted: stats.long_term_deleted,
            short_term_deleted: stats.short_term_deleted,
            total_deleted: stats.total_deleted,
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Remember a user utterance and return the recalled context
pub async fn process_turn(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, (StatusCode, String)> {
    let turn = state
        .memory
        .process_user_turn(&req.content, &req.user_id)
        .await
        .map_err(error_response)?;

    Ok(Json(TurnResponse {
        records: turn.records.into_iter().map(Into::into).collect(),
        prompt: turn.prompt,
    }))
}

/// Queue an agent reply for ingestion and promotion
pub async fn store_reply(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TurnRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if req.user_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "userId cannot be empty".to_string()));
    }
    state.memory.process_agent_reply_async(req.content, req.user_id);
    Ok(StatusCode::ACCEPTED)
}

/// Record counts per tier, optionally for one user
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let stats = state
        .memory
        .get_stats(query.user_id.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(StatsResponse::new(query.user_id, stats)))
}

/// Delete every record a user owns in both tiers
pub async fn clear_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearResponse>, (StatusCode, String)> {
    let cleared = state
        .memory
        .clear_user_history(&user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(cleared.into()))
}
