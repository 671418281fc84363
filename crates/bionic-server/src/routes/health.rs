//! Health check endpoint.

use axum::{extract::State, Json};
use bionic_sdk::MemoryStats;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: HealthComponents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<MemoryStats>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthComponents {
    pub vector_store: bool,
    pub scheduler: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let records = match state.memory.get_stats(None).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!("Health check could not reach the vector store: {}", e);
            None
        }
    };
    let scheduler_running = state.scheduler.is_running();

    let status = if records.is_some() && scheduler_running {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: HealthComponents {
            vector_store: records.is_some(),
            scheduler: scheduler_running,
        },
        records,
    })
}
