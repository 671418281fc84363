//! Application state.

use bionic_sdk::{CleanupScheduler, MemorySystem, SDK};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Memory orchestrator
    pub memory: Arc<MemorySystem>,
    /// Background cleanup jobs
    pub scheduler: Arc<CleanupScheduler>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create state sharing the SDK's memory system and scheduler
    pub fn new(sdk: &SDK) -> Arc<Self> {
        Arc::new(Self {
            memory: Arc::clone(sdk.memory()),
            scheduler: Arc::clone(sdk.scheduler()),
            start_time: Instant::now(),
        })
    }
}
