//! Bionic Memory SDK - Dual-tier decaying memory for conversational agents
//!
//! This crate wires the pure engine pieces of `bionic-core` to real
//! collaborators and exposes the orchestrator:
//!
//! # Core Pieces (from bionic-core)
//!
//! - **decay** - Newton-cooling decay model and cooling profiles
//! - **clustering** - Clustering suppression of near-duplicate recall
//! - **store** - Vector store seam with in-memory and SQLite backends
//!
//! # SDK Modules
//!
//! - **memory** - `MemorySystem` orchestrator, prompt rendering and the
//!   `CleanupScheduler`
//! - **services** - Embedder and summarizer adapters for OpenAI-compatible
//!   APIs, a local `fastembed` embedder and a Chroma store adapter
//!
//! # Features
//!
//! - `db` (default) - SQLite vector store
//! - `embeddings` - local embeddings via `fastembed`
//!
//! # Example
//!
//! ```rust,no_run
//! use bionic_sdk::{SDK, SDKConfig};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let mut config = SDKConfig::default();
//!     config.embedding.base_url = Some("https://api.openai.com/v1".into());
//!
//!     let mut sdk = SDK::new(config)?;
//!     sdk.initialize().await?;
//!
//!     let turn = sdk.memory().process_user_turn("I like hiking", "user-123").await?;
//!     for record in &turn.records {
//!         println!("{}", record.display_text());
//!     }
//!
//!     Ok(())
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Re-export core modules from bionic-core
// ─────────────────────────────────────────────────────────────────────────────

/// Decay model and cooling profiles
pub use bionic_core::decay;

/// Clustering suppression
pub use bionic_core::clustering;

/// Vector store seam
pub use bionic_core::store;

/// Core types (MemoryRecord, MemoryTier, stats, ...)
pub use bionic_core::types;

/// Error types from core
pub use bionic_core::error as core_error;

pub use bionic_core::{
    ClearStats, CleanupReport, CoolingProfile, DecayModel, MemoryRecord, MemoryStats, MemoryTier,
    RecordMetadata, SourceType, VectorStore,
};

// ─────────────────────────────────────────────────────────────────────────────
// SDK-specific modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod config;
pub mod memory;
pub mod services;

mod error;
mod sdk;

// Re-export main SDK types
pub use config::{
    ConfigValidationError, EmbeddingConfig, EmbeddingProvider, MemoryConfig, SDKConfig,
    SchedulerConfig, StoreConfig, StoreProvider, SummaryConfig,
};
pub use error::{SDKError, SDKResult};
pub use sdk::SDK;

pub use memory::{
    CleanupScheduler, Ingested, JobStatus, MemorySystem, RetrievalOptions, SchedulerStatus,
    Trigger, TurnContext, LONG_TERM_JOB, SHORT_TERM_JOB,
};
pub use services::{Embedder, Summarizer};
