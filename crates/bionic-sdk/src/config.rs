//! SDK Configuration
//!
//! Defines configuration options for the Bionic Memory SDK.

use std::path::PathBuf;

use bionic_core::{CoolingProfile, DecayModel};
use serde::{Deserialize, Serialize};

/// SDK configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SDKConfig {
    /// Memory engine configuration
    pub memory: MemoryConfig,

    /// Embedding service configuration
    pub embedding: EmbeddingConfig,

    /// Summarization service configuration
    pub summary: SummaryConfig,

    /// Cleanup scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Vector store backend
    pub store: StoreConfig,
}

/// Memory engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Collection backing the long-term tier (default: "long_term_memory")
    pub long_term_collection: String,

    /// Collection backing the short-term tier (default: "short_term_memory")
    pub short_term_collection: String,

    /// Cooling profile for the long-term tier (default: "days_31")
    pub long_term_profile: Option<String>,

    /// Cooling profile for the short-term tier (default: "minutes_20")
    pub short_term_profile: Option<String>,

    /// Content longer than this many characters is summarized (default: 500)
    pub summary_threshold: usize,

    /// Records returned per retrieval (default: 10)
    pub max_retrieval_results: usize,

    /// Expected members per cluster (default: 3)
    pub cluster_multiplier: usize,

    /// Clusters per requested result (default: 2)
    pub retrieval_multiplier: usize,

    /// Preamble placed before the recalled memory block (default: built-in)
    pub persona: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            long_term_collection: "long_term_memory".into(),
            short_term_collection: "short_term_memory".into(),
            long_term_profile: Some(CoolingProfile::Days31.to_string()),
            short_term_profile: Some(CoolingProfile::Minutes20.to_string()),
            summary_threshold: 500,
            max_retrieval_results: 10,
            cluster_multiplier: 3,
            retrieval_multiplier: 2,
            persona: None,
        }
    }
}

impl MemoryConfig {
    /// Decay model for the long-term tier.
    pub fn long_term_decay(&self) -> Result<DecayModel, ConfigValidationError> {
        decay_for("memory.long_term_profile", self.long_term_profile.as_deref())
    }

    /// Decay model for the short-term tier.
    pub fn short_term_decay(&self) -> Result<DecayModel, ConfigValidationError> {
        decay_for("memory.short_term_profile", self.short_term_profile.as_deref())
    }

    /// Set both cooling profiles
    pub fn with_profiles(mut self, long_term: CoolingProfile, short_term: CoolingProfile) -> Self {
        self.long_term_profile = Some(long_term.to_string());
        self.short_term_profile = Some(short_term.to_string());
        self
    }

    /// Set retrieval width and clustering multipliers
    pub fn with_retrieval(
        mut self,
        max_results: usize,
        cluster_multiplier: usize,
        retrieval_multiplier: usize,
    ) -> Self {
        self.max_retrieval_results = max_results;
        self.cluster_multiplier = cluster_multiplier;
        self.retrieval_multiplier = retrieval_multiplier;
        self
    }

    /// Set the summary threshold
    pub fn with_summary_threshold(mut self, threshold: usize) -> Self {
        self.summary_threshold = threshold;
        self
    }

    /// Validate the memory configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.long_term_decay()?;
        self.short_term_decay()?;

        for (field, value) in [
            ("memory.summary_threshold", self.summary_threshold),
            ("memory.max_retrieval_results", self.max_retrieval_results),
            ("memory.cluster_multiplier", self.cluster_multiplier),
            ("memory.retrieval_multiplier", self.retrieval_multiplier),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        if self.long_term_collection.is_empty() || self.short_term_collection.is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.*_collection".into(),
                message: "collection names cannot be empty".into(),
            });
        }

        if self.long_term_collection == self.short_term_collection {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.short_term_collection".into(),
                message: "tiers must use distinct collections".into(),
            });
        }

        Ok(())
    }
}

fn decay_for(field: &str, name: Option<&str>) -> Result<DecayModel, ConfigValidationError> {
    let name = name.ok_or_else(|| ConfigValidationError::MissingProfile(field.into()))?;
    name.parse::<CoolingProfile>()
        .map(DecayModel::new)
        .map_err(|_| ConfigValidationError::UnknownProfile(name.into()))
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint
    Api,
    /// Local fastembed model (requires the `embeddings` feature)
    Local,
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend (default: api)
    pub provider: EmbeddingProvider,

    /// Base URL of the OpenAI-compatible API, e.g. `https://api.openai.com/v1`
    pub base_url: Option<String>,

    /// Bearer token for the API
    pub api_key: Option<String>,

    /// Model name (default: "text-embedding-ada-002")
    pub model: String,

    /// Per-request timeout in seconds; batches get twice this (default: 60)
    pub timeout_secs: u64,

    /// Retries after the first attempt (default: 2)
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Api,
            base_url: None,
            api_key: None,
            model: "text-embedding-ada-002".into(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Summarization service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Use an LLM for long content; when false, content is truncated (default: false)
    pub enabled: bool,

    /// Base URL of the OpenAI-compatible API
    pub base_url: Option<String>,

    /// Bearer token for the API
    pub api_key: Option<String>,

    /// Chat model name
    pub model: Option<String>,

    /// Per-request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Sampling temperature (default: 0.3)
    pub temperature: f32,

    /// Nucleus sampling (default: 0.8)
    pub top_p: f32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            model: None,
            timeout_secs: 30,
            temperature: 0.3,
            top_p: 0.8,
        }
    }
}

/// Which vector store backs the tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreProvider {
    /// Local SQLite file (requires the `db` feature)
    Sqlite,
    /// Remote Chroma server
    Chroma,
    /// Process memory; nothing survives a restart
    Memory,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend (default: sqlite)
    pub provider: StoreProvider,

    /// SQLite file; defaults to `$BIONIC_DATABASE_PATH` or `~/.bionic/memory.db`
    pub path: Option<PathBuf>,

    /// Chroma base URL, e.g. `http://localhost:8000`
    pub chroma_url: Option<String>,

    /// Per-request timeout for remote stores in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Sqlite,
            path: None,
            chroma_url: None,
            timeout_secs: 30,
        }
    }
}

/// Cleanup scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Start the scheduler with the memory system (default: true)
    pub enabled: bool,

    /// Short-term sweep interval in seconds (default: 600 = 10 minutes)
    pub short_term_interval_secs: u64,

    /// Local hour of the daily long-term sweep (default: 4)
    pub long_term_hour: u32,

    /// Local minute of the daily long-term sweep (default: 0)
    pub long_term_minute: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            short_term_interval_secs: 600, // 10 minutes
            long_term_hour: 4,
            long_term_minute: 0,
        }
    }
}

impl SDKConfig {
    /// Set memory configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Set embedding configuration
    pub fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    /// Set summary configuration
    pub fn with_summary(mut self, summary: SummaryConfig) -> Self {
        self.summary = summary;
        self
    }

    /// Set scheduler configuration
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set store configuration
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Apply `BIONIC_*` environment overrides on top of file values.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `BIONIC_EMBEDDING_BASE_URL` | `embedding.base_url` |
    /// | `BIONIC_EMBEDDING_API_KEY` | `embedding.api_key` |
    /// | `BIONIC_EMBEDDING_MODEL` | `embedding.model` |
    /// | `BIONIC_SUMMARY_BASE_URL` | `summary.base_url` (also enables summaries) |
    /// | `BIONIC_SUMMARY_API_KEY` | `summary.api_key` |
    /// | `BIONIC_SUMMARY_MODEL` | `summary.model` |
    /// | `BIONIC_CHROMA_URL` | `store.chroma_url` (also selects Chroma) |
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BIONIC_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Some(key) = lookup("BIONIC_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(model) = lookup("BIONIC_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("BIONIC_SUMMARY_BASE_URL") {
            self.summary.base_url = Some(url);
            self.summary.enabled = true;
        }
        if let Some(key) = lookup("BIONIC_SUMMARY_API_KEY") {
            self.summary.api_key = Some(key);
        }
        if let Some(model) = lookup("BIONIC_SUMMARY_MODEL") {
            self.summary.model = Some(model);
        }
        if let Some(url) = lookup("BIONIC_CHROMA_URL") {
            self.store.chroma_url = Some(url);
            self.store.provider = StoreProvider::Chroma;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.memory.validate()?;

        if self.embedding.provider == EmbeddingProvider::Api && self.embedding.base_url.is_none() {
            return Err(ConfigValidationError::MissingEndpoint("embedding".into()));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "embedding.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.summary.enabled && (self.summary.base_url.is_none() || self.summary.model.is_none()) {
            return Err(ConfigValidationError::MissingEndpoint("summary".into()));
        }

        if self.scheduler.short_term_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "scheduler.short_term_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.scheduler.long_term_hour > 23 || self.scheduler.long_term_minute > 59 {
            return Err(ConfigValidationError::InvalidValue {
                field: "scheduler.long_term_hour".into(),
                message: "must be a valid time of day".into(),
            });
        }

        if self.store.provider == StoreProvider::Chroma && self.store.chroma_url.is_none() {
            return Err(ConfigValidationError::MissingEndpoint("store".into()));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("cooling profile is required for {0}")]
    MissingProfile(String),

    #[error("unknown cooling profile: {0}")]
    UnknownProfile(String),

    #[error("{0} service requires a base_url (and model)")]
    MissingEndpoint(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
