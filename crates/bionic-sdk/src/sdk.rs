//! Main SDK Entry Point
//!
//! Wires the configured collaborators into a [`MemorySystem`] and its
//! [`CleanupScheduler`].

use std::sync::Arc;

use bionic_core::VectorStore;
use tracing::info;

use crate::memory::{CleanupScheduler, MemorySystem};
use crate::services::{build_embedder, build_store, build_summarizer, Embedder, Summarizer};
use crate::{SDKConfig, SDKResult};

/// Bionic Memory SDK - Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use bionic_sdk::{SDK, SDKConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let mut sdk = SDK::new(SDKConfig::default())?;
///     sdk.initialize().await?;
///
///     let turn = sdk.memory().process_user_turn("I like hiking", "user-123").await?;
///     println!("{}", turn.prompt);
///
///     sdk.memory().process_agent_reply_async("Hiking is great!", "user-123");
///     sdk.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct SDK {
    config: SDKConfig,
    memory: Arc<MemorySystem>,
    scheduler: Arc<CleanupScheduler>,
    initialized: bool,
}

impl SDK {
    /// Create a new SDK instance from configuration alone.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The vector store cannot be opened
    pub fn new(config: SDKConfig) -> SDKResult<Self> {
        config.validate()?;
        let store = build_store(&config.store)?;
        let embedder = build_embedder(&config.embedding)?;
        let summarizer = build_summarizer(&config.summary)?;
        Self::with_collaborators(config, store, embedder, summarizer)
    }

    /// Create an SDK instance around explicit collaborators.
    ///
    /// Only the memory and scheduler sections of `config` are used.
    pub fn with_collaborators(
        config: SDKConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> SDKResult<Self> {
        let memory = Arc::new(MemorySystem::new(
            config.memory.clone(),
            store,
            embedder,
            summarizer,
        )?);
        let scheduler = Arc::new(CleanupScheduler::new(memory.clone(), &config.scheduler));

        Ok(Self {
            config,
            memory,
            scheduler,
            initialized: false,
        })
    }

    /// Create tier collections and start the scheduler if enabled.
    pub async fn initialize(&mut self) -> SDKResult<()> {
        if self.initialized {
            return Ok(());
        }

        self.memory.initialize().await?;
        if self.config.scheduler.enabled {
            self.scheduler.start().await;
        }

        self.initialized = true;
        info!("SDK initialized");
        Ok(())
    }

    /// Stop background sweeps.
    pub async fn shutdown(&mut self) -> SDKResult<()> {
        if self.scheduler.is_running() {
            self.scheduler.stop().await;
        }
        self.initialized = false;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &SDKConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<MemorySystem> {
        &self.memory
    }

    pub fn scheduler(&self) -> &Arc<CleanupScheduler> {
        &self.scheduler
    }
}
