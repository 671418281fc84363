//! Local Embedding Service
//!
//! Provides local vector embeddings using `fastembed` with the
//! all-MiniLM-L6-v2 model (384 dimensions). The model is loaded lazily on
//! first use behind a double-checked lock, so concurrent first callers load
//! it exactly once.
//!
//! # Usage
//!
//! ```ignore
//! use bionic_sdk::services::{local_embedder, Embedder};
//!
//! let embedder = local_embedder();
//! let vector = embedder.encode_text("hello world").await?;
//! ```

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use super::Embedder;
#[cfg(not(feature = "embeddings"))]
use crate::SDKError;
use crate::SDKResult;

/// Embedding dimensions for all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Embedder running a model in-process
#[cfg(feature = "embeddings")]
pub struct LocalEmbedder {
    model: Arc<tokio::sync::RwLock<Option<fastembed::TextEmbedding>>>,
}

#[cfg(not(feature = "embeddings"))]
pub struct LocalEmbedder {
    _phantom: std::marker::PhantomData<()>,
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embeddings")]
impl LocalEmbedder {
    /// Create a new local embedder; the model loads on first use
    pub fn new() -> Self {
        Self {
            model: Arc::new(tokio::sync::RwLock::new(None)),
        }
    }

    /// Initialize the embedding model (lazy loading)
    async fn ensure_model(&self) -> SDKResult<()> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model_guard = self.model.read().await;
        if model_guard.is_some() {
            return Ok(());
        }
        drop(model_guard);

        let mut model_guard = self.model.write().await;
        if model_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let mut init_options = InitOptions::default();
        init_options.model_name = EmbeddingModel::AllMiniLML6V2;
        init_options.show_download_progress = false;

        let model = TextEmbedding::try_new(init_options).map_err(|e| {
            bionic_core::Error::collaborator("embedder", format!("failed to load model: {}", e))
        })?;

        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Embedding model loaded");

        *model_guard = Some(model);
        Ok(())
    }

    async fn embed_all(&self, texts: Vec<String>) -> SDKResult<Vec<Vec<f32>>> {
        self.ensure_model().await?;

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or_else(|| bionic_core::Error::collaborator("embedder", "model not initialized"))?;

        Ok(model
            .embed(texts, None)
            .map_err(|e| bionic_core::Error::collaborator("embedder", e.to_string()))?)
    }

    /// Check if the model is loaded
    pub async fn is_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    async fn encode_text(&self, text: &str) -> SDKResult<Vec<f32>> {
        self.embed_all(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| bionic_core::Error::collaborator("embedder", "no embedding generated").into())
    }

    async fn encode_texts(&self, texts: &[String]) -> SDKResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_all(texts.to_vec()).await
    }

    fn dimension(&self) -> Option<usize> {
        Some(EMBEDDING_DIMENSIONS)
    }
}

#[cfg(not(feature = "embeddings"))]
impl LocalEmbedder {
    /// Create a new local embedder (no-op without embeddings feature)
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }

    /// Check if the model is loaded
    pub async fn is_loaded(&self) -> bool {
        false
    }

    fn disabled() -> SDKError {
        bionic_core::Error::collaborator(
            "embedder",
            "Embeddings feature not enabled. Compile with --features embeddings",
        )
        .into()
    }
}

#[cfg(not(feature = "embeddings"))]
#[async_trait]
impl Embedder for LocalEmbedder {
    async fn encode_text(&self, _text: &str) -> SDKResult<Vec<f32>> {
        Err(Self::disabled())
    }

    async fn encode_texts(&self, _texts: &[String]) -> SDKResult<Vec<Vec<f32>>> {
        Err(Self::disabled())
    }

    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Global local embedder singleton
static LOCAL_EMBEDDER: OnceLock<Arc<LocalEmbedder>> = OnceLock::new();

/// Get the shared local embedder instance
pub fn local_embedder() -> Arc<dyn Embedder> {
    LOCAL_EMBEDDER
        .get_or_init(|| Arc::new(LocalEmbedder::new()))
        .clone()
}
