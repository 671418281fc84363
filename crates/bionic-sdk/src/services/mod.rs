//! External collaborators of the memory engine.
//!
//! The orchestrator depends only on the narrow [`Embedder`] and
//! [`Summarizer`] traits defined here (plus [`bionic_core::VectorStore`]);
//! adapters normalize each backend's responses at this boundary.

pub mod api_embedding;
pub mod chroma;
pub mod embeddings;
pub mod openai;
pub mod summary;

pub use api_embedding::ApiEmbedder;
pub use chroma::ChromaStore;
pub use embeddings::{local_embedder, LocalEmbedder};
pub use summary::ApiSummarizer;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bionic_core::{InMemoryVectorStore, VectorStore};
use tracing::info;

use crate::config::{
    ConfigValidationError, EmbeddingConfig, EmbeddingProvider, StoreConfig, StoreProvider,
    SummaryConfig,
};
use crate::{SDKError, SDKResult};

/// Text embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text.
    async fn encode_text(&self, text: &str) -> SDKResult<Vec<f32>>;

    /// Embed several texts, preserving order.
    async fn encode_texts(&self, texts: &[String]) -> SDKResult<Vec<Vec<f32>>>;

    /// Vector dimension, once known.
    fn dimension(&self) -> Option<usize>;
}

/// Optional text summarization service.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` into at most `max_length` characters.
    async fn generate_summary(&self, text: &str, max_length: usize) -> SDKResult<String>;
}

/// Build the configured embedder.
pub fn build_embedder(config: &EmbeddingConfig) -> SDKResult<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Api => Ok(Arc::new(ApiEmbedder::from_config(config)?)),
        EmbeddingProvider::Local => {
            if cfg!(feature = "embeddings") {
                Ok(local_embedder())
            } else {
                Err(SDKError::Config(ConfigValidationError::InvalidValue {
                    field: "embedding.provider".into(),
                    message: "local provider requires the `embeddings` feature".into(),
                }))
            }
        }
    }
}

/// Build the configured summarizer, if enabled.
pub fn build_summarizer(config: &SummaryConfig) -> SDKResult<Option<Arc<dyn Summarizer>>> {
    if !config.enabled {
        return Ok(None);
    }
    Ok(Some(Arc::new(ApiSummarizer::from_config(config)?)))
}

/// Open the configured vector store.
pub fn build_store(config: &StoreConfig) -> SDKResult<Arc<dyn VectorStore>> {
    match config.provider {
        StoreProvider::Memory => {
            info!("Using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        StoreProvider::Chroma => {
            let url = config
                .chroma_url
                .clone()
                .ok_or_else(|| ConfigValidationError::MissingEndpoint("store".into()))?;
            info!(url = %url, "Using Chroma vector store");
            Ok(Arc::new(
                ChromaStore::new(url).with_timeout(Duration::from_secs(config.timeout_secs)),
            ))
        }
        #[cfg(feature = "db")]
        StoreProvider::Sqlite => {
            let store = match &config.path {
                Some(path) => bionic_core::SqliteVectorStore::open_path(path)?,
                None => bionic_core::SqliteVectorStore::open()?,
            };
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db"))]
        StoreProvider::Sqlite => Err(SDKError::Config(ConfigValidationError::InvalidValue {
            field: "store.provider".into(),
            message: "sqlite store requires the `db` feature".into(),
        })),
    }
}
