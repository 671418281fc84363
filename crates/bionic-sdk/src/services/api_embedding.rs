//! Embeddings from an OpenAI-compatible `/embeddings` endpoint.
//!
//! The vector dimension is not configured: it is learned from the first
//! successful response and every later response must match it.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::openai::OpenAiClient;
use super::Embedder;
use crate::config::{ConfigValidationError, EmbeddingConfig};
use crate::{SDKError, SDKResult};

const SERVICE: &str = "embedder";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a, I: Serialize> {
    model: &'a str,
    input: I,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Embedder backed by a remote API.
pub struct ApiEmbedder {
    client: OpenAiClient,
    model: String,
    timeout: Duration,
    dimension: OnceLock<usize>,
}

impl ApiEmbedder {
    pub fn new(client: OpenAiClient, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
            dimension: OnceLock::new(),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> SDKResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| ConfigValidationError::MissingEndpoint(SERVICE.into()))?;
        let client = OpenAiClient::new(SERVICE, base_url, config.api_key.clone())
            .with_retries(config.max_retries);
        info!(model = %config.model, base_url = %client.base_url(), "Using API embedding service");
        Ok(Self::new(
            client,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Order vectors by `index`, check count and dimension.
    fn normalize(&self, response: EmbeddingResponse, expected: usize) -> SDKResult<Vec<Vec<f32>>> {
        if response.data.len() != expected {
            return Err(SDKError::malformed(
                SERVICE,
                format!("expected {} embeddings, got {}", expected, response.data.len()),
            ));
        }

        let mut data: Vec<(usize, Vec<f32>)> = response
            .data
            .into_iter()
            .enumerate()
            .map(|(pos, d)| (d.index.unwrap_or(pos), d.embedding))
            .collect();
        data.sort_by_key(|(idx, _)| *idx);

        let vectors: Vec<Vec<f32>> = data.into_iter().map(|(_, v)| v).collect();
        for vector in &vectors {
            if vector.is_empty() {
                return Err(SDKError::malformed(SERVICE, "empty embedding"));
            }
            let dimension = *self.dimension.get_or_init(|| {
                info!(dimension = vector.len(), "Discovered embedding dimension");
                vector.len()
            });
            if vector.len() != dimension {
                return Err(SDKError::malformed(
                    SERVICE,
                    format!("dimension {} does not match {}", vector.len(), dimension),
                ));
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    async fn encode_text(&self, text: &str) -> SDKResult<Vec<f32>> {
        debug!(chars = text.chars().count(), "Encoding text");
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };
        let response: EmbeddingResponse = self
            .client
            .post_json("embeddings", &request, self.timeout)
            .await?;
        let mut vectors = self.normalize(response, 1)?;
        vectors
            .pop()
            .ok_or_else(|| SDKError::malformed(SERVICE, "no embedding returned"))
    }

    async fn encode_texts(&self, texts: &[String]) -> SDKResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), "Encoding batch");
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        // Batches get twice the single-request timeout
        let response: EmbeddingResponse = self
            .client
            .post_json("embeddings", &request, self.timeout * 2)
            .await?;
        self.normalize(response, texts.len())
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::openai::test_server;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn embed_server() -> String {
        // Echo a 3-dim vector per input; batches come back in reverse order.
        let router = Router::new().route(
            "/v1/embeddings",
            post(|Json(body): Json<Value>| async move {
                let inputs: Vec<String> = match &body["input"] {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(items) => items
                        .iter()
                        .map(|v| v.as_str().unwrap_or_default().to_string())
                        .collect(),
                    _ => vec![],
                };
                let mut data: Vec<Value> = inputs
                    .iter()
                    .enumerate()
                    .map(|(i, s)| json!({"index": i, "embedding": [s.len() as f32, 1.0, 0.0]}))
                    .collect();
                data.reverse();
                Json(json!({"data": data, "model": body["model"]}))
            }),
        );
        format!("{}/v1", test_server::spawn(router).await)
    }

    fn embedder(base: String) -> ApiEmbedder {
        ApiEmbedder::from_config(&EmbeddingConfig {
            base_url: Some(base),
            timeout_secs: 5,
            max_retries: 0,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_encode_text_discovers_dimension() {
        let embedder = embedder(embed_server().await);
        assert_eq!(embedder.dimension(), None);

        let vector = embedder.encode_text("hello").await.unwrap();
        assert_eq!(vector, vec![5.0, 1.0, 0.0]);
        assert_eq!(embedder.dimension(), Some(3));
    }

    #[tokio::test]
    async fn test_encode_texts_preserves_order() {
        let embedder = embedder(embed_server().await);
        let texts = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];
        let vectors = embedder.encode_texts(&texts).await.unwrap();
        let lens: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lens, vec![1.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_malformed_response_is_an_error() {
        let router = Router::new().route(
            "/embeddings",
            post(|| async { Json(json!({"data": [{"embedding": []}]})) }),
        );
        let embedder = embedder(test_server::spawn(router).await);
        let err = embedder.encode_text("x").await.unwrap_err();
        assert!(matches!(err, SDKError::MalformedResponse { .. }));
    }

    #[test]
    fn test_requires_base_url() {
        assert!(ApiEmbedder::from_config(&EmbeddingConfig::default()).is_err());
    }
}
