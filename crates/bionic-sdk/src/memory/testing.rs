//! Deterministic collaborators for tests, here and in downstream crates
//! (feature `test-util`).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bionic_core::{NewDocument, RecordMetadata, SourceType};
use chrono::{Duration, Utc};

use crate::services::Embedder;
use crate::SDKResult;

pub const DIM: usize = 16;

/// Bag-of-words embedder: each word bumps one hashed bucket.
#[derive(Default)]
pub struct WordEmbedder {
    pub calls: AtomicUsize,
}

pub fn embed_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for word in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() % DIM as u64) as usize] += 1.0;
    }
    vector[0] += 0.01;
    vector
}

#[async_trait]
impl Embedder for WordEmbedder {
    async fn encode_text(&self, text: &str) -> SDKResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(embed_words(text))
    }

    async fn encode_texts(&self, texts: &[String]) -> SDKResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_words(t)).collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(DIM)
    }
}

/// A document last touched `age` ago with heat `count`.
pub fn stored(id: &str, text: &str, user: &str, count: f64, age: Duration) -> NewDocument {
    let mut metadata = RecordMetadata::fresh(text, SourceType::User, user, Utc::now() - age);
    metadata.valid_access_count = count;
    NewDocument {
        id: id.into(),
        summary: text.into(),
        embedding: embed_words(text),
        metadata,
    }
}
