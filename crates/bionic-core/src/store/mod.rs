//! Vector store seam.
//!
//! Each memory tier is one collection in a [`VectorStore`]. Adapters normalize
//! whatever their backend returns into flat [`MemoryRecord`] lists at this
//! boundary, so callers never probe nested response shapes.

mod memory;
#[cfg(feature = "db")]
mod sqlite;

pub use memory::InMemoryVectorStore;
#[cfg(feature = "db")]
pub use sqlite::SqliteVectorStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MemoryRecord, NewDocument, RecordMetadata};

/// Metadata filter applied to queries, gets and deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhereFilter {
    pub user_id: Option<String>,
}

impl WhereFilter {
    /// Match records owned by `user_id`.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        self.user_id
            .as_deref()
            .is_none_or(|uid| metadata.user_id == uid)
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Which records a get or delete addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Ids(Vec<String>),
    Where(WhereFilter),
    All,
}

impl Selector {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selector::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// `Where` for a user, `All` when no user is given.
    pub fn for_user(user_id: Option<&str>) -> Self {
        match user_id {
            Some(uid) => Selector::Where(WhereFilter::user(uid)),
            None => Selector::All,
        }
    }
}

/// Storage backend holding one collection per memory tier.
///
/// Implementations must be safe for concurrent use per collection; no
/// read-modify-write atomicity is expected across `get` and `update`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist.
    async fn get_or_create_collection(&self, name: &str) -> Result<()>;

    /// Insert new documents. Existing ids are overwritten.
    async fn add(&self, collection: &str, documents: Vec<NewDocument>) -> Result<()>;

    /// Nearest neighbours of `embedding` by cosine distance, closest first.
    ///
    /// Results carry `distance` and `embedding`.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<MemoryRecord>>;

    /// Fetch records by id or filter. Results carry their embeddings.
    async fn get(&self, collection: &str, selector: &Selector) -> Result<Vec<MemoryRecord>>;

    /// Replace metadata of existing records; unknown ids are skipped.
    async fn update(&self, collection: &str, updates: Vec<(String, RecordMetadata)>) -> Result<()>;

    /// Delete records and return the ids actually removed.
    async fn delete(&self, collection: &str, selector: &Selector) -> Result<Vec<String>>;

    /// Number of records in the collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Cosine distance (`1 - similarity`), the metric every adapter reports.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

/// Rank `records` by distance to `embedding`, keeping the closest `n`.
pub(crate) fn rank_by_distance(
    records: impl Iterator<Item = MemoryRecord>,
    embedding: &[f32],
    n_results: usize,
) -> Vec<MemoryRecord> {
    let mut scored: Vec<MemoryRecord> = records
        .map(|r| {
            let distance = r
                .embedding
                .as_deref()
                .map(|e| cosine_distance(e, embedding))
                .unwrap_or(f64::INFINITY);
            r.with_distance(distance)
        })
        .collect();
    scored.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.distance.unwrap_or(f64::INFINITY))
    });
    scored.truncate(n_results);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceType;
    use chrono::Utc;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert!((cosine_distance(&a, &c) - 1.0).abs() < 1e-6);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_where_filter() {
        let meta = RecordMetadata::fresh("x", SourceType::User, "alice", Utc::now());
        assert!(WhereFilter::default().matches(&meta));
        assert!(WhereFilter::user("alice").matches(&meta));
        assert!(!WhereFilter::user("bob").matches(&meta));
    }

    #[test]
    fn test_selector_for_user() {
        assert_eq!(Selector::for_user(None), Selector::All);
        assert_eq!(
            Selector::for_user(Some("alice")),
            Selector::Where(WhereFilter::user("alice"))
        );
    }
}
