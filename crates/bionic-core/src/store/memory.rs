//! In-process vector store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{rank_by_distance, Selector, VectorStore, WhereFilter};
use crate::error::{Error, Result};
use crate::types::{MemoryRecord, NewDocument, RecordMetadata};

type Collection = BTreeMap<String, MemoryRecord>;

/// Brute-force cosine store kept entirely in memory.
///
/// Suitable for tests and single-process deployments; nothing survives a
/// restart.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn selected<'a>(
    collection: &'a Collection,
    selector: &'a Selector,
) -> Box<dyn Iterator<Item = &'a MemoryRecord> + 'a> {
    match selector {
        Selector::Ids(ids) => Box::new(ids.iter().filter_map(|id| collection.get(id))),
        Selector::Where(filter) => Box::new(
            collection
                .values()
                .filter(move |r| filter.matches(&r.metadata)),
        ),
        Selector::All => Box::new(collection.values()),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn add(&self, collection: &str, documents: Vec<NewDocument>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        for doc in documents {
            let record =
                MemoryRecord::new(doc.id.clone(), doc.summary, doc.metadata).with_embedding(doc.embedding);
            target.insert(doc.id, record);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<MemoryRecord>> {
        let collections = self.collections.read().await;
        let source = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        let candidates = source
            .values()
            .filter(|r| filter.is_none_or(|f| f.matches(&r.metadata)))
            .filter(|r| r.has_embedding())
            .cloned();
        Ok(rank_by_distance(candidates, embedding, n_results))
    }

    async fn get(&self, collection: &str, selector: &Selector) -> Result<Vec<MemoryRecord>> {
        let collections = self.collections.read().await;
        let source = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        Ok(selected(source, selector).cloned().collect())
    }

    async fn update(&self, collection: &str, updates: Vec<(String, RecordMetadata)>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        for (id, metadata) in updates {
            if let Some(record) = target.get_mut(&id) {
                record.metadata = metadata;
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, selector: &Selector) -> Result<Vec<String>> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        let ids: Vec<String> = selected(target, selector).map(|r| r.id.clone()).collect();
        // A repeated id is removed once and reported once
        Ok(ids
            .into_iter()
            .filter(|id| target.remove(id).is_some())
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.len())
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))
    }
}
