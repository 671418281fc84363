//! Memory orchestrator
//!
//! Coordinates ingestion, dual-tier retrieval, promotion and prompt assembly
//! on top of three injected collaborators: a [`VectorStore`], an
//! [`Embedder`] and an optional [`Summarizer`].
//!
//! Failure policy:
//! - ingestion errors propagate to the caller
//! - retrieval and promotion errors are logged and degrade to "no memory"
//! - a record owned by another user is never mutated

use std::collections::HashMap;
use std::sync::Arc;

use bionic_core::utils::{memory_id, validate_user_id};
use bionic_core::{
    ClearStats, CleanupReport, ClusteringSuppression, DecayModel, MemoryRecord, MemoryStats,
    MemoryTier, NewDocument, RecordMetadata, Selector, SourceType, TierStats, VectorStore,
    WhereFilter,
};
use chrono::{Local, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::prompt::render_prompt;
use crate::config::MemoryConfig;
use crate::services::{Embedder, Summarizer};
use crate::SDKResult;

/// Result of ingesting one utterance into the long-term tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub id: String,
    /// Embedding of the stored summary, reused as the turn's query vector.
    pub embedding: Vec<f32>,
    /// False when the content was already known and only reinforced.
    pub created: bool,
}

/// Everything a caller needs to answer a user turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Recalled short-term records, oldest first.
    pub records: Vec<MemoryRecord>,
    pub prompt: String,
    pub query_embedding: Vec<f32>,
}

/// Per-call overrides for short-term retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalOptions {
    pub target_k: Option<usize>,
    pub cluster_multiplier: Option<usize>,
    pub retrieval_multiplier: Option<usize>,
}

/// Dual-tier decaying memory.
pub struct MemorySystem {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
    config: MemoryConfig,
    long_term_decay: DecayModel,
    short_term_decay: DecayModel,
    clustering: ClusteringSuppression,
}

impl MemorySystem {
    /// Build the orchestrator. Fails on an invalid configuration.
    pub fn new(
        config: MemoryConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> SDKResult<Self> {
        config.validate()?;
        let long_term_decay = config.long_term_decay()?;
        let short_term_decay = config.short_term_decay()?;
        let clustering =
            ClusteringSuppression::new(config.cluster_multiplier, config.retrieval_multiplier);

        Ok(Self {
            store,
            embedder,
            summarizer,
            config,
            long_term_decay,
            short_term_decay,
            clustering,
        })
    }

    /// Create both tier collections if needed.
    pub async fn initialize(&self) -> SDKResult<()> {
        for tier in [MemoryTier::LongTerm, MemoryTier::ShortTerm] {
            self.store
                .get_or_create_collection(self.collection(tier))
                .await?;
        }
        info!(
            long_term = %self.long_term_decay.profile(),
            short_term = %self.short_term_decay.profile(),
            summarizer = self.summarizer.is_some(),
            "Memory system initialized"
        );
        Ok(())
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Collection backing `tier`.
    pub fn collection(&self, tier: MemoryTier) -> &str {
        match tier {
            MemoryTier::LongTerm => &self.config.long_term_collection,
            MemoryTier::ShortTerm => &self.config.short_term_collection,
        }
    }

    /// Decay model governing `tier`.
    pub fn decay_model(&self, tier: MemoryTier) -> DecayModel {
        match tier {
            MemoryTier::LongTerm => self.long_term_decay,
            MemoryTier::ShortTerm => self.short_term_decay,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────

    /// Store an utterance in the long-term tier, or reinforce it if known.
    pub async fn ingest(
        &self,
        content: &str,
        source_type: SourceType,
        user_id: &str,
    ) -> SDKResult<Ingested> {
        validate_user_id(user_id).map_err(bionic_core::Error::from)?;
        let collection = &self.config.long_term_collection;
        let id = memory_id(user_id, content);
        let now = Utc::now();

        let existing = self
            .store
            .get(collection, &Selector::ids([id.clone()]))
            .await?
            .into_iter()
            .next();

        if let Some(record) = existing {
            check_owner(&record, user_id, "update")?;

            // Embed before writing so a failed embed leaves the record untouched
            let embedding = match &record.embedding {
                Some(embedding) if !embedding.is_empty() => embedding.clone(),
                _ => self.embedder.encode_text(record.display_text()).await?,
            };

            let mut metadata = record.metadata.clone();
            metadata.valid_access_count = self.long_term_decay.decayed_count(&metadata, now) + 1.0;
            metadata.total_access_count += 1;
            metadata.last_updated = now;
            debug!(
                id = %id,
                valid_access_count = metadata.valid_access_count,
                total_access_count = metadata.total_access_count,
                "Reinforcing existing memory"
            );
            self.store.update(collection, vec![(id.clone(), metadata)]).await?;

            return Ok(Ingested {
                id,
                embedding,
                created: false,
            });
        }

        let summary = self.summarize(content).await;
        let embedding = self.embedder.encode_text(&summary).await?;
        self.store
            .add(
                collection,
                vec![NewDocument {
                    id: id.clone(),
                    summary,
                    embedding: embedding.clone(),
                    metadata: RecordMetadata::fresh(content, source_type, user_id, now),
                }],
            )
            .await?;
        info!(id = %id, user_id = %user_id, source = %source_type, "Stored new memory");

        Ok(Ingested {
            id,
            embedding,
            created: true,
        })
    }

    /// Text to embed for `content`: itself when short, otherwise a summary
    /// or a truncation.
    async fn summarize(&self, content: &str) -> String {
        let threshold = self.config.summary_threshold;
        if content.chars().count() <= threshold {
            return content.to_string();
        }

        if let Some(summarizer) = &self.summarizer {
            match summarizer.generate_summary(content, threshold).await {
                Ok(summary) if !summary.trim().is_empty() && summary.chars().count() <= threshold => {
                    return summary;
                }
                Ok(summary) => warn!(
                    chars = summary.chars().count(),
                    threshold, "Summary unusable, truncating"
                ),
                Err(e) => warn!(error = %e, "Summarizer failed, truncating"),
            }
        }
        truncate_with_ellipsis(content, threshold)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Retrieval
    // ─────────────────────────────────────────────────────────────────────

    /// Vector for a retrieval: the caller's embedding, or `query` embedded.
    async fn query_vector(&self, query: &str, query_embedding: Option<&[f32]>) -> SDKResult<Vec<f32>> {
        match query_embedding {
            Some(embedding) if !embedding.is_empty() => Ok(embedding.to_vec()),
            _ => self.embedder.encode_text(query).await,
        }
    }

    /// Relevant long-term memories for `user_id`, weighted by relative
    /// similarity. `query` is embedded when no embedding is supplied. Empty
    /// on any failure.
    pub async fn retrieve_long_term(
        &self,
        query: &str,
        user_id: &str,
        query_embedding: Option<&[f32]>,
    ) -> Vec<MemoryRecord> {
        match self.try_retrieve_long_term(query, user_id, query_embedding).await {
            Ok(records) => records,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Long-term retrieval failed");
                Vec::new()
            }
        }
    }

    async fn try_retrieve_long_term(
        &self,
        query: &str,
        user_id: &str,
        query_embedding: Option<&[f32]>,
    ) -> SDKResult<Vec<MemoryRecord>> {
        let query_embedding = self.query_vector(query, query_embedding).await?;
        let target_k = self.config.max_retrieval_results * self.config.retrieval_multiplier;
        let params = self.clustering.retrieval_parameters(target_k);

        let hits = self
            .store
            .query(
                &self.config.long_term_collection,
                &query_embedding,
                params.total_retrieval,
                Some(&WhereFilter::user(user_id)),
            )
            .await?;
        let hits = owned_by(hits, user_id);
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        // Stored heat is stale until decayed; clusters then sum the decayed values
        let now = Utc::now();
        let hits: Vec<MemoryRecord> = hits
            .into_iter()
            .map(|mut record| {
                record.metadata.valid_access_count =
                    self.long_term_decay.decayed_count(&record.metadata, now);
                record
            })
            .collect();

        let embedded: Vec<MemoryRecord> = hits.iter().filter(|r| r.has_embedding()).cloned().collect();
        let selected = if embedded.is_empty() {
            hits.into_iter().take(target_k).collect()
        } else {
            self.clustering
                .suppress_or_fallback(&embedded, params.cluster_count, target_k)
        };

        debug!(user_id = %user_id, selected = selected.len(), "Long-term retrieval");
        Ok(softmax_weights(selected))
    }

    /// Recently reinforced short-term memories for `user_id`. `query` is
    /// embedded when no embedding is supplied. Empty on any failure.
    pub async fn retrieve_short_term(
        &self,
        query: &str,
        user_id: &str,
        query_embedding: Option<&[f32]>,
        options: RetrievalOptions,
    ) -> Vec<MemoryRecord> {
        match self
            .try_retrieve_short_term(query, user_id, query_embedding, options)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Short-term retrieval failed");
                Vec::new()
            }
        }
    }

    async fn try_retrieve_short_term(
        &self,
        query: &str,
        user_id: &str,
        query_embedding: Option<&[f32]>,
        options: RetrievalOptions,
    ) -> SDKResult<Vec<MemoryRecord>> {
        let query_embedding = self.query_vector(query, query_embedding).await?;
        let target_k = options.target_k.unwrap_or(self.config.max_retrieval_results);
        let clustering = ClusteringSuppression::new(
            options
                .cluster_multiplier
                .unwrap_or(self.config.cluster_multiplier),
            options
                .retrieval_multiplier
                .unwrap_or(self.config.retrieval_multiplier),
        );
        let params = clustering.retrieval_parameters(target_k);

        let hits = self
            .store
            .query(
                &self.config.short_term_collection,
                &query_embedding,
                params.total_retrieval,
                Some(&WhereFilter::user(user_id)),
            )
            .await?;

        // Heat is stale until decayed from each record's own last update
        let now = Utc::now();
        let candidates: Vec<MemoryRecord> = owned_by(hits, user_id)
            .into_iter()
            .filter(MemoryRecord::has_embedding)
            .map(|mut record| {
                record.metadata.valid_access_count =
                    self.short_term_decay.decayed_count(&record.metadata, now);
                record
            })
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        Ok(clustering.suppress_or_fallback(&candidates, params.cluster_count, target_k))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Promotion
    // ─────────────────────────────────────────────────────────────────────

    /// Copy long-term hits into the short-term tier, reinforcing records
    /// already there by the incoming weight. Returns how many were written;
    /// failures degrade to zero.
    pub async fn promote_to_short_term(&self, records: &[MemoryRecord], user_id: &str) -> usize {
        match self.try_promote(records, user_id).await {
            Ok(promoted) => promoted,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Promotion to short-term failed");
                0
            }
        }
    }

    async fn try_promote(&self, records: &[MemoryRecord], user_id: &str) -> SDKResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let collection = &self.config.short_term_collection;
        let existing: HashMap<String, MemoryRecord> = self
            .store
            .get(collection, &Selector::ids(records.iter().map(|r| r.id.clone())))
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let now = Utc::now();
        let mut updates = Vec::new();
        let mut inserts = Vec::new();

        for record in records {
            if let Err(e) = check_owner(record, user_id, "promote") {
                warn!(id = %record.id, error = %e, "Skipping promotion");
                continue;
            }

            if let Some(current) = existing.get(&record.id) {
                if let Err(e) = check_owner(current, user_id, "update") {
                    warn!(id = %record.id, error = %e, "Skipping promotion");
                    continue;
                }
                let mut metadata = current.metadata.clone();
                metadata.valid_access_count = self.short_term_decay.decayed_count(&metadata, now)
                    + record.metadata.valid_access_count;
                metadata.total_access_count += 1;
                metadata.last_updated = now;
                updates.push((record.id.clone(), metadata));
                continue;
            }

            let embedding = match &record.embedding {
                Some(embedding) if !embedding.is_empty() => embedding.clone(),
                _ => match self.embedder.encode_text(record.display_text()).await {
                    Ok(embedding) => embedding,
                    Err(e) => {
                        warn!(id = %record.id, error = %e, "Cannot embed record, skipping promotion");
                        continue;
                    }
                },
            };
            inserts.push(NewDocument {
                id: record.id.clone(),
                summary: record.summary.clone(),
                embedding,
                metadata: RecordMetadata::fresh(
                    record.metadata.content.clone(),
                    record.metadata.source_type,
                    user_id,
                    now,
                ),
            });
        }

        let promoted = updates.len() + inserts.len();
        debug!(
            user_id = %user_id,
            updated = updates.len(),
            inserted = inserts.len(),
            "Promoting to short-term"
        );
        if !updates.is_empty() {
            self.store.update(collection, updates).await?;
        }
        if !inserts.is_empty() {
            self.store.add(collection, inserts).await?;
        }
        Ok(promoted)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Turns
    // ─────────────────────────────────────────────────────────────────────

    /// Full synchronous pipeline for a user message.
    pub async fn process_user_turn(&self, content: &str, user_id: &str) -> SDKResult<TurnContext> {
        let ingested = self.ingest(content, SourceType::User, user_id).await?;

        let long_term = self
            .retrieve_long_term(content, user_id, Some(&ingested.embedding))
            .await;
        self.promote_to_short_term(&long_term, user_id).await;

        let mut records = self
            .retrieve_short_term(
                content,
                user_id,
                Some(&ingested.embedding),
                RetrievalOptions::default(),
            )
            .await;
        records.sort_by_key(|r| r.metadata.last_updated);

        let prompt = render_prompt(self.config.persona.as_deref(), &records, Local::now());
        info!(user_id = %user_id, recalled = records.len(), "User turn processed");

        Ok(TurnContext {
            records,
            prompt,
            query_embedding: ingested.embedding,
        })
    }

    /// Ingest an agent reply and promote what it recalls. Returns the number
    /// of records promoted.
    pub async fn store_agent_reply(&self, reply: &str, user_id: &str) -> SDKResult<usize> {
        let ingested = self.ingest(reply, SourceType::Agent, user_id).await?;
        let long_term = self
            .retrieve_long_term(reply, user_id, Some(&ingested.embedding))
            .await;
        Ok(self.promote_to_short_term(&long_term, user_id).await)
    }

    /// Run [`store_agent_reply`](Self::store_agent_reply) in the background.
    pub fn process_agent_reply_async(
        self: &Arc<Self>,
        reply: impl Into<String>,
        user_id: impl Into<String>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let reply = reply.into();
        let user_id = user_id.into();
        tokio::spawn(async move {
            match this.store_agent_reply(&reply, &user_id).await {
                Ok(promoted) => debug!(user_id = %user_id, promoted, "Agent reply stored"),
                Err(e) => error!(user_id = %user_id, error = %e, "Failed to store agent reply"),
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────

    /// Delete every record of `user_id` from both tiers.
    pub async fn clear_user_history(&self, user_id: &str) -> SDKResult<ClearStats> {
        validate_user_id(user_id).map_err(bionic_core::Error::from)?;
        let selector = Selector::for_user(Some(user_id));

        let mut deleted = [0usize; 2];
        for (slot, tier) in [MemoryTier::LongTerm, MemoryTier::ShortTerm].into_iter().enumerate() {
            deleted[slot] = match self.store.delete(self.collection(tier), &selector).await {
                Ok(ids) => ids.len(),
                Err(e) => {
                    error!(user_id = %user_id, tier = %tier, error = %e, "Failed to clear tier");
                    0
                }
            };
        }

        let stats = ClearStats {
            long_term_deleted: deleted[0],
            short_term_deleted: deleted[1],
            total_deleted: deleted[0] + deleted[1],
        };
        info!(
            user_id = %user_id,
            long_term = stats.long_term_deleted,
            short_term = stats.short_term_deleted,
            "Cleared user history"
        );
        Ok(stats)
    }

    /// Record counts per tier, optionally for one user.
    pub async fn get_stats(&self, user_id: Option<&str>) -> SDKResult<MemoryStats> {
        Ok(MemoryStats {
            long_term: self.tier_stats(MemoryTier::LongTerm, user_id).await?,
            short_term: self.tier_stats(MemoryTier::ShortTerm, user_id).await?,
        })
    }

    async fn tier_stats(&self, tier: MemoryTier, user_id: Option<&str>) -> SDKResult<TierStats> {
        let collection = self.collection(tier);
        let total_records = match user_id {
            Some(_) => self
                .store
                .get(collection, &Selector::for_user(user_id))
                .await?
                .len(),
            None => self.store.count(collection).await?,
        };
        Ok(TierStats { total_records })
    }

    /// Sweep one tier, deleting records whose decayed heat is at or below the
    /// tier's threshold.
    pub async fn cleanup_tier(&self, tier: MemoryTier, user_id: Option<&str>) -> SDKResult<CleanupReport> {
        let collection = self.collection(tier);
        let decay = self.decay_model(tier);
        let records = self.store.get(collection, &Selector::for_user(user_id)).await?;

        let now = Utc::now();
        let expired: Vec<String> = records
            .iter()
            .filter(|r| user_id.is_none_or(|uid| r.metadata.user_id == uid))
            .filter(|r| decay.is_forgettable(decay.decayed_count(&r.metadata, now)))
            .map(|r| r.id.clone())
            .collect();

        let deleted_ids = if expired.is_empty() {
            Vec::new()
        } else {
            self.store.delete(collection, &Selector::Ids(expired)).await?
        };

        info!(
            tier = %tier,
            scanned = records.len(),
            deleted = deleted_ids.len(),
            threshold = decay.threshold(),
            "Tier cleanup finished"
        );
        Ok(CleanupReport {
            tier: Some(tier),
            scanned: records.len(),
            deleted_ids,
            threshold: decay.threshold(),
        })
    }
}

fn check_owner(record: &MemoryRecord, user_id: &str, operation: &str) -> bionic_core::Result<()> {
    if record.metadata.user_id == user_id {
        return Ok(());
    }
    warn!(
        id = %record.id,
        user_id = %user_id,
        owner = %record.metadata.user_id,
        operation,
        "Cross-user access rejected"
    );
    Err(bionic_core::Error::access_denied(
        user_id,
        record.metadata.user_id.clone(),
        operation,
    ))
}

/// Drop anything a store returned for another user.
fn owned_by(records: Vec<MemoryRecord>, user_id: &str) -> Vec<MemoryRecord> {
    let total = records.len();
    let owned: Vec<MemoryRecord> = records
        .into_iter()
        .filter(|r| r.metadata.user_id == user_id)
        .collect();
    if owned.len() != total {
        warn!(user_id = %user_id, dropped = total - owned.len(), "Store returned foreign records");
    }
    owned
}

/// First `max_chars` characters followed by `...`.
pub fn truncate_with_ellipsis(content: &str, max_chars: usize) -> String {
    let mut truncated: String = content.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

/// Replace each record's heat with its softmax weight over `1 - distance`.
///
/// Falls back to uniform weights when any similarity is not finite.
pub fn softmax_weights(mut records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
    if records.is_empty() {
        return records;
    }
    let similarities: Vec<f64> = records
        .iter()
        .map(|r| 1.0 - r.distance.unwrap_or(f64::NAN))
        .collect();

    let weights = if similarities.iter().all(|s| s.is_finite()) {
        let max = similarities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = similarities.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        warn!(records = records.len(), "Non-finite similarity, using uniform weights");
        vec![1.0 / records.len() as f64; records.len()]
    };

    for (record, weight) in records.iter_mut().zip(weights) {
        record.metadata.valid_access_count = weight;
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::{embed_words, stored, WordEmbedder};
    use crate::SDKError;
    use async_trait::async_trait;
    use bionic_core::InMemoryVectorStore;
    use chrono::Duration;
    use std::sync::atomic::Ordering;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn encode_text(&self, _text: &str) -> SDKResult<Vec<f32>> {
            Err(SDKError::timeout(60_000))
        }

        async fn encode_texts(&self, _texts: &[String]) -> SDKResult<Vec<Vec<f32>>> {
            Err(SDKError::timeout(120_000))
        }

        fn dimension(&self) -> Option<usize> {
            None
        }
    }

    /// Returns a fixed reply, or fails when `reply` is `None`.
    struct FixedSummarizer {
        reply: Option<String>,
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn generate_summary(&self, _text: &str, _max_length: usize) -> SDKResult<String> {
            self.reply
                .clone()
                .ok_or_else(|| SDKError::malformed("summarizer", "upstream unavailable"))
        }
    }

    /// Store whose every data call fails.
    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn get_or_create_collection(&self, _name: &str) -> bionic_core::Result<()> {
            Ok(())
        }
        async fn add(&self, _c: &str, _d: Vec<NewDocument>) -> bionic_core::Result<()> {
            Err(bionic_core::Error::collaborator("vector_store", "down"))
        }
        async fn query(
            &self,
            _c: &str,
            _e: &[f32],
            _n: usize,
            _f: Option<&WhereFilter>,
        ) -> bionic_core::Result<Vec<MemoryRecord>> {
            Err(bionic_core::Error::collaborator("vector_store", "down"))
        }
        async fn get(&self, _c: &str, _s: &Selector) -> bionic_core::Result<Vec<MemoryRecord>> {
            Err(bionic_core::Error::collaborator("vector_store", "down"))
        }
        async fn update(&self, _c: &str, _u: Vec<(String, RecordMetadata)>) -> bionic_core::Result<()> {
            Err(bionic_core::Error::collaborator("vector_store", "down"))
        }
        async fn delete(&self, _c: &str, _s: &Selector) -> bionic_core::Result<Vec<String>> {
            Err(bionic_core::Error::collaborator("vector_store", "down"))
        }
        async fn count(&self, _c: &str) -> bionic_core::Result<usize> {
            Err(bionic_core::Error::collaborator("vector_store", "down"))
        }
    }

    async fn system_with(
        config: MemoryConfig,
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> (Arc<MemorySystem>, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        let system = MemorySystem::new(config, store.clone(), embedder, summarizer).unwrap();
        system.initialize().await.unwrap();
        (Arc::new(system), store)
    }

    async fn system() -> (Arc<MemorySystem>, Arc<InMemoryVectorStore>) {
        system_with(MemoryConfig::default(), Arc::new(WordEmbedder::default()), None).await
    }

    async fn long_term_record(store: &InMemoryVectorStore, id: &str) -> MemoryRecord {
        store
            .get("long_term_memory", &Selector::ids([id]))
            .await
            .unwrap()
            .pop()
            .unwrap()
    }

    #[test]
    fn test_invalid_profile_is_fatal() {
        let config = MemoryConfig {
            long_term_profile: Some("days_90".into()),
            ..Default::default()
        };
        let result = MemorySystem::new(
            config,
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(WordEmbedder::default()),
            None,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reingestion_reinforces_same_record() {
        let (system, store) = system().await;

        let first = system.ingest("I like hiking", SourceType::User, "alice").await.unwrap();
        let second = system.ingest("I like hiking", SourceType::User, "alice").await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(first.embedding, second.embedding);

        let record = long_term_record(&store, &first.id).await;
        assert_eq!(record.metadata.total_access_count, 2);
        assert!(record.metadata.valid_access_count > 1.0);
        assert!(record.metadata.valid_access_count <= 2.0);
        assert_eq!(store.count("long_term_memory").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reingestion_reuses_stored_embedding() {
        let embedder = Arc::new(WordEmbedder::default());
        let (system, _) = system_with(MemoryConfig::default(), embedder.clone(), None).await;

        system.ingest("I like hiking", SourceType::User, "alice").await.unwrap();
        system.ingest("I like hiking", SourceType::User, "alice").await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_content_different_users() {
        let (system, _) = system().await;

        let alice = system.ingest("I like hiking", SourceType::User, "alice").await.unwrap();
        let bob = system.ingest("I like hiking", SourceType::User, "bob").await.unwrap();
        assert_ne!(alice.id, bob.id);

        let recalled = system
            .retrieve_long_term("I like hiking", "alice", Some(&alice.embedding))
            .await;
        assert_eq!(recalled.len(), 1);
        assert!(recalled.iter().all(|r| r.metadata.user_id == "alice"));
    }

    #[tokio::test]
    async fn test_user_ids_are_not_normalized() {
        let (system, store) = system().await;

        let padded = system.ingest("hi there", SourceType::User, " alice").await.unwrap();
        let plain = system.ingest("hi there", SourceType::User, "alice").await.unwrap();
        assert!(plain.created);
        assert_ne!(padded.id, plain.id);
        assert_eq!(long_term_record(&store, &padded.id).await.metadata.user_id, " alice");
        assert_eq!(long_term_record(&store, &plain.id).await.metadata.user_id, "alice");
    }

    #[tokio::test]
    async fn test_long_term_reinforcement_uses_decayed_heat() {
        let config = MemoryConfig::default().with_retrieval(1, 1, 2);
        let (system, store) = system_with(config, Arc::new(WordEmbedder::default()), None).await;
        store
            .add(
                "long_term_memory",
                vec![
                    stored("h1", "hiking trail", "alice", 1.0, Duration::zero()),
                    stored("h2", "hiking boots", "alice", 1.0, Duration::zero()),
                    stored("stale", "tax return", "alice", 50.0, Duration::days(400)),
                ],
            )
            .await
            .unwrap();

        let recalled = system.retrieve_long_term("hiking", "alice", None).await;
        let mut ids: Vec<&str> = recalled.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["h1", "h2"]);
    }

    #[tokio::test]
    async fn test_retrieval_embeds_query_text() {
        let embedder = Arc::new(WordEmbedder::default());
        let (system, store) = system_with(MemoryConfig::default(), embedder.clone(), None).await;
        store
            .add(
                "long_term_memory",
                vec![stored("h1", "hiking trail", "alice", 1.0, Duration::zero())],
            )
            .await
            .unwrap();
        store
            .add(
                "short_term_memory",
                vec![stored("h1", "hiking trail", "alice", 1.0, Duration::zero())],
            )
            .await
            .unwrap();

        let long_term = system.retrieve_long_term("hiking trail", "alice", None).await;
        let short_term = system
            .retrieve_short_term("hiking trail", "alice", None, RetrievalOptions::default())
            .await;
        assert_eq!(long_term.len(), 1);
        assert_eq!(short_term.len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retrieval_without_embedder_is_empty() {
        let (system, store) =
            system_with(MemoryConfig::default(), Arc::new(FailingEmbedder), None).await;
        store
            .add(
                "long_term_memory",
                vec![stored("h1", "hiking trail", "alice", 1.0, Duration::zero())],
            )
            .await
            .unwrap();

        assert!(system.retrieve_long_term("hiking", "alice", None).await.is_empty());
        assert!(system
            .retrieve_short_term("hiking", "alice", None, RetrievalOptions::default())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_reembed_leaves_record_untouched() {
        let (system, store) =
            system_with(MemoryConfig::default(), Arc::new(FailingEmbedder), None).await;
        let id = memory_id("alice", "I like hiking");
        let mut doc = stored(&id, "I like hiking", "alice", 1.0, Duration::hours(1));
        doc.embedding = Vec::new();
        store.add("long_term_memory", vec![doc]).await.unwrap();
        let before = long_term_record(&store, &id).await;

        assert!(system
            .ingest("I like hiking", SourceType::User, "alice")
            .await
            .is_err());
        assert_eq!(long_term_record(&store, &id).await, before);
    }

    #[tokio::test]
    async fn test_foreign_record_is_not_mutated() {
        let (system, store) = system().await;
        let id = memory_id("alice", "I like hiking");
        let doc = stored(&id, "I like hiking", "mallory", 1.0, Duration::zero());
        store.add("long_term_memory", vec![doc]).await.unwrap();
        let before = long_term_record(&store, &id).await;

        let err = system
            .ingest("I like hiking", SourceType::User, "alice")
            .await
            .unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(long_term_record(&store, &id).await, before);
    }

    #[tokio::test]
    async fn test_blank_user_rejected() {
        let (system, _) = system().await;
        assert!(system.ingest("hello", SourceType::User, "  ").await.is_err());
        assert!(system.clear_user_history("").await.is_err());
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_truncation() {
        let config = MemoryConfig::default().with_summary_threshold(10);
        let failing: Arc<dyn Summarizer> = Arc::new(FixedSummarizer { reply: None });
        let (system, store) =
            system_with(config, Arc::new(WordEmbedder::default()), Some(failing)).await;

        let ingested = system
            .ingest("a fairly long sentence about mountains", SourceType::User, "alice")
            .await
            .unwrap();
        let record = long_term_record(&store, &ingested.id).await;
        assert_eq!(record.summary, "a fairly l...");
        assert_eq!(record.metadata.content, "a fairly long sentence about mountains");
    }

    #[tokio::test]
    async fn test_oversized_summary_is_rejected() {
        let config = MemoryConfig::default().with_summary_threshold(10);
        let verbose: Arc<dyn Summarizer> = Arc::new(FixedSummarizer {
            reply: Some("still far too long".into()),
        });
        let (system, store) =
            system_with(config, Arc::new(WordEmbedder::default()), Some(verbose)).await;

        let ingested = system
            .ingest("a fairly long sentence about mountains", SourceType::User, "alice")
            .await
            .unwrap();
        assert_eq!(long_term_record(&store, &ingested.id).await.summary, "a fairly l...");
    }

    #[tokio::test]
    async fn test_accepted_summary_is_stored() {
        let config = MemoryConfig::default().with_summary_threshold(10);
        let good: Arc<dyn Summarizer> = Arc::new(FixedSummarizer {
            reply: Some("mountains".into()),
        });
        let (system, store) = system_with(config, Arc::new(WordEmbedder::default()), Some(good)).await;

        let ingested = system
            .ingest("a fairly long sentence about mountains", SourceType::User, "alice")
            .await
            .unwrap();
        assert_eq!(long_term_record(&store, &ingested.id).await.summary, "mountains");
    }

    #[tokio::test]
    async fn test_embedder_failure_propagates_on_ingest() {
        let (system, store) =
            system_with(MemoryConfig::default(), Arc::new(FailingEmbedder), None).await;
        assert!(system.ingest("hello", SourceType::User, "alice").await.is_err());
        assert_eq!(store.count("long_term_memory").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retrieval_degrades_on_store_failure() {
        let system = MemorySystem::new(
            MemoryConfig::default(),
            Arc::new(BrokenStore),
            Arc::new(WordEmbedder::default()),
            None,
        )
        .unwrap();
        let query = embed_words("hiking");

        assert!(system
            .retrieve_long_term("hiking", "alice", Some(&query))
            .await
            .is_empty());
        assert!(system
            .retrieve_short_term("hiking", "alice", Some(&query), RetrievalOptions::default())
            .await
            .is_empty());

        let record = MemoryRecord::new(
            "x",
            "hiking",
            RecordMetadata::fresh("hiking", SourceType::User, "alice", Utc::now()),
        );
        assert_eq!(system.promote_to_short_term(&[record], "alice").await, 0);

        // Ingestion must not swallow the failure
        assert!(system.process_user_turn("hiking", "alice").await.is_err());
    }

    #[tokio::test]
    async fn test_promotion_inserts_then_reinforces() {
        let (system, store) = system().await;
        let mut record = MemoryRecord::new(
            "m1",
            "I like hiking",
            RecordMetadata::fresh("I like hiking", SourceType::User, "alice", Utc::now()),
        )
        .with_embedding(embed_words("I like hiking"));
        record.metadata.valid_access_count = 0.5;

        assert_eq!(system.promote_to_short_term(&[record.clone()], "alice").await, 1);
        let fresh = store
            .get("short_term_memory", &Selector::ids(["m1"]))
            .await
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(fresh.metadata.valid_access_count, 1.0);

        assert_eq!(system.promote_to_short_term(&[record], "alice").await, 1);
        let reinforced = store
            .get("short_term_memory", &Selector::ids(["m1"]))
            .await
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(reinforced.metadata.total_access_count, 2);
        assert!(reinforced.metadata.valid_access_count > 1.4);
        assert!(reinforced.metadata.valid_access_count <= 1.5);
    }

    #[tokio::test]
    async fn test_promotion_skips_foreign_and_unembeddable() {
        let (system, store) =
            system_with(MemoryConfig::default(), Arc::new(FailingEmbedder), None).await;
        let foreign = MemoryRecord::new(
            "b1",
            "bob's note",
            RecordMetadata::fresh("bob's note", SourceType::User, "bob", Utc::now()),
        )
        .with_embedding(embed_words("bob's note"));
        let unembedded = MemoryRecord::new(
            "a1",
            "no vector",
            RecordMetadata::fresh("no vector", SourceType::User, "alice", Utc::now()),
        );

        assert_eq!(system.promote_to_short_term(&[foreign, unembedded], "alice").await, 0);
        assert_eq!(store.count("short_term_memory").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_short_term_retrieval_is_bounded() {
        let config = MemoryConfig::default().with_retrieval(3, 3, 2);
        let (system, store) = system_with(config, Arc::new(WordEmbedder::default()), None).await;

        let groups = [
            ["hiking trail", "hiking trail map", "hiking trail boots"],
            ["piano lesson", "piano lesson notes", "piano lesson fee"],
            ["tax return", "tax return form", "tax return deadline"],
        ];
        let docs: Vec<NewDocument> = groups
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, text)| stored(&format!("s{}", i), text, "alice", 1.0 + i as f64, Duration::zero()))
            .collect();
        store.add("short_term_memory", docs).await.unwrap();

        let options = RetrievalOptions {
            target_k: Some(3),
            ..Default::default()
        };
        let recalled = system
            .retrieve_short_term("hiking trail", "alice", Some(&embed_words("hiking trail")), options)
            .await;
        assert!(!recalled.is_empty());
        assert!(recalled.len() <= 6);
        let mut ids: Vec<&str> = recalled.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), recalled.len());
    }

    #[tokio::test]
    async fn test_short_term_counts_are_decayed() {
        let (system, store) = system().await;
        store
            .add(
                "short_term_memory",
                vec![stored("old", "hiking trail", "alice", 4.0, Duration::minutes(20))],
            )
            .await
            .unwrap();

        let recalled = system
            .retrieve_short_term("hiking trail", "alice", None, RetrievalOptions::default())
            .await;
        assert_eq!(recalled.len(), 1);
        // 20 minutes is the full short-term horizon
        assert!((recalled[0].metadata.valid_access_count - 4.0 * 0.582).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_user_turn_pipeline() {
        let (system, _) = system().await;

        let context = system.process_user_turn("I like hiking", "alice").await.unwrap();
        assert_eq!(context.records.len(), 1);
        assert_eq!(context.records[0].metadata.user_id, "alice");
        assert!(context.prompt.contains("user: I like hiking"));
        assert_eq!(context.query_embedding, embed_words("I like hiking"));

        let stats = system.get_stats(Some("alice")).await.unwrap();
        assert_eq!(stats.long_term.total_records, 1);
        assert_eq!(stats.short_term.total_records, 1);
    }

    #[tokio::test]
    async fn test_first_turn_prompt_without_history_for_other_user() {
        let (system, _) = system().await;
        system.process_user_turn("I like hiking", "alice").await.unwrap();

        let context = system.process_user_turn("hello", "bob").await.unwrap();
        assert!(context.records.iter().all(|r| r.metadata.user_id == "bob"));
        assert!(!context.prompt.contains("hiking"));
    }

    #[tokio::test]
    async fn test_agent_reply_runs_in_background() {
        let (system, _) = system().await;
        system.process_user_turn("I like hiking", "alice").await.unwrap();

        system
            .process_agent_reply_async("Hiking is a great way to relax", "alice")
            .await
            .unwrap();

        let stats = system.get_stats(Some("alice")).await.unwrap();
        assert_eq!(stats.long_term.total_records, 2);
        assert_eq!(stats.short_term.total_records, 2);
    }

    #[tokio::test]
    async fn test_clear_user_history() {
        let (system, _) = system().await;
        system.process_user_turn("I like hiking", "alice").await.unwrap();
        system.process_user_turn("I like chess", "bob").await.unwrap();

        let cleared = system.clear_user_history("alice").await.unwrap();
        assert_eq!(cleared.long_term_deleted, 1);
        assert_eq!(cleared.short_term_deleted, 1);
        assert_eq!(cleared.total_deleted, 2);

        assert_eq!(system.get_stats(Some("alice")).await.unwrap(), MemoryStats::default());
        let all = system.get_stats(None).await.unwrap();
        assert_eq!(all.long_term.total_records, 1);
        assert_eq!(all.short_term.total_records, 1);
    }

    #[tokio::test]
    async fn test_cleanup_evicts_only_cold_records() {
        let (system, store) = system().await;
        store
            .add(
                "short_term_memory",
                vec![
                    stored("cold", "old news", "alice", 1.0, Duration::hours(2)),
                    stored("warm", "fresh news", "alice", 5.0, Duration::zero()),
                ],
            )
            .await
            .unwrap();

        let report = system.cleanup_tier(MemoryTier::ShortTerm, None).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted_ids, vec!["cold".to_string()]);
        assert_eq!(report.threshold, 0.582);

        let remaining = store.get("short_term_memory", &Selector::All).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "warm");
        assert_eq!(remaining[0].metadata.valid_access_count, 5.0);
    }

    #[tokio::test]
    async fn test_cleanup_scoped_to_user() {
        let (system, store) = system().await;
        store
            .add(
                "long_term_memory",
                vec![
                    stored("a", "old alice", "alice", 1.0, Duration::days(40)),
                    stored("b", "old bob", "bob", 1.0, Duration::days(40)),
                ],
            )
            .await
            .unwrap();

        let report = system.cleanup_tier(MemoryTier::LongTerm, Some("alice")).await.unwrap();
        assert_eq!(report.deleted_ids, vec!["a".to_string()]);
        assert_eq!(store.count("long_term_memory").await.unwrap(), 1);
    }

    #[test]
    fn test_softmax_weights() {
        let record = |id: &str, distance: Option<f64>| {
            let mut r = MemoryRecord::new(
                id,
                id,
                RecordMetadata::fresh(id, SourceType::User, "alice", Utc::now()),
            );
            r.distance = distance;
            r
        };

        let weighted = softmax_weights(vec![record("near", Some(0.1)), record("far", Some(0.9))]);
        let total: f64 = weighted.iter().map(|r| r.metadata.valid_access_count).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(weighted[0].metadata.valid_access_count > weighted[1].metadata.valid_access_count);

        let uniform = softmax_weights(vec![record("a", None), record("b", Some(0.2))]);
        assert!(uniform.iter().all(|r| (r.metadata.valid_access_count - 0.5).abs() < 1e-9));

        assert!(softmax_weights(Vec::new()).is_empty());
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate_with_ellipsis("我喜欢徒步旅行", 3), "我喜欢...");
    }
}
