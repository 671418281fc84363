//! Shared types for the memory engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Who produced a remembered utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    User,
    Agent,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::User => "user",
            SourceType::Agent => "agent",
            SourceType::Other => "other",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SourceType::User),
            "agent" => Ok(SourceType::Agent),
            "other" => Ok(SourceType::Other),
            _ => Err(format!("Invalid source type: {}", s)),
        }
    }
}

/// Memory tier (a named partition of the vector store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    LongTerm,
    ShortTerm,
}

impl MemoryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::LongTerm => "long_term",
            MemoryTier::ShortTerm => "short_term",
        }
    }
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long_term" | "long" => Ok(MemoryTier::LongTerm),
            "short_term" | "short" => Ok(MemoryTier::ShortTerm),
            _ => Err(format!("Invalid memory tier: {}", s)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// Per-record metadata as persisted alongside each vector.
///
/// `valid_access_count` is stale by construction: it is the heat as of
/// `last_updated` and must be decayed before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub content: String,
    pub valid_access_count: f64,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub total_access_count: u64,
    pub source_type: SourceType,
    pub user_id: String,
}

impl RecordMetadata {
    /// Metadata for a record seen for the first time.
    pub fn fresh(
        content: impl Into<String>,
        source_type: SourceType,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            valid_access_count: 1.0,
            last_updated: now,
            created_at: now,
            total_access_count: 1,
            source_type,
            user_id: user_id.into(),
        }
    }
}

/// A stored memory as returned from a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    /// Text actually embedded and displayed.
    pub summary: String,
    pub metadata: RecordMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Query distance, present only on similarity query results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Number of candidates this record stands in for after clustering.
    #[serde(default = "default_cluster_size")]
    pub cluster_size: usize,
}

fn default_cluster_size() -> usize {
    1
}

impl MemoryRecord {
    pub fn new(id: impl Into<String>, summary: impl Into<String>, metadata: RecordMetadata) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            metadata,
            embedding: None,
            distance: None,
            cluster_size: 1,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    /// Whether the record carries a usable embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Text to show in a prompt: the summary, or raw content if the summary is empty.
    pub fn display_text(&self) -> &str {
        if self.summary.is_empty() {
            &self.metadata.content
        } else {
            &self.summary
        }
    }
}

/// A record ready to be inserted into a tier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub id: String,
    pub summary: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats
// ─────────────────────────────────────────────────────────────────────────────

/// Record count for one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    pub total_records: usize,
}

/// Record counts for both tiers, optionally scoped to one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub long_term: TierStats,
    pub short_term: TierStats,
}

/// Outcome of clearing a user's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearStats {
    pub long_term_deleted: usize,
    pub short_term_deleted: usize,
    pub total_deleted: usize,
}

/// Outcome of one tier sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub tier: Option<MemoryTier>,
    pub scanned: usize,
    pub deleted_ids: Vec<String>,
    pub threshold: f64,
}

impl CleanupReport {
    pub fn deleted(&self) -> usize {
        self.deleted_ids.len()
    }
}
