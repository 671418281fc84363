//! Clustering suppression.
//!
//! Oversized candidate sets are partitioned with k-means over their
//! embeddings. Each cluster collapses into one representative (the member
//! closest to the query) whose `valid_access_count` is the sum of its
//! members'. The final result is the union of the top-k by relevance and the
//! top-k by aggregated heat, so paraphrases of one fact cannot crowd out
//! distinct facts while frequently recurring facts still win on reinforcement.

use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::MemoryRecord;

/// Fixed seed so the same candidates always cluster the same way.
pub const KMEANS_SEED: u64 = 42;
const KMEANS_RESTARTS: usize = 10;
const KMEANS_MAX_ITERATIONS: usize = 300;

/// Sizing for an upstream similarity query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParameters {
    /// Candidates to request from the vector store.
    pub total_retrieval: usize,
    /// Clusters to partition candidates into.
    pub cluster_count: usize,
}

/// Clustering suppression engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusteringSuppression {
    cluster_multiplier: usize,
    retrieval_multiplier: usize,
}

impl Default for ClusteringSuppression {
    fn default() -> Self {
        Self::new(3, 2)
    }
}

impl ClusteringSuppression {
    /// `cluster_multiplier` is the expected members per cluster,
    /// `retrieval_multiplier` the number of clusters per requested result.
    pub fn new(cluster_multiplier: usize, retrieval_multiplier: usize) -> Self {
        Self {
            cluster_multiplier: cluster_multiplier.max(1),
            retrieval_multiplier: retrieval_multiplier.max(1),
        }
    }

    pub fn cluster_multiplier(&self) -> usize {
        self.cluster_multiplier
    }

    pub fn retrieval_multiplier(&self) -> usize {
        self.retrieval_multiplier
    }

    pub fn retrieval_parameters(&self, target_k: usize) -> RetrievalParameters {
        let cluster_count = (target_k * self.retrieval_multiplier).max(1);
        RetrievalParameters {
            total_retrieval: cluster_count * self.cluster_multiplier,
            cluster_count,
        }
    }

    /// Collapse candidates into representatives and return the dual-ranked union.
    ///
    /// Every candidate must carry an embedding of one common dimension once
    /// clustering is needed; otherwise this fails with [`Error::Clustering`].
    pub fn suppress(
        &self,
        candidates: &[MemoryRecord],
        cluster_count: usize,
        target_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let cluster_count = cluster_count.max(1);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if candidates.len() <= cluster_count {
            return Ok(dual_rank(singletons(candidates), target_k));
        }

        let points = embedding_matrix(candidates)?;
        let labels = kmeans(&points, cluster_count, KMEANS_SEED);

        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, label) in labels.into_iter().enumerate() {
            clusters.entry(label).or_default().push(idx);
        }

        let representatives: Vec<MemoryRecord> = clusters
            .values()
            .filter_map(|members| {
                let rep_idx = *members.iter().min_by(|a, b| {
                    distance_key(&candidates[**a]).total_cmp(&distance_key(&candidates[**b]))
                })?;
                let mut rep = candidates[rep_idx].clone();
                rep.metadata.valid_access_count = members
                    .iter()
                    .map(|i| candidates[*i].metadata.valid_access_count)
                    .sum();
                rep.cluster_size = members.len();
                Some(rep)
            })
            .collect();

        debug!(
            candidates = candidates.len(),
            clusters = representatives.len(),
            target_k,
            "Clustered candidates"
        );

        Ok(dual_rank(representatives, target_k))
    }

    /// Like [`suppress`](Self::suppress), but a clustering failure degrades to
    /// the plain dual top-k over unclustered candidates.
    pub fn suppress_or_fallback(
        &self,
        candidates: &[MemoryRecord],
        cluster_count: usize,
        target_k: usize,
    ) -> Vec<MemoryRecord> {
        match self.suppress(candidates, cluster_count, target_k) {
            Ok(selected) => selected,
            Err(e) => {
                warn!(error = %e, "Clustering failed, falling back to plain top-k");
                dual_rank(singletons(candidates), target_k)
            }
        }
    }
}

fn singletons(candidates: &[MemoryRecord]) -> Vec<MemoryRecord> {
    candidates
        .iter()
        .cloned()
        .map(|mut r| {
            r.cluster_size = 1;
            r
        })
        .collect()
}

fn distance_key(record: &MemoryRecord) -> f64 {
    record.distance.unwrap_or(f64::INFINITY)
}

/// Union of top-k by ascending distance and top-k by descending heat,
/// de-duplicated by id with relevance hits first.
pub fn dual_rank(candidates: Vec<MemoryRecord>, target_k: usize) -> Vec<MemoryRecord> {
    let mut by_relevance = candidates.clone();
    by_relevance.sort_by(|a, b| distance_key(a).total_cmp(&distance_key(b)));
    by_relevance.truncate(target_k);

    let mut by_count = candidates;
    by_count.sort_by(|a, b| {
        b.metadata
            .valid_access_count
            .total_cmp(&a.metadata.valid_access_count)
    });
    by_count.truncate(target_k);

    let mut seen = HashSet::new();
    by_relevance
        .into_iter()
        .chain(by_count)
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}

fn embedding_matrix(candidates: &[MemoryRecord]) -> Result<Vec<Vec<f64>>> {
    let mut dimension = None;
    candidates
        .iter()
        .map(|record| {
            let embedding = record
                .embedding
                .as_deref()
                .filter(|e| !e.is_empty())
                .ok_or_else(|| Error::clustering(format!("record {} has no embedding", record.id)))?;

            let expected = *dimension.get_or_insert(embedding.len());
            if embedding.len() != expected {
                return Err(Error::clustering(format!(
                    "record {} has dimension {}, expected {}",
                    record.id,
                    embedding.len(),
                    expected
                )));
            }
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(Error::clustering(format!(
                    "record {} has non-finite embedding values",
                    record.id
                )));
            }
            Ok(embedding.iter().map(|v| f64::from(*v)).collect())
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// k-means
// ─────────────────────────────────────────────────────────────────────────────

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(point, c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0))
}

/// k-means++ seeding.
fn init_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = weights.iter().sum();

        let next = if total <= 0.0 {
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen_range(0.0..1.0) * total;
            weights
                .iter()
                .position(|w| {
                    target -= w;
                    target <= 0.0
                })
                .unwrap_or(points.len() - 1)
        };
        centroids.push(points[next].clone());
    }

    centroids
}

/// Lloyd iterations from the given centroids. Returns labels and inertia.
fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>) -> (Vec<usize>, f64) {
    let dim = points[0].len();
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (idx, point) in points.iter().enumerate() {
            let (label, _) = nearest(point, &centroids);
            if labels[idx] != label {
                labels[idx] = label;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0; dim]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (point, label) in points.iter().zip(&labels) {
            counts[*label] += 1;
            for (s, v) in sums[*label].iter_mut().zip(point) {
                *s += v;
            }
        }
        for (c, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
            // Empty clusters keep their previous centroid
            if count > 0 {
                centroids[c] = sum.into_iter().map(|s| s / count as f64).collect();
            }
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, l)| squared_distance(p, &centroids[*l]))
        .sum();
    (labels, inertia)
}

/// Partition `points` into at most `k` clusters, keeping the best of several
/// seeded restarts.
fn kmeans(points: &[Vec<f64>], k: usize, seed: u64) -> Vec<usize> {
    let k = k.clamp(1, points.len());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut best: Option<(Vec<usize>, f64)> = None;
    for _ in 0..KMEANS_RESTARTS {
        let centroids = init_centroids(points, k, &mut rng);
        let (labels, inertia) = lloyd(points, centroids);
        if best.as_ref().is_none_or(|(_, b)| inertia < *b) {
            best = Some((labels, inertia));
        }
    }

    best.map(|(labels, _)| labels).unwrap_or_else(|| vec![0; points.len()])
}
