//! Immutable corpus shards and the brute-force similarity scan.

use std::sync::Arc;
use tracing::debug;

use crate::store::entry::CorpusEntry;

/// Cosine similarity of two vectors.
///
/// Returns 0.0 (not an error) on length mismatch, zero norm, or any
/// non-finite component, so one malformed vector can never fail a search.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        if !x.is_finite() || !y.is_finite() {
            return 0.0;
        }
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity as f32
    } else {
        0.0
    }
}

/// One entry scored against a query vector; transient, produced per query
#[derive(Debug, Clone)]
pub struct ScoredHit {
    pub entry: Arc<CorpusEntry>,
    pub score: f32,
}

/// An independently scannable partition of the corpus.
/// Read-only after load; shared across concurrent scan tasks via `Arc`.
#[derive(Debug)]
pub struct Shard {
    entries: Vec<Arc<CorpusEntry>>,
    dimension: usize,
    #[cfg(test)]
    scan_panics: bool,
}

impl Shard {
    pub fn new(entries: Vec<Arc<CorpusEntry>>, dimension: usize) -> Self {
        Self {
            entries,
            dimension,
            #[cfg(test)]
            scan_panics: false,
        }
    }

    /// A shard whose scan panics, standing in for a crashed scan task
    #[cfg(test)]
    pub(crate) fn panicking(dimension: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimension,
            scan_panics: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[Arc<CorpusEntry>] {
        &self.entries
    }

    /// Score every entry against the query vector and return the top-N.
    ///
    /// Pure function over shard + query. A full stable sort guarantees a
    /// deterministic top-N under ties regardless of scan order. Entries with
    /// a wrong-sized vector are skipped, never fatal.
    pub fn scan(&self, query: &[f32], top_n: usize) -> Vec<ScoredHit> {
        #[cfg(test)]
        if self.scan_panics {
            panic!("injected scan failure");
        }

        let mut hits: Vec<ScoredHit> = Vec::with_capacity(self.entries.len().min(top_n * 4));

        for entry in &self.entries {
            if entry.vector.len() != query.len() {
                debug!(
                    entry = %entry.id,
                    expected = query.len(),
                    actual = entry.vector.len(),
                    "skipping entry with mismatched vector"
                );
                continue;
            }

            let score = cosine_similarity(query, &entry.vector);
            hits.push(ScoredHit {
                entry: Arc::clone(entry),
                score,
            });
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_n);
        hits
    }
}
