//! Merging retrieval results across several query variants.
//!
//! Each variant is retrieved independently; phases are merged by document
//! identity with first-seen-per-query ownership. Scores are never combined
//! across variants.

use std::collections::HashMap;

use crate::store::ScoredHit;

/// Accumulates one phase's hits across query variants.
///
/// The first query to surface a document owns it: all of that query's hits
/// for the document are kept, later queries' hits for it are dropped.
#[derive(Debug, Default)]
pub struct PhaseMerger {
    owner_by_doc: HashMap<String, usize>,
    hits: Vec<ScoredHit>,
}

impl PhaseMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one query variant's hits for this phase
    pub fn absorb(&mut self, query_no: usize, hits: Vec<ScoredHit>) {
        for hit in hits {
            let key = hit.entry.group_key().to_string();
            let owner = *self.owner_by_doc.entry(key).or_insert(query_no);
            if owner == query_no {
                self.hits.push(hit);
            }
        }
    }

    /// Final re-sorted, truncated list for this phase
    pub fn finish(mut self, limit: usize) -> Vec<ScoredHit> {
        self.hits
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        self.hits.truncate(limit);
        self.hits
    }
}
