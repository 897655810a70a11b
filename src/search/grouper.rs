//! Collapsing chunk-level hits into per-document results.

use std::collections::HashMap;

use crate::store::ScoredHit;

/// All chunk hits belonging to one source document, with the best-scoring
/// chunk kept as the representative
#[derive(Debug, Clone)]
pub struct DocumentGroup {
    pub document_id: String,
    pub title: String,
    /// Highest-scoring chunk (ties keep the first seen)
    pub best_hit: ScoredHit,
    /// Every hit for this document, in document order when indices exist
    pub all_chunks: Vec<ScoredHit>,
}

impl DocumentGroup {
    pub fn score(&self) -> f32 {
        self.best_hit.score
    }

    pub fn chunk_count(&self) -> usize {
        self.all_chunks.len()
    }
}

/// Group ranked chunk hits by document, sort groups by best score
/// descending, and truncate to `limit`.
pub fn group_by_document(hits: Vec<ScoredHit>, limit: usize) -> Vec<DocumentGroup> {
    let mut groups: Vec<DocumentGroup> = Vec::new();
    let mut slot_by_id: HashMap<String, usize> = HashMap::new();

    for hit in hits {
        let key = hit.entry.group_key().to_string();
        match slot_by_id.get(&key) {
            Some(&slot) => {
                let group = &mut groups[slot];
                if hit.score > group.best_hit.score {
                    group.best_hit = hit.clone();
                }
                group.all_chunks.push(hit);
            }
            None => {
                slot_by_id.insert(key.clone(), groups.len());
                groups.push(DocumentGroup {
                    document_id: key,
                    title: hit.entry.title.clone(),
                    best_hit: hit.clone(),
                    all_chunks: vec![hit],
                });
            }
        }
    }

    // Restore document order where chunk indices are known; indexless
    // chunks keep their arrival slot so the key is a total order.
    for group in &mut groups {
        let mut keyed: Vec<(usize, ScoredHit)> = std::mem::take(&mut group.all_chunks)
            .into_iter()
            .enumerate()
            .collect();
        keyed.sort_by_key(|(pos, hit)| (hit.entry.chunk_index().unwrap_or(*pos), *pos));
        group.all_chunks = keyed.into_iter().map(|(_, hit)| hit).collect();
    }

    groups.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    groups.truncate(limit);
    groups
}
