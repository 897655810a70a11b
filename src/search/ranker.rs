//! Two-phase ranking: a title-index pass and a concurrent body-shard pass.
//!
//! Body shards are scanned fan-out/fan-in: one task per shard, each
//! returning its own shard-local top-N, merged single-threaded afterwards.
//! No shared mutable state exists during the scans.

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::embedding::EmbeddingGateway;
use crate::store::{ScoredHit, TitleSearch, VectorStore};

pub struct TwoPhaseRanker {
    store: Arc<VectorStore>,
    gateway: Arc<dyn EmbeddingGateway>,
    config: SearchConfig,
}

impl TwoPhaseRanker {
    pub fn new(
        store: Arc<VectorStore>,
        gateway: Arc<dyn EmbeddingGateway>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Phase 0: scan the title index, deduplicate by document, and return
    /// the top K. Without a precomputed index the stored titles are embedded
    /// through the gateway first (slower; cached after the first query).
    pub async fn search_titles(&self, query: &[f32]) -> Vec<ScoredHit> {
        let index = match self.store.title_search() {
            TitleSearch::Precomputed(index) => Arc::clone(index),
            TitleSearch::Live(live) => match live.shard(self.gateway.as_ref()).await {
                Ok(index) => index,
                Err(e) => {
                    warn!(error = %e, "live title embedding failed; title phase empty");
                    return Vec::new();
                }
            },
        };

        let hits = index.scan(query, index.len());
        let mut deduped: Vec<ScoredHit> = Vec::new();
        let mut slot_by_doc: HashMap<String, usize> = HashMap::new();

        for hit in hits {
            let key = hit.entry.group_key().to_string();
            match slot_by_doc.get(&key) {
                // First occurrence wins unless a later one scores strictly higher
                Some(&slot) => {
                    if hit.score > deduped[slot].score {
                        deduped[slot] = hit;
                    }
                }
                None => {
                    slot_by_doc.insert(key, deduped.len());
                    deduped.push(hit);
                }
            }
        }

        deduped.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        deduped.truncate(self.config.final_result_count);
        deduped
    }

    /// Phase 1: scan every body shard concurrently, merge the shard-local
    /// top-N lists, and truncate to the final K. A shard whose task fails is
    /// skipped; the phase returns partial results.
    pub async fn search_chunks(&self, query: Arc<Vec<f32>>) -> Vec<ScoredHit> {
        let per_shard = self.config.per_shard_limit;

        let tasks: Vec<_> = self
            .store
            .body_shards()
            .iter()
            .map(|shard| {
                let shard = Arc::clone(shard);
                let query = Arc::clone(&query);
                tokio::spawn(async move { shard.scan(&query, per_shard) })
            })
            .collect();

        let mut merged: Vec<ScoredHit> = Vec::new();
        for (shard_no, joined) in join_all(tasks).await.into_iter().enumerate() {
            match joined {
                Ok(hits) => {
                    debug!(shard = shard_no, hits = hits.len(), "shard scan complete");
                    merged.extend(hits);
                }
                Err(e) => {
                    warn!(shard = shard_no, error = %e, "shard scan failed, skipping");
                }
            }
        }

        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(self.config.final_result_count);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::store::{CorpusEntry, EntryKind, LiveTitleIndex, Shard};
    use async_trait::async_trait;

    /// Maps the fixed test titles onto distinct vectors
    struct TitleGateway;

    #[async_trait]
    impl EmbeddingGateway for TitleGateway {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "Title D1" => vec![1.0, 0.0],
                "Title D2" => vec![0.0, 1.0],
                _ => vec![0.7, 0.7],
            })
        }
    }

    fn gateway() -> Arc<dyn EmbeddingGateway> {
        Arc::new(TitleGateway)
    }

    fn live_empty() -> TitleSearch {
        TitleSearch::Live(Arc::new(LiveTitleIndex::new(Vec::new(), 2)))
    }

    fn entry(id: &str, document_id: &str, vector: Vec<f32>, kind: EntryKind) -> Arc<CorpusEntry> {
        Arc::new(CorpusEntry {
            id: id.to_string(),
            document_id: document_id.to_string(),
            title: format!("Title {document_id}"),
            text: format!("text {id}"),
            source_url: None,
            vector,
            kind,
        })
    }

    fn chunk(id: &str, document_id: &str, vector: Vec<f32>) -> Arc<CorpusEntry> {
        entry(
            id,
            document_id,
            vector,
            EntryKind::Chunk {
                index: Some(0),
                span: None,
            },
        )
    }

    fn title(id: &str, document_id: &str, vector: Vec<f32>) -> Arc<CorpusEntry> {
        entry(id, document_id, vector, EntryKind::Title)
    }

    fn config(k: usize, per_shard: usize) -> SearchConfig {
        SearchConfig {
            final_result_count: k,
            per_shard_limit: per_shard,
            group_by_document: true,
        }
    }

    #[tokio::test]
    async fn test_body_phase_merges_shards() {
        let shard_a = Shard::new(
            vec![chunk("a1", "A", vec![1.0, 0.0]), chunk("a2", "A", vec![0.9, 0.1])],
            2,
        );
        let shard_b = Shard::new(
            vec![chunk("b1", "B", vec![0.95, 0.05]), chunk("b2", "B", vec![0.0, 1.0])],
            2,
        );
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(shard_a), Arc::new(shard_b)],
            live_empty(),
            2,
        ));

        let ranker = TwoPhaseRanker::new(store, gateway(), config(3, 2));
        let hits = ranker.search_chunks(Arc::new(vec![1.0, 0.0])).await;

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].entry.id, "a1");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_body_phase_skips_failed_shard() {
        let good = Shard::new(vec![chunk("g1", "G", vec![1.0, 0.0])], 2);
        let bad = Shard::panicking(2);
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(good), Arc::new(bad)],
            live_empty(),
            2,
        ));

        let ranker = TwoPhaseRanker::new(store, gateway(), config(5, 10));
        let hits = ranker.search_chunks(Arc::new(vec![1.0, 0.0])).await;

        // Partial results from the surviving shard
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.id, "g1");
    }

    #[tokio::test]
    async fn test_body_phase_respects_per_shard_cap() {
        let entries: Vec<_> = (0..20)
            .map(|i| chunk(&format!("c{i}"), &format!("D{i}"), vec![1.0, i as f32 * 0.01]))
            .collect();
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(Shard::new(entries, 2))],
            live_empty(),
            2,
        ));

        let ranker = TwoPhaseRanker::new(store, gateway(), config(10, 4));
        let hits = ranker.search_chunks(Arc::new(vec![1.0, 0.0])).await;

        // One shard capped at 4 candidates, so K=10 cannot be filled
        assert_eq!(hits.len(), 4);
    }

    #[tokio::test]
    async fn test_title_phase_dedupes_by_document() {
        let index = Shard::new(
            vec![
                title("t1", "D1", vec![1.0, 0.0]),
                title("t2", "D1", vec![0.5, 0.5]),
                title("t3", "D2", vec![0.9, 0.1]),
            ],
            2,
        );
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(Shard::new(vec![], 2))],
            TitleSearch::Precomputed(Arc::new(index)),
            2,
        ));

        let ranker = TwoPhaseRanker::new(store, gateway(), config(5, 10));
        let hits = ranker.search_titles(&[1.0, 0.0]).await;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.id, "t1");
        assert_eq!(hits[1].entry.document_id, "D2");
    }

    #[tokio::test]
    async fn test_title_phase_higher_score_replaces() {
        let index = Shard::new(
            vec![
                title("weak", "D1", vec![0.2, 0.8]),
                title("strong", "D1", vec![1.0, 0.0]),
            ],
            2,
        );
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(Shard::new(vec![], 2))],
            TitleSearch::Precomputed(Arc::new(index)),
            2,
        ));

        let ranker = TwoPhaseRanker::new(store, gateway(), config(5, 10));
        let hits = ranker.search_titles(&[1.0, 0.0]).await;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.id, "strong");
    }

    #[tokio::test]
    async fn test_title_phase_embeds_live_when_index_missing() {
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(Shard::new(
                vec![chunk("c1", "D1", vec![1.0, 0.0]), chunk("c2", "D2", vec![0.0, 1.0])],
                2,
            ))],
            TitleSearch::Live(Arc::new(LiveTitleIndex::new(
                vec![
                    ("D1".to_string(), "Title D1".to_string()),
                    ("D2".to_string(), "Title D2".to_string()),
                ],
                2,
            ))),
            2,
        ));

        let ranker = TwoPhaseRanker::new(store, gateway(), config(5, 10));
        let hits = ranker.search_titles(&[1.0, 0.0]).await;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.document_id, "D1");
        assert!(hits[0].entry.is_title());
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_title_phase_empty_live_index() {
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(Shard::new(vec![], 2))],
            live_empty(),
            2,
        ));

        let ranker = TwoPhaseRanker::new(store, gateway(), config(5, 10));
        assert!(ranker.search_titles(&[1.0, 0.0]).await.is_empty());
    }
}
