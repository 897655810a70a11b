//! Search engine facade: embed a query, run both ranking phases, and turn
//! raw hits into clean, size-bounded passages for the downstream consumer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingGateway;
use crate::errors::{Result, RetrievalError};
use crate::page_index::PageIndex;
use crate::search::aggregate::PhaseMerger;
use crate::search::grouper::{group_by_document, DocumentGroup};
use crate::search::ranker::TwoPhaseRanker;
use crate::store::{CorpusEntry, ScoredHit, VectorStore};
use crate::text::merge::{merge_chunks, representative_window, Chunk};
use crate::text::redirect::RedirectResolver;
use crate::text::sanitize::Sanitizer;

const TRUNCATION_MARKER: &str = "\n[...truncated]";

/// One result handed to the downstream consumer
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub title: String,
    pub content: String,
    pub score: f32,
    pub url: String,
    pub document_id: String,
    pub chunk_count: usize,
}

/// Both ranked lists for one query
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub title_hits: Vec<RetrievedPassage>,
    pub body_hits: Vec<RetrievedPassage>,
}

pub struct SearchEngine {
    store: Arc<VectorStore>,
    gateway: Arc<dyn EmbeddingGateway>,
    page_index: Option<Arc<dyn PageIndex>>,
    ranker: TwoPhaseRanker,
    sanitizer: Sanitizer,
    config: RetrievalConfig,
}

impl SearchEngine {
    pub fn new(
        store: Arc<VectorStore>,
        gateway: Arc<dyn EmbeddingGateway>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let sanitizer = Sanitizer::new(&config.sanitize)
            .map_err(|e| RetrievalError::Config(e.to_string()))?;
        let ranker = TwoPhaseRanker::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            config.search.clone(),
        );

        Ok(Self {
            store,
            gateway,
            page_index: None,
            ranker,
            sanitizer,
            config,
        })
    }

    /// Attach a full-document page index for exact chunk re-derivation
    pub fn with_page_index(mut self, index: Arc<dyn PageIndex>) -> Self {
        self.page_index = Some(index);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Run both phases for one query and assemble presentation-ready results
    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let vector = self.embed_query(query).await?;
        info!(query, "running two-phase search");

        let title_hits = self.ranker.search_titles(&vector).await;
        let body_hits = self.ranker.search_chunks(Arc::new(vector)).await;

        Ok(self.assemble(title_hits, body_hits))
    }

    /// Run retrieval for several query variants and merge the phases.
    /// A variant that fails is logged and skipped; only the whole batch
    /// failing is an error.
    pub async fn search_multi(&self, queries: &[String]) -> Result<SearchResults> {
        let mut title_merger = PhaseMerger::new();
        let mut body_merger = PhaseMerger::new();
        let mut succeeded = 0usize;

        for (query_no, query) in queries.iter().enumerate() {
            match self.embed_query(query).await {
                Ok(vector) => {
                    title_merger.absorb(query_no, self.ranker.search_titles(&vector).await);
                    body_merger.absorb(query_no, self.ranker.search_chunks(Arc::new(vector)).await);
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(variant = query_no, error = %e, "query variant failed, skipping");
                }
            }
        }

        if succeeded == 0 && !queries.is_empty() {
            return Err(RetrievalError::Search(
                "all query variants failed".to_string(),
            ));
        }

        let k = self.config.search.final_result_count;
        Ok(self.assemble(title_merger.finish(k), body_merger.finish(k)))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let vector = self.gateway.embed(query).await?;
        if vector.len() != self.store.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn assemble(&self, title_hits: Vec<ScoredHit>, body_hits: Vec<ScoredHit>) -> SearchResults {
        let title_passages = title_hits
            .into_iter()
            .map(|hit| self.title_passage(hit))
            .collect();

        let body_passages = if self.config.search.group_by_document {
            group_by_document(body_hits, self.config.search.final_result_count)
                .into_iter()
                .map(|group| self.group_passage(group))
                .collect()
        } else {
            body_hits
                .into_iter()
                .map(|hit| self.chunk_passage(hit))
                .collect()
        };

        SearchResults {
            title_hits: title_passages,
            body_hits: body_passages,
        }
    }

    /// A title hit presents the whole document's content
    fn title_passage(&self, hit: ScoredHit) -> RetrievedPassage {
        let entries = self.store.chunks_for_document(hit.entry.group_key());
        let chunks = self.chunk_views(&entries);

        let content = if chunks.is_empty() {
            self.finalize(hit.entry.text.clone())
        } else {
            // The document head is the natural window center for a title match
            self.passage_content(&chunks, chunks.first())
        };

        RetrievedPassage {
            title: hit.entry.title.clone(),
            content,
            score: hit.score,
            url: self.url_for(&hit.entry),
            document_id: hit.entry.group_key().to_string(),
            chunk_count: chunks.len().max(1),
        }
    }

    fn group_passage(&self, group: DocumentGroup) -> RetrievedPassage {
        let entries: Vec<Arc<CorpusEntry>> = group
            .all_chunks
            .iter()
            .map(|h| Arc::clone(&h.entry))
            .collect();
        let chunks = self.chunk_views(&entries);
        let representative = chunks.iter().find(|c| c.id == group.best_hit.entry.id);

        RetrievedPassage {
            title: group.title.clone(),
            content: self.passage_content(&chunks, representative),
            score: group.score(),
            url: self.url_for(&group.best_hit.entry),
            document_id: group.document_id.clone(),
            chunk_count: group.chunk_count(),
        }
    }

    fn chunk_passage(&self, hit: ScoredHit) -> RetrievedPassage {
        let chunks = self.chunk_views(std::slice::from_ref(&hit.entry));

        RetrievedPassage {
            title: hit.entry.title.clone(),
            content: self.passage_content(&chunks, None),
            score: hit.score,
            url: self.url_for(&hit.entry),
            document_id: hit.entry.group_key().to_string(),
            chunk_count: 1,
        }
    }

    /// Build merger views, re-deriving exact chunk text from the page index
    /// when full text and spans are both available
    fn chunk_views(&self, entries: &[Arc<CorpusEntry>]) -> Vec<Chunk> {
        let page = entries.first().and_then(|first| {
            self.page_index
                .as_ref()
                .and_then(|index| index.lookup(first.group_key()))
        });

        entries
            .iter()
            .map(|entry| {
                let text = match (&page, entry.chunk_span()) {
                    (Some(page), Some((start, end))) => {
                        slice_chars(&page.full_text, start, end)
                            .unwrap_or_else(|| entry.text.clone())
                    }
                    _ => entry.text.clone(),
                };
                Chunk::new(entry.id.clone(), text, entry.chunk_index())
            })
            .collect()
    }

    /// Merge, resolve redirects, sanitize, and enforce the size budget
    fn passage_content(&self, chunks: &[Chunk], representative: Option<&Chunk>) -> String {
        let merge = &self.config.merge;
        let total: usize = chunks.iter().map(|c| c.text.chars().count()).sum();

        let merged = if chunks.len() > 1 && total > merge.document_size_limit {
            match representative {
                Some(rep) => representative_window(
                    chunks,
                    rep,
                    merge.context_size,
                    merge.min_overlap,
                    merge.max_overlap,
                ),
                None => merge_chunks(chunks, merge.min_overlap, merge.max_overlap),
            }
        } else {
            merge_chunks(chunks, merge.min_overlap, merge.max_overlap)
        };

        self.finalize(merged)
    }

    fn finalize(&self, text: String) -> String {
        // Redirect stubs must be resolved before the link-markup passes
        // rewrite their `[[...]]` target away.
        let resolver =
            RedirectResolver::new(&self.store, &self.config.sanitize, &self.config.merge);
        let resolved = resolver.resolve(&text);
        let clean = self.sanitizer.sanitize(&resolved);
        enforce_size_limit(clean, self.config.merge.document_size_limit)
    }

    fn url_for(&self, entry: &CorpusEntry) -> String {
        if let Some(base) = &self.config.site_base_url {
            let id = &entry.document_id;
            if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
                return format!("{base}/?curid={id}");
            }
        }
        entry.source_url.clone().unwrap_or_else(|| "#".to_string())
    }
}

/// Join passages into one context block for the answer-generation step
pub fn build_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|p| format!("**{}**\n{}", p.title, p.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Hard truncation with a marker; the fallback of last resort when window
/// extraction was not possible
fn enforce_size_limit(text: String, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text;
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}{TRUNCATION_MARKER}")
}

/// Char-safe slice of `[start, end)` offsets; `None` when out of range
fn slice_chars(s: &str, start: usize, end: usize) -> Option<String> {
    if start >= end {
        return None;
    }
    let collected: String = s.chars().skip(start).take(end - start).collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::store::{EntryKind, LiveTitleIndex, Shard, TitleSearch};
    use async_trait::async_trait;

    fn live_empty() -> TitleSearch {
        TitleSearch::Live(Arc::new(LiveTitleIndex::new(Vec::new(), 2)))
    }

    struct FixedGateway {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingGateway for FixedGateway {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl EmbeddingGateway for FailingGateway {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RetrievalError::Gateway("model offline".to_string()))
        }
    }

    fn chunk(id: &str, document_id: &str, text: &str, index: usize, vector: Vec<f32>) -> Arc<CorpusEntry> {
        Arc::new(CorpusEntry {
            id: id.to_string(),
            document_id: document_id.to_string(),
            title: format!("Doc {document_id}"),
            text: text.to_string(),
            source_url: Some(format!("https://wiki.example/{document_id}")),
            vector,
            kind: EntryKind::Chunk {
                index: Some(index),
                span: None,
            },
        })
    }

    fn small_store() -> Arc<VectorStore> {
        let shard = Shard::new(
            vec![
                chunk("d1c0", "1", "The cat sat", 0, vec![1.0, 0.0]),
                chunk("d1c1", "1", "cat sat on the mat", 1, vec![0.9, 0.1]),
                chunk("d2c0", "2", "Unrelated topic", 0, vec![0.0, 1.0]),
            ],
            2,
        );
        Arc::new(VectorStore::from_parts(
            vec![Arc::new(shard)],
            live_empty(),
            2,
        ))
    }

    fn engine(store: Arc<VectorStore>, gateway: Arc<dyn EmbeddingGateway>) -> SearchEngine {
        let mut config = RetrievalConfig::default();
        config.merge.min_overlap = 3;
        SearchEngine::new(store, gateway, config).unwrap()
    }

    #[tokio::test]
    async fn test_search_groups_and_merges() {
        let engine = engine(
            small_store(),
            Arc::new(FixedGateway {
                vector: vec![1.0, 0.0],
            }),
        );

        let results = engine.search("cats").await.unwrap();
        assert!(results.title_hits.is_empty());
        assert_eq!(results.body_hits.len(), 2);

        let top = &results.body_hits[0];
        assert_eq!(top.document_id, "1");
        assert_eq!(top.chunk_count, 2);
        assert_eq!(top.content, "The cat sat on the mat");
    }

    #[tokio::test]
    async fn test_flat_mode_returns_chunks() {
        let store = small_store();
        let mut config = RetrievalConfig::default();
        config.search = SearchConfig {
            final_result_count: 5,
            per_shard_limit: 10,
            group_by_document: false,
        };
        let engine = SearchEngine::new(
            store,
            Arc::new(FixedGateway {
                vector: vec![1.0, 0.0],
            }),
            config,
        )
        .unwrap();

        let results = engine.search("cats").await.unwrap();
        assert_eq!(results.body_hits.len(), 3);
        assert!(results.body_hits.iter().all(|p| p.chunk_count == 1));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let engine = engine(
            small_store(),
            Arc::new(FixedGateway {
                vector: vec![1.0, 0.0, 0.0],
            }),
        );

        let err = engine.search("cats").await.unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_multi_query_skips_failed_variant() {
        struct FlakyGateway;

        #[async_trait]
        impl EmbeddingGateway for FlakyGateway {
            async fn embed(&self, text: &str) -> Result<Vec<f32>> {
                if text == "bad" {
                    Err(RetrievalError::Gateway("boom".to_string()))
                } else {
                    Ok(vec![1.0, 0.0])
                }
            }
        }

        let engine = engine(small_store(), Arc::new(FlakyGateway));
        let results = engine
            .search_multi(&["bad".to_string(), "good".to_string()])
            .await
            .unwrap();

        assert!(!results.body_hits.is_empty());
    }

    #[tokio::test]
    async fn test_multi_query_all_failed_is_error() {
        let engine = engine(small_store(), Arc::new(FailingGateway));
        let err = engine
            .search_multi(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Search(_)));
    }

    #[test]
    fn test_url_prefers_curid_for_numeric_ids() {
        let mut config = RetrievalConfig::default();
        config.site_base_url = Some("https://googology.fandom.com".to_string());
        let engine = SearchEngine::new(
            small_store(),
            Arc::new(FixedGateway {
                vector: vec![1.0, 0.0],
            }),
            config,
        )
        .unwrap();

        let entry = chunk("c", "123", "x", 0, vec![1.0, 0.0]);
        assert_eq!(
            engine.url_for(&entry),
            "https://googology.fandom.com/?curid=123"
        );

        let named = chunk("c", "Graham", "x", 0, vec![1.0, 0.0]);
        assert_eq!(engine.url_for(&named), "https://wiki.example/Graham");
    }

    #[test]
    fn test_build_context_blocks() {
        let passages = vec![
            RetrievedPassage {
                title: "A".to_string(),
                content: "alpha".to_string(),
                score: 0.9,
                url: "#".to_string(),
                document_id: "1".to_string(),
                chunk_count: 1,
            },
            RetrievedPassage {
                title: "B".to_string(),
                content: "beta".to_string(),
                score: 0.8,
                url: "#".to_string(),
                document_id: "2".to_string(),
                chunk_count: 1,
            },
        ];

        assert_eq!(build_context(&passages), "**A**\nalpha\n\n**B**\nbeta");
    }

    #[tokio::test]
    async fn test_page_index_rederives_chunk_text() {
        use crate::page_index::{InMemoryPageIndex, PageRecord};

        let shard = Shard::new(
            vec![Arc::new(CorpusEntry {
                id: "d1c0".to_string(),
                document_id: "1".to_string(),
                title: "Doc 1".to_string(),
                text: "stale chunk text".to_string(),
                source_url: None,
                vector: vec![1.0, 0.0],
                kind: EntryKind::Chunk {
                    index: Some(0),
                    span: Some((6, 17)),
                },
            })],
            2,
        );
        let store = Arc::new(VectorStore::from_parts(
            vec![Arc::new(shard)],
            live_empty(),
            2,
        ));

        let mut pages = InMemoryPageIndex::new();
        pages.insert(
            "1",
            PageRecord {
                title: "Doc 1".to_string(),
                full_text: "Intro fresh slice of the page.".to_string(),
            },
        );

        let engine = SearchEngine::new(
            store,
            Arc::new(FixedGateway {
                vector: vec![1.0, 0.0],
            }),
            RetrievalConfig::default(),
        )
        .unwrap()
        .with_page_index(Arc::new(pages));

        let results = engine.search("q").await.unwrap();
        assert_eq!(results.body_hits[0].content, "fresh slice");
    }

    #[test]
    fn test_enforce_size_limit() {
        assert_eq!(enforce_size_limit("short".to_string(), 10), "short");
        let long = "x".repeat(20);
        let limited = enforce_size_limit(long, 10);
        assert!(limited.starts_with("xxxxxxxxxx"));
        assert!(limited.ends_with("[...truncated]"));
    }
}
