//! Sharded in-memory vector store over a pre-embedded corpus.
//!
//! Constructed once at startup from loader-supplied shards, then read-only
//! for the process lifetime and shared across scan tasks via `Arc`.

pub mod entry;
pub mod loader;
pub mod shard;

pub use entry::{CorpusEntry, EntryKind};
pub use loader::{RawEntry, RawShard, RawShardMeta, StoreBuilder, VectorPayload};
pub use shard::{cosine_similarity, ScoredHit, Shard};

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::embedding::EmbeddingGateway;
use crate::errors::{Result, RetrievalError};

/// Strategy for the title phase: a precomputed index, or live embedding of
/// the stored titles (slower; paid once on first use)
#[derive(Debug, Clone)]
pub enum TitleSearch {
    Precomputed(Arc<Shard>),
    Live(Arc<LiveTitleIndex>),
}

/// Title index built on demand when the loader supplies no precomputed one.
///
/// The first title-phase query embeds every stored title through the
/// gateway; the resulting shard is cached for the store's lifetime. A full
/// gateway outage leaves the cache unset so a later query retries.
#[derive(Debug)]
pub struct LiveTitleIndex {
    /// `(document_id, title)` pairs, first-seen document order
    titles: Vec<(String, String)>,
    dimension: usize,
    shard: OnceCell<Arc<Shard>>,
}

impl LiveTitleIndex {
    pub fn new(titles: Vec<(String, String)>, dimension: usize) -> Self {
        Self {
            titles,
            dimension,
            shard: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Embed every title once and cache the resulting shard. Titles the
    /// gateway cannot embed are skipped; only a gateway that embeds nothing
    /// at all is an error.
    pub async fn shard(&self, gateway: &dyn EmbeddingGateway) -> Result<Arc<Shard>> {
        self.shard
            .get_or_try_init(|| async {
                let mut entries = Vec::with_capacity(self.titles.len());
                for (document_id, title) in &self.titles {
                    match gateway.embed(title).await {
                        Ok(vector) if vector.len() == self.dimension => {
                            entries.push(Arc::new(CorpusEntry {
                                id: format!("title:{document_id}"),
                                document_id: document_id.clone(),
                                title: title.clone(),
                                text: title.clone(),
                                source_url: None,
                                vector,
                                kind: EntryKind::Title,
                            }));
                        }
                        Ok(vector) => {
                            warn!(
                                %title,
                                expected = self.dimension,
                                actual = vector.len(),
                                "skipping title with wrong embedding dimension"
                            );
                        }
                        Err(e) => {
                            warn!(%title, error = %e, "skipping title the gateway could not embed");
                        }
                    }
                }

                if entries.is_empty() && !self.titles.is_empty() {
                    return Err(RetrievalError::Gateway(
                        "no titles could be embedded".to_string(),
                    ));
                }

                info!(titles = entries.len(), "built live title index");
                Ok(Arc::new(Shard::new(entries, self.dimension)))
            })
            .await
            .map(Arc::clone)
    }
}

/// The loaded corpus: body shards plus an optional title index
#[derive(Debug)]
pub struct VectorStore {
    body_shards: Vec<Arc<Shard>>,
    title_search: TitleSearch,
    dimension: usize,
    total_entries: usize,
}

impl VectorStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn from_parts(
        body_shards: Vec<Arc<Shard>>,
        title_search: TitleSearch,
        dimension: usize,
    ) -> Self {
        let total_entries = body_shards.iter().map(|s| s.len()).sum();
        Self {
            body_shards,
            title_search,
            dimension,
            total_entries,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total body entries across all shards
    pub fn total_entries(&self) -> usize {
        self.total_entries
    }

    pub fn shard_count(&self) -> usize {
        self.body_shards.len()
    }

    pub fn body_shards(&self) -> &[Arc<Shard>] {
        &self.body_shards
    }

    pub fn title_search(&self) -> &TitleSearch {
        &self.title_search
    }

    /// The precomputed title index, when one was supplied
    pub fn title_index(&self) -> Option<&Arc<Shard>> {
        match &self.title_search {
            TitleSearch::Precomputed(index) => Some(index),
            TitleSearch::Live(_) => None,
        }
    }

    /// All body chunks whose title matches, in shard order.
    /// Titles compare MediaWiki-style: the first letter is case-insensitive.
    pub fn chunks_for_title(&self, title: &str) -> Vec<Arc<CorpusEntry>> {
        self.body_shards
            .iter()
            .flat_map(|shard| shard.entries())
            .filter(|entry| titles_match(&entry.title, title))
            .cloned()
            .collect()
    }

    /// All body chunks of one document, in shard order
    pub fn chunks_for_document(&self, document_id: &str) -> Vec<Arc<CorpusEntry>> {
        self.body_shards
            .iter()
            .flat_map(|shard| shard.entries())
            .filter(|entry| entry.group_key() == document_id)
            .cloned()
            .collect()
    }
}

/// MediaWiki title equality: exact after uppercasing the first character
pub fn titles_match(a: &str, b: &str) -> bool {
    fn first_upper(s: &str) -> (String, &str) {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) => (c.to_uppercase().collect(), chars.as_str()),
            None => (String::new(), ""),
        }
    }

    let (a_head, a_rest) = first_upper(a.trim());
    let (b_head, b_rest) = first_upper(b.trim());
    a_head == b_head && a_rest == b_rest
}
