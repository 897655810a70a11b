//! Handoff types for the external bulk loader.
//!
//! The loader (network fetch, decompression) lives outside this crate; it
//! hands over raw shards which the [`StoreBuilder`] validates and normalizes
//! into immutable [`Shard`]s. Vector payloads arrive either as plain float
//! sequences or as binary-encoded f32 buffers (raw or base64, little-endian).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{Result, RetrievalError};
use crate::store::entry::{CorpusEntry, EntryKind};
use crate::store::shard::Shard;
use crate::store::{LiveTitleIndex, TitleSearch, VectorStore};

/// Vector representation as supplied by the loader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VectorPayload {
    /// Plain numeric sequence
    Floats(Vec<f32>),
    /// Base64 of a little-endian f32 buffer
    Base64(String),
}

impl VectorPayload {
    /// Normalize to the internal `Vec<f32>` form
    pub fn decode(&self) -> std::result::Result<Vec<f32>, String> {
        match self {
            VectorPayload::Floats(floats) => Ok(floats.clone()),
            VectorPayload::Base64(encoded) => {
                let bytes = BASE64
                    .decode(encoded.trim())
                    .map_err(|e| format!("invalid base64 vector: {e}"))?;
                decode_le_f32(&bytes)
            }
        }
    }
}

fn decode_le_f32(bytes: &[u8]) -> std::result::Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("vector buffer length {} is not a multiple of 4", bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// One loader-supplied entry, not yet validated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    pub id: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub vector: VectorPayload,
    #[serde(default)]
    pub chunk_index: Option<usize>,
    #[serde(default)]
    pub chunk_span: Option<(usize, usize)>,
}

/// Shard-level metadata from the loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawShardMeta {
    pub entry_count: usize,
    pub dimension: usize,
}

/// One loader-supplied shard, not yet validated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawShard {
    pub meta: RawShardMeta,
    pub entries: Vec<RawEntry>,
}

/// Validating builder for [`VectorStore`].
///
/// Construction is the only place configuration errors are fatal: missing
/// metadata or mismatched dimensionality across shards halts startup, while
/// individual undecodable entries are skipped with a warning.
pub struct StoreBuilder {
    body_shards: Vec<RawShard>,
    title_index: Option<RawShard>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            body_shards: Vec::new(),
            title_index: None,
        }
    }

    /// Add one body shard (chunk-level entries)
    pub fn body_shard(mut self, shard: RawShard) -> Self {
        self.body_shards.push(shard);
        self
    }

    /// Set the title index (one title-level entry per document)
    pub fn title_index(mut self, shard: RawShard) -> Self {
        self.title_index = Some(shard);
        self
    }

    pub fn build(self) -> Result<VectorStore> {
        if self.body_shards.is_empty() {
            return Err(RetrievalError::Config("no body shards supplied".to_string()));
        }

        let dimension = self.body_shards[0].meta.dimension;
        if dimension == 0 {
            return Err(RetrievalError::Config(
                "shard metadata reports zero vector dimension".to_string(),
            ));
        }

        let mut shards = Vec::with_capacity(self.body_shards.len());
        for (shard_no, raw) in self.body_shards.into_iter().enumerate() {
            if raw.meta.dimension != dimension {
                return Err(RetrievalError::Config(format!(
                    "shard {} dimension {} conflicts with store dimension {}",
                    shard_no, raw.meta.dimension, dimension
                )));
            }
            let shard = build_shard(raw, dimension, false);
            info!(shard = shard_no, entries = shard.len(), "loaded body shard");
            shards.push(Arc::new(shard));
        }

        let title_search = match self.title_index {
            Some(raw) => {
                if raw.meta.dimension != dimension {
                    return Err(RetrievalError::Config(format!(
                        "title index dimension {} conflicts with store dimension {}",
                        raw.meta.dimension, dimension
                    )));
                }
                let index = build_shard(raw, dimension, true);
                info!(entries = index.len(), "loaded title index");
                TitleSearch::Precomputed(Arc::new(index))
            }
            None => {
                let titles = distinct_titles(&shards);
                info!(
                    titles = titles.len(),
                    "no title index supplied; titles will be embedded on first use"
                );
                TitleSearch::Live(Arc::new(LiveTitleIndex::new(titles, dimension)))
            }
        };

        Ok(VectorStore::from_parts(shards, title_search, dimension))
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One `(document_id, title)` pair per document, first-seen order
fn distinct_titles(shards: &[Arc<Shard>]) -> Vec<(String, String)> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut titles = Vec::new();

    for entry in shards.iter().flat_map(|shard| shard.entries()) {
        if entry.title.is_empty() {
            continue;
        }
        if seen.insert(entry.group_key().to_string()) {
            titles.push((entry.group_key().to_string(), entry.title.clone()));
        }
    }

    titles
}

/// Normalize raw entries, skipping any whose vector cannot be used
fn build_shard(raw: RawShard, dimension: usize, is_title: bool) -> Shard {
    let mut entries = Vec::with_capacity(raw.entries.len());

    for raw_entry in raw.entries {
        let vector = match raw_entry.vector.decode() {
            Ok(v) => v,
            Err(reason) => {
                warn!(entry = %raw_entry.id, %reason, "skipping entry with undecodable vector");
                continue;
            }
        };

        if vector.len() != dimension {
            warn!(
                entry = %raw_entry.id,
                expected = dimension,
                actual = vector.len(),
                "skipping entry with wrong vector dimension"
            );
            continue;
        }

        let kind = if is_title {
            EntryKind::Title
        } else {
            EntryKind::Chunk {
                index: raw_entry.chunk_index,
                span: raw_entry.chunk_span,
            }
        };

        entries.push(Arc::new(CorpusEntry {
            id: raw_entry.id,
            document_id: raw_entry.document_id,
            title: raw_entry.title,
            text: raw_entry.text,
            source_url: raw_entry.source_url,
            vector,
            kind,
        }));
    }

    Shard::new(entries, dimension)
}
