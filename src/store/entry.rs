//! Corpus entry types shared by shards and the search pipeline.

use serde::{Deserialize, Serialize};

/// What an indexed unit represents: a document title or a body chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// One entry per document, vector computed from the title alone
    Title,
    /// A slice of the document body
    Chunk {
        /// Position of the chunk within its document, when the loader knows it
        index: Option<usize>,
        /// Character offsets (start, end) into the document's full text
        span: Option<(usize, usize)>,
    },
}

/// One indexed unit of the corpus with its pre-computed vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Unique id of this entry within the store
    pub id: String,
    /// Stable identifier of the parent document (wiki page id)
    pub document_id: String,
    /// Title of the parent document
    pub title: String,
    /// Entry text: the title itself for title entries, chunk text for chunks
    pub text: String,
    /// Original page URL, when known
    pub source_url: Option<String>,
    /// Pre-computed embedding, immutable once loaded
    pub vector: Vec<f32>,
    pub kind: EntryKind,
}

impl CorpusEntry {
    pub fn is_title(&self) -> bool {
        matches!(self.kind, EntryKind::Title)
    }

    /// Chunk position within the document, if known
    pub fn chunk_index(&self) -> Option<usize> {
        match self.kind {
            EntryKind::Chunk { index, .. } => index,
            EntryKind::Title => None,
        }
    }

    /// Character span into the document's full text, if known
    pub fn chunk_span(&self) -> Option<(usize, usize)> {
        match self.kind {
            EntryKind::Chunk { span, .. } => span,
            EntryKind::Title => None,
        }
    }

    /// Key used to collapse hits belonging to one document.
    /// Falls back to the entry id when no document id was loaded.
    pub fn group_key(&self) -> &str {
        if self.document_id.is_empty() {
            &self.id
        } else {
            &self.document_id
        }
    }
}
