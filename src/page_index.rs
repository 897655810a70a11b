//! Optional full-document lookup, keyed by document id.
//!
//! When present, chunk spans can be re-derived against the page's full text
//! so merged passages are exact. Absence degrades to merging the retrieved
//! chunk texts only.

use std::collections::HashMap;

/// Full text and title of one document
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub title: String,
    pub full_text: String,
}

/// External page index contract
pub trait PageIndex: Send + Sync {
    fn lookup(&self, document_id: &str) -> Option<PageRecord>;
}

/// Simple map-backed page index
#[derive(Debug, Default)]
pub struct InMemoryPageIndex {
    pages: HashMap<String, PageRecord>,
}

impl InMemoryPageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document_id: impl Into<String>, record: PageRecord) {
        self.pages.insert(document_id.into(), record);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageIndex for InMemoryPageIndex {
    fn lookup(&self, document_id: &str) -> Option<PageRecord> {
        self.pages.get(document_id).cloned()
    }
}
