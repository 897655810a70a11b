//! Redirect stub detection and resolution.
//!
//! A redirect stub carries no content of its own, only a pointer like
//! `#REDIRECT [[Target]]` (or `#転送` on the Japanese wiki). Resolution
//! substitutes the target document's real content, following short chains,
//! and falls back to a readable placeholder when the target is missing.

use tracing::{debug, warn};

use crate::config::{MergeConfig, SanitizeConfig};
use crate::store::{CorpusEntry, VectorStore};
use crate::text::merge::{merge_chunks, Chunk};

/// True when `text` starts with one of the configured redirect markers
pub fn is_redirect(text: &str, markers: &[String]) -> bool {
    let trimmed = text.trim_start();
    markers
        .iter()
        .any(|marker| strip_marker(trimmed, marker).is_some())
}

/// Extract the redirect target title, brackets and label stripped
pub fn redirect_target(text: &str, markers: &[String]) -> Option<String> {
    let trimmed = text.trim_start();
    let rest = markers
        .iter()
        .find_map(|marker| strip_marker(trimmed, marker))?;

    let rest = rest.trim_start().trim_start_matches(':').trim_start();

    // Either `[[Target|label]]` or a bare title on the first line
    let raw = match (rest.find("[["), rest.find("]]")) {
        (Some(open), Some(close)) if open < close => &rest[open + 2..close],
        _ => rest.lines().next().unwrap_or(""),
    };

    // Drop label and section suffixes
    let raw = raw.split('|').next().unwrap_or("");
    let raw = raw.split('#').next().unwrap_or("");

    let target = raw.trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

/// Placeholder substituted when a redirect target cannot be resolved
pub fn unresolved_placeholder(target: &str) -> String {
    format!("(Redirect target \"{target}\" was not found in the corpus)")
}

/// Case-insensitive marker prefix match; returns the remainder on success
fn strip_marker<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let mut text_chars = text.char_indices();
    for marker_char in marker.chars() {
        let (_, c) = text_chars.next()?;
        if !c.to_lowercase().eq(marker_char.to_lowercase()) {
            return None;
        }
    }
    match text_chars.next() {
        Some((offset, _)) => Some(&text[offset..]),
        None => Some(""),
    }
}

/// Resolves redirect stubs against the loaded corpus
pub struct RedirectResolver<'a> {
    store: &'a VectorStore,
    sanitize: &'a SanitizeConfig,
    merge: &'a MergeConfig,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(store: &'a VectorStore, sanitize: &'a SanitizeConfig, merge: &'a MergeConfig) -> Self {
        Self {
            store,
            sanitize,
            merge,
        }
    }

    /// Substitute redirect stubs with the target document's content.
    /// Non-redirect content passes through unchanged.
    pub fn resolve(&self, text: &str) -> String {
        self.resolve_at_depth(text, 0)
    }

    fn resolve_at_depth(&self, text: &str, depth: usize) -> String {
        let Some(target) = redirect_target(text, &self.sanitize.redirect_markers) else {
            return text.to_string();
        };

        if depth >= self.sanitize.max_redirect_depth {
            warn!(%target, depth, "redirect chain too deep");
            return unresolved_placeholder(&target);
        }

        debug!(%target, depth, "resolving redirect");

        let chunks = self.store.chunks_for_title(&target);
        if chunks.is_empty() {
            return unresolved_placeholder(&target);
        }

        // One title can map to several documents; take them in corpus order
        // and prefer the first that is not itself a redirect.
        let mut chain_candidate: Option<String> = None;
        for document in group_documents(&chunks) {
            let content = merge_chunks(&document, self.merge.min_overlap, self.merge.max_overlap);
            if is_redirect(&content, &self.sanitize.redirect_markers) {
                chain_candidate.get_or_insert(content);
            } else {
                return content;
            }
        }

        match chain_candidate {
            Some(stub) => self.resolve_at_depth(&stub, depth + 1),
            None => unresolved_placeholder(&target),
        }
    }
}

/// Split title-matched chunks into per-document chunk lists, preserving
/// first-seen document order
fn group_documents(chunks: &[std::sync::Arc<CorpusEntry>]) -> Vec<Vec<Chunk>> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: Vec<Vec<Chunk>> = Vec::new();

    for entry in chunks {
        let key = entry.group_key();
        let slot = match order.iter().position(|k| *k == key) {
            Some(pos) => pos,
            None => {
                order.push(key);
                groups.push(Vec::new());
                order.len() - 1
            }
        };
        groups[slot].push(Chunk::new(
            entry.id.clone(),
            entry.text.clone(),
            entry.chunk_index(),
        ));
    }

    groups
}
