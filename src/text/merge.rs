//! Overlap-aware chunk merging and representative-window extraction.
//!
//! Adjacent chunks of one document share a suffix/prefix overlap from the
//! splitter; merging removes it so the reconstructed passage reads cleanly.
//! All lengths here are in characters, not bytes (the corpus mixes English
//! and Japanese text).

use tracing::{debug, warn};

/// A chunk of document text as seen by the merger
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// Position within the document, when the loader knows it
    pub index: Option<usize>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            index,
        }
    }
}

/// Length of the longest overlap between the end of `text1` and the start of
/// `text2`, in characters, bounded by `[min_overlap, max_overlap]`.
///
/// Scans longest-first and returns the first match; the greedy choice avoids
/// short coincidental matches. Returns 0 when no overlap qualifies.
pub fn find_overlap(text1: &str, text2: &str, min_overlap: usize, max_overlap: usize) -> usize {
    let chars1: Vec<char> = text1.chars().collect();
    let chars2: Vec<char> = text2.chars().collect();

    let floor = min_overlap.max(1);
    let mut len = max_overlap.min(chars1.len()).min(chars2.len());

    while len >= floor {
        if chars1[chars1.len() - len..] == chars2[..len] {
            return len;
        }
        len -= 1;
    }

    0
}

/// Merge an ordered chunk sequence into one passage, removing overlaps.
///
/// Chunks carrying an explicit index are sorted by it; the rest keep their
/// given order (the splitter emits chunks in document order, so insertion
/// order is the best-effort fallback).
pub fn merge_chunks(chunks: &[Chunk], min_overlap: usize, max_overlap: usize) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    if chunks.len() == 1 {
        return chunks[0].text.clone();
    }

    // Indexless chunks keep their slot, so the key is a total order
    let mut sorted: Vec<(usize, &Chunk)> = chunks.iter().enumerate().collect();
    sorted.sort_by_key(|&(pos, chunk)| (chunk.index.unwrap_or(pos), pos));

    let mut merged = sorted[0].1.text.clone();
    let mut total_overlap = 0;

    for (_, chunk) in &sorted[1..] {
        let overlap = find_overlap(&merged, &chunk.text, min_overlap, max_overlap);
        if overlap > 0 {
            total_overlap += overlap;
            merged.push_str(skip_chars(&chunk.text, overlap));
        } else {
            merged.push_str("\n\n");
            merged.push_str(&chunk.text);
        }
    }

    debug!(
        chunks = sorted.len(),
        overlap_removed = total_overlap,
        "merged document chunks"
    );

    merged
}

/// Extract a window of at most `context_size` characters centered on the
/// representative chunk, then merge it with overlap removal.
///
/// Walks backward and forward from the representative, taking whole chunks
/// while they fit inside half the budget and a partial suffix/prefix of the
/// chunk that would overflow. Falls back to the representative's raw text
/// when it cannot be located in the list.
pub fn representative_window(
    chunks: &[Chunk],
    representative: &Chunk,
    context_size: usize,
    min_overlap: usize,
    max_overlap: usize,
) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    if chunks.len() == 1 {
        return chunks[0].text.clone();
    }

    let rep_pos = chunks
        .iter()
        .position(|c| c.id == representative.id || c.text == representative.text);

    let rep_pos = match rep_pos {
        Some(pos) => pos,
        None => {
            warn!("representative chunk not found in chunk list");
            return representative.text.clone();
        }
    };

    let half_context = context_size / 2;

    let mut before: Vec<Chunk> = Vec::new();
    let mut before_size = 0;
    for chunk in chunks[..rep_pos].iter().rev() {
        if before_size >= half_context {
            break;
        }
        let len = char_len(&chunk.text);
        if before_size + len <= half_context {
            before.insert(0, chunk.clone());
            before_size += len;
        } else {
            // Partial chunk: only the tail that still fits
            let remaining = half_context - before_size;
            before.insert(
                0,
                Chunk::new(chunk.id.clone(), last_chars(&chunk.text, remaining), chunk.index),
            );
            break;
        }
    }

    let mut after: Vec<Chunk> = Vec::new();
    let mut after_size = 0;
    for chunk in &chunks[rep_pos + 1..] {
        if after_size >= half_context {
            break;
        }
        let len = char_len(&chunk.text);
        if after_size + len <= half_context {
            after.push(chunk.clone());
            after_size += len;
        } else {
            let remaining = half_context - after_size;
            after.push(Chunk::new(
                chunk.id.clone(),
                first_chars(&chunk.text, remaining),
                chunk.index,
            ));
            break;
        }
    }

    let mut selected = before;
    selected.push(chunks[rep_pos].clone());
    selected.extend(after);

    debug!(
        selected = selected.len(),
        context_size, "built representative chunk window"
    );

    merge_chunks(&selected, min_overlap, max_overlap)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The remainder of `s` after dropping its first `n` characters
fn skip_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((offset, _)) => &s[offset..],
        None => "",
    }
}

/// The first `n` characters of `s`
fn first_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((offset, _)) => &s[..offset],
        None => s,
    }
}

/// The last `n` characters of `s`
fn last_chars(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if n >= len {
        s
    } else {
        skip_chars(s, len - n)
    }
}
