//! Wiki markup cleanup.
//!
//! A fixed sequence of idempotent passes. Order matters: section truncation
//! assumes templates and comments are already gone, and link rewriting runs
//! after media/category links have been removed outright.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

use crate::config::SanitizeConfig;

static RE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<ref[^>]*/>|<ref\b[^>]*>.*?</ref>|</?references[^>]*>")
        .expect("hardcoded pattern")
});

static RE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("hardcoded pattern"));

static RE_EXTERNAL_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:https?|ftp)://[^\s\]]+[ \t]+([^\]]*)\]").expect("hardcoded pattern")
});

static RE_EXTERNAL_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:https?|ftp)://[^\s\]]+\]").expect("hardcoded pattern"));

static RE_CATEGORY_LANG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(?:[Cc]ategory|カテゴリ|[a-z]{2,3}(?:-[a-z]+)*):[^\]]*\]\]\n?")
        .expect("hardcoded pattern")
});

static RE_WIKILINK_PIPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[[^\]|]*\|([^\]]*)\]\]").expect("hardcoded pattern"));

static RE_WIKILINK_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]*)\]\]").expect("hardcoded pattern"));

static RE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^=+[^=\n][^\n]*=+[ \t]*$").expect("hardcoded pattern"));

static RE_BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("hardcoded pattern"));

const MEDIA_PREFIXES: &[&str] = &["file", "image", "media", "ファイル", "画像"];

/// Markup sanitizer with per-site section patterns compiled once
pub struct Sanitizer {
    section_headings: Vec<Regex>,
}

impl Sanitizer {
    pub fn new(config: &SanitizeConfig) -> Result<Self> {
        let mut section_headings = Vec::with_capacity(config.truncated_sections.len());
        for name in &config.truncated_sections {
            let pattern = format!(r"(?mi)^=+[ \t]*{}[ \t]*=+[ \t]*$", regex::escape(name));
            let re = Regex::new(&pattern)
                .with_context(|| format!("invalid section name pattern: {name}"))?;
            section_headings.push(re);
        }
        Ok(Self { section_headings })
    }

    /// Apply all cleanup passes in their fixed order
    pub fn sanitize(&self, text: &str) -> String {
        let text = strip_media_links(text);
        let text = RE_REF.replace_all(&text, "");
        let text = strip_templates(&text);
        let text = RE_COMMENT.replace_all(&text, "");
        let text = RE_EXTERNAL_LABELED.replace_all(&text, "$1");
        let text = RE_EXTERNAL_BARE.replace_all(&text, "");
        let text = RE_CATEGORY_LANG.replace_all(&text, "");
        let text = self.truncate_sections(&text);
        let text = RE_WIKILINK_PIPED.replace_all(&text, "$1");
        let text = RE_WIKILINK_PLAIN.replace_all(&text, "$1");
        let text = RE_BLANK_RUN.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    /// Drop each configured section from its heading to the next heading
    /// (or end of text when it is the last section)
    fn truncate_sections(&self, text: &str) -> String {
        let mut result = text.to_string();

        for heading in &self.section_headings {
            while let Some(m) = heading.find(&result) {
                let cut_end = RE_HEADING
                    .find_at(&result, m.end())
                    .map(|next| next.start())
                    .unwrap_or(result.len());
                result.replace_range(m.start()..cut_end, "");
            }
        }

        result
    }
}

/// Remove `[[File:...]]` / `[[Image:...]]` links, including captions that
/// contain nested links
fn strip_media_links(text: &str) -> String {
    strip_nested(text, "[[", "]]", |inner| {
        let prefix = match inner.split_once(':') {
            Some((prefix, _)) => prefix.trim().to_lowercase(),
            None => return false,
        };
        MEDIA_PREFIXES.contains(&prefix.as_str())
    })
}

/// Remove all `{{...}}` templates, nesting-aware
fn strip_templates(text: &str) -> String {
    strip_nested(text, "{{", "}}", |_| true)
}

/// Walk `text` removing balanced `open`/`close` spans for which
/// `should_strip(inner)` holds. Unbalanced markup is left untouched.
fn strip_nested<F>(text: &str, open: &str, close: &str, should_strip: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(open) {
        let mut depth = 1;
        let mut pos = start + open.len();
        let mut span_end = None;

        while depth > 0 {
            let next_open = rest[pos..].find(open);
            let next_close = rest[pos..].find(close);
            match (next_open, next_close) {
                (Some(o), Some(c)) if o < c => {
                    depth += 1;
                    pos += o + open.len();
                }
                (_, Some(c)) => {
                    depth -= 1;
                    pos += c + close.len();
                    if depth == 0 {
                        span_end = Some(pos);
                    }
                }
                _ => break,
            }
        }

        match span_end {
            Some(end) => {
                let inner = &rest[start + open.len()..end - close.len()];
                out.push_str(&rest[..start]);
                if !should_strip(inner) {
                    out.push_str(&rest[start..end]);
                }
                rest = &rest[end..];
            }
            None => {
                // No matching close; emit through the opener and move on
                out.push_str(&rest[..start + open.len()]);
                rest = &rest[start + open.len()..];
            }
        }
    }

    out.push_str(rest);
    out
}
