use std::borrow::Cow;
use std::collections::HashSet;

use index::Hit;
use serde::Serialize;

/// Joins per-document blocks in the context blob.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";
/// Appended to a body that was cut at the character budget.
pub const ELLIPSIS: &str = "...";
pub const DEFAULT_MAX_CHARS_PER_DOC: usize = 1500;
pub const DEFAULT_MAX_SOURCES: usize = 6;

/// Context blob handed to the generator plus the URLs it cites.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub sources: Vec<String>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// `[type] title` with ` | url` appended when the document has one.
pub fn header_line(hit: &Hit) -> String {
    let doc = &hit.document;
    let mut header = format!("[{}] {}", doc.metadata.type_label(), doc.display_title());
    if let Some(url) = doc.metadata.url() {
        header.push_str(" | ");
        header.push_str(url);
    }
    header
}

/// Cut `text` to at most `max_chars` characters, marking the cut with
/// [`ELLIPSIS`].
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + ELLIPSIS.len());
            out.push_str(&text[..byte_idx]);
            out.push_str(ELLIPSIS);
            Cow::Owned(out)
        }
    }
}

/// Render `hits` into one context blob, in the given order.
pub fn build_context(hits: &[Hit], max_chars_per_doc: usize) -> String {
    hits.iter()
        .map(|hit| {
            let body = truncate_chars(hit.document.text.trim(), max_chars_per_doc);
            format!("{}\n{}", header_line(hit), body)
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Distinct URLs in first-seen order, at most `max_sources`.
pub fn extract_sources(hits: &[Hit], max_sources: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter_map(|hit| hit.document.metadata.url())
        .filter(|url| seen.insert(*url))
        .take(max_sources)
        .map(str::to_owned)
        .collect()
}

/// Display titles of the first `n` hits, used when generation fails.
pub fn top_match_titles(hits: &[Hit], n: usize) -> Vec<String> {
    hits.iter()
        .take(n)
        .map(|hit| hit.document.display_title().to_owned())
        .collect()
}

/// [`build_context`] and [`extract_sources`] in one go.
pub fn assemble(hits: &[Hit], max_chars_per_doc: usize, max_sources: usize) -> AssembledContext {
    AssembledContext {
        text: build_context(hits, max_chars_per_doc),
        sources: extract_sources(hits, max_sources),
    }
}
