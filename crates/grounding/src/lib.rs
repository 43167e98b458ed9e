//! Turning raw nearest-neighbour hits into generator input.
//!
//! Two deterministic steps sit between the vector store and the answer
//! generator:
//!
//! 1. [`filter_hits`] keeps hits whose document type suits the detected
//!    intent (FAQs for policy questions, products for product questions) and
//!    falls back to the unfiltered head of the list when nothing survives.
//! 2. [`assemble`] renders the survivors into a bounded context blob and
//!    collects their distinct source URLs.
//!
//! Neither step re-ranks: output order is always input order.

mod context;
mod filter;

pub use context::{
    assemble, build_context, extract_sources, header_line, top_match_titles, truncate_chars,
    AssembledContext, BLOCK_SEPARATOR, DEFAULT_MAX_CHARS_PER_DOC, DEFAULT_MAX_SOURCES, ELLIPSIS,
};
pub use filter::{filter_hits, TypeRule};
