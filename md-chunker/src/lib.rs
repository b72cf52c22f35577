//! Markdown → chunks.
//!
//! The pipeline is: strip front matter → clean templating shortcodes →
//! split by headings (ignoring `#` inside fenced code) → merge small sibling
//! sections → number the result into [`Chunk`]s with stable ids.
//!
//! Every step is a pure function over strings; file I/O only happens in
//! [`Document::load`].

pub mod code_fence;
mod document;
mod errors;
pub mod headings;
pub mod merge;
pub mod shortcodes;

pub use document::{Chunk, ChunkOptions, DEFAULT_MAX_CHUNK_CHARS, DocMetadata, Document};
pub use errors::ChunkError;
pub use headings::{SECTION_PATH_SEPARATOR, Section};

/// Runs the text part of the pipeline: clean → split → merge.
pub fn chunk_text(content: &str, max_chars: usize) -> Vec<Section> {
    let cleaned = shortcodes::clean(content);
    let sections = headings::split(&cleaned);
    merge::merge(sections, max_chars)
}
