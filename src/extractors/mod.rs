//! Text extraction from page content.
//!
//! Produces the text that pattern matching runs on, with per-character
//! provenance back to the operators that drew it. Extraction is reached
//! from outside the crate through `Document::page_text`.

pub mod text;

pub(crate) use text::extract_page_text;
pub use text::{
    CharSource, GlyphRef, MarkedSource, MarkedText, PageText, ShowState, TextChar, MARKED_TEXT_KEYS, MAX_FORM_DEPTH,
};
