//! Document outline (bookmarks).
//!
//! Outline titles are free text and can carry the same identifiers as page
//! content, so the scrub pass walks the whole tree.

use serde::{Deserialize, Serialize};

/// A single outline item (bookmark) in the document hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    /// The title of this bookmark
    pub title: String,

    /// The destination (page number or named destination)
    /// None if destination cannot be determined
    pub dest: Option<Destination>,

    /// Child bookmarks under this item
    pub children: Vec<OutlineItem>,
}

/// Destination in the PDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Destination {
    /// Direct page reference (page index, 0-based)
    PageIndex(usize),

    /// Named destination (string identifier)
    Named(String),
}

impl OutlineItem {
    /// A bookmark with no destination and no children.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            dest: None,
            children: Vec::new(),
        }
    }

    /// Point the bookmark at a page.
    pub fn with_page(mut self, page_index: usize) -> Self {
        self.dest = Some(Destination::PageIndex(page_index));
        self
    }

    /// Append a child bookmark.
    pub fn with_child(mut self, child: OutlineItem) -> Self {
        self.children.push(child);
        self
    }

    /// Visit this item and all descendants depth-first.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a OutlineItem)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Visit this item and all descendants depth-first, mutably.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut OutlineItem)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }
}
