//! Page annotations.
//!
//! Only the free-text parts of an annotation (`/Contents`, `/T`, `/Subj`)
//! are modelled in detail; they are the fields an identifier can hide in.

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};

/// A PDF annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation subtype (Text, Highlight, FreeText, ...)
    pub subtype: String,

    /// Page the annotation belongs to (0-based)
    pub page_index: usize,

    /// Rectangle bounds
    pub rect: Option<Rect>,

    /// Text contents of the annotation
    pub contents: Option<String>,

    /// Author/creator of the annotation (T entry)
    pub author: Option<String>,

    /// Subject of the annotation
    pub subject: Option<String>,

    /// Modification date (M entry)
    pub modification_date: Option<String>,
}

/// The free-text fields of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationField {
    /// `/Contents`
    Contents,
    /// `/T`
    Author,
    /// `/Subj`
    Subject,
}

impl AnnotationField {
    /// All free-text fields.
    pub const ALL: [AnnotationField; 3] = [
        AnnotationField::Contents,
        AnnotationField::Author,
        AnnotationField::Subject,
    ];

    /// The dictionary key this field is stored under.
    pub fn key(self) -> &'static str {
        match self {
            AnnotationField::Contents => "Contents",
            AnnotationField::Author => "T",
            AnnotationField::Subject => "Subj",
        }
    }
}

impl Annotation {
    /// An annotation of `subtype` on `page_index` with no text.
    pub fn new(subtype: impl Into<String>, page_index: usize) -> Self {
        Self {
            subtype: subtype.into(),
            page_index,
            rect: None,
            contents: None,
            author: None,
            subject: None,
            modification_date: None,
        }
    }

    /// Set the bounds.
    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Set `/Contents`.
    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    /// Set `/T`.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set `/Subj`.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// The value of a free-text field.
    pub fn field(&self, field: AnnotationField) -> Option<&str> {
        match field {
            AnnotationField::Contents => self.contents.as_deref(),
            AnnotationField::Author => self.author.as_deref(),
            AnnotationField::Subject => self.subject.as_deref(),
        }
    }

    /// Clear a free-text field; returns whether it was set.
    pub fn clear_field(&mut self, field: AnnotationField) -> bool {
        let slot = match field {
            AnnotationField::Contents => &mut self.contents,
            AnnotationField::Author => &mut self.author,
            AnnotationField::Subject => &mut self.subject,
        };
        slot.take().is_some()
    }
}
