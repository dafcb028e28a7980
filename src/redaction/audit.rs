//! Append-only audit log of redaction decisions.
//!
//! Records name where something was removed and which recognizer found it,
//! never the removed value itself. The log is returned to the caller and
//! is never written into the document.

use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotations::AnnotationField;
use crate::error::Result;
use crate::geometry::Rect;
use crate::patterns::PatternKind;

/// Where a redacted (or surviving) value lived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "carrier", rename_all = "snake_case")]
pub enum Carrier {
    /// Glyphs in a page content stream
    Content,
    /// An image painted on a page
    Image,
    /// A document information field
    Metadata {
        /// Field name
        key: String,
    },
    /// An outline title, by depth-first position in the outline
    Outline {
        /// Pre-order index over all outline items
        index: usize,
    },
    /// An annotation field, or the whole annotation when `field` is `None`
    Annotation {
        /// Position in the document's annotation list
        index: usize,
        /// Affected free-text field
        field: Option<AnnotationField>,
    },
    /// The XMP metadata packet
    Xmp,
    /// The embedded search index
    SearchIndex,
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Carrier::Content => write!(f, "page content"),
            Carrier::Image => write!(f, "image"),
            Carrier::Metadata { key } => write!(f, "metadata /{}", key),
            Carrier::Outline { index } => write!(f, "outline item {}", index),
            Carrier::Annotation { index, field: Some(field) } => {
                write!(f, "annotation {} /{}", index, field.key())
            },
            Carrier::Annotation { index, field: None } => write!(f, "annotation {}", index),
            Carrier::Xmp => write!(f, "XMP packet"),
            Carrier::SearchIndex => write!(f, "search index"),
        }
    }
}

/// Outcome of one redaction decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedactionStatus {
    /// The value was removed
    Removed,
    /// The value could not be removed
    Unresolved {
        /// Why removal was not possible
        reason: String,
    },
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Page of the carrier; `None` for document-level carriers
    pub page_index: Option<usize>,
    /// What held the value
    pub carrier: Carrier,
    /// Recognizer that matched; `None` for area and blanket removals
    pub pattern_kind: Option<PatternKind>,
    /// Area covered on the page, when known
    pub bounding_box: Option<Rect>,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Outcome
    pub status: RedactionStatus,
}

impl RedactionRecord {
    /// A record for a removed value.
    pub fn removed(
        page_index: Option<usize>,
        carrier: Carrier,
        pattern_kind: Option<PatternKind>,
        bounding_box: Option<Rect>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            page_index,
            carrier,
            pattern_kind,
            bounding_box,
            timestamp: Utc::now(),
            status: RedactionStatus::Removed,
        }
    }

    /// A record for a value that stayed in place.
    pub fn unresolved(
        page_index: Option<usize>,
        carrier: Carrier,
        pattern_kind: Option<PatternKind>,
        bounding_box: Option<Rect>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: RedactionStatus::Unresolved { reason: reason.into() },
            ..Self::removed(page_index, carrier, pattern_kind, bounding_box)
        }
    }

    /// Whether the value was removed.
    pub fn is_removed(&self) -> bool {
        self.status == RedactionStatus::Removed
    }
}

/// Ordered, append-only collection of [`RedactionRecord`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLog {
    records: Vec<RedactionRecord>,
}

impl AuditLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, records: impl IntoIterator<Item = RedactionRecord>) {
        self.records.extend(records);
    }

    /// All records in the order they were made.
    pub fn records(&self) -> &[RedactionRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for values that were removed.
    pub fn removed(&self) -> impl Iterator<Item = &RedactionRecord> {
        self.records.iter().filter(|r| r.is_removed())
    }

    /// Records for values that could not be removed.
    pub fn unresolved(&self) -> impl Iterator<Item = &RedactionRecord> {
        self.records.iter().filter(|r| !r.is_removed())
    }

    /// Write one JSON object per line.
    pub fn write_json_lines<W: Write>(&self, mut writer: W) -> Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a log written by [`AuditLog::write_json_lines`]. Blank lines are skipped.
    pub fn read_json_lines<R: BufRead>(reader: R) -> Result<Self> {
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(Self { records })
    }
}

impl<'a> IntoIterator for &'a AuditLog {
    type Item = &'a RedactionRecord;
    type IntoIter = std::slice::Iter<'a, RedactionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
