//! Removal from document-level carriers.
//!
//! Metadata, outline titles, annotation text, the XMP packet and the search
//! index are free text outside any content stream. Each is re-matched and
//! cleaned on its own terms.

use crate::annotations::AnnotationField;
use crate::config::SanitizerConfig;
use crate::document::{Catalog, Document};
use crate::encryption::Action;
use crate::error::Result;
use crate::patterns::{MatchSpan, PatternMatcher};

use super::audit::{Carrier, RedactionRecord};

/// Carrier-wide removals that go beyond matched values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubOptions {
    /// Remove every metadata field, matching or not
    pub strip_all_metadata: bool,
    /// Remove every annotation, matching or not
    pub flatten_annotations: bool,
}

impl From<&SanitizerConfig> for ScrubOptions {
    fn from(config: &SanitizerConfig) -> Self {
        Self {
            strip_all_metadata: config.strip_all_metadata,
            flatten_annotations: config.flatten_annotations,
        }
    }
}

/// Remove matches from the document-level carriers of `document`.
///
/// Requires the modify permission on protected documents.
pub fn scrub(document: &mut Document, matcher: &PatternMatcher, options: ScrubOptions) -> Result<Vec<RedactionRecord>> {
    document.authorize(Action::Modify)?;
    let mut removed = Vec::new();
    Ok(scrub_catalog(document.catalog_mut(), matcher, options, &mut removed))
}

/// Scrub every carrier of `catalog`, pushing each removed match into `removed`.
pub(crate) fn scrub_catalog(
    catalog: &mut Catalog,
    matcher: &PatternMatcher,
    options: ScrubOptions,
    removed: &mut Vec<MatchSpan>,
) -> Vec<RedactionRecord> {
    let mut records = Vec::new();
    scrub_metadata(catalog, matcher, options, removed, &mut records);
    scrub_outline(catalog, matcher, removed, &mut records);
    scrub_annotations(catalog, matcher, options, removed, &mut records);

    let xmp_hits = catalog.xmp.as_deref().map(|x| matcher.find_all(x)).unwrap_or_default();
    if !xmp_hits.is_empty() {
        catalog.xmp = None;
        records.extend(span_records(None, Carrier::Xmp, &xmp_hits));
        removed.extend(xmp_hits);
    }

    let index_hits = catalog
        .search_index
        .as_deref()
        .map(|x| matcher.find_all(x))
        .unwrap_or_default();
    if !index_hits.is_empty() {
        catalog.search_index = None;
        records.extend(span_records(None, Carrier::SearchIndex, &index_hits));
        removed.extend(index_hits);
    }

    if !records.is_empty() {
        log::debug!("Scrubbed {} document-level values", records.len());
    }
    records
}

fn span_records<'a>(
    page_index: Option<usize>,
    carrier: Carrier,
    spans: &'a [MatchSpan],
) -> impl Iterator<Item = RedactionRecord> + 'a {
    spans
        .iter()
        .map(move |s| RedactionRecord::removed(page_index, carrier.clone(), Some(s.pattern_kind), None))
}

fn scrub_metadata(
    catalog: &mut Catalog,
    matcher: &PatternMatcher,
    options: ScrubOptions,
    removed: &mut Vec<MatchSpan>,
    records: &mut Vec<RedactionRecord>,
) {
    let mut doomed = Vec::new();
    for (key, value) in &catalog.metadata {
        let hits = matcher.find_all(value);
        let carrier = Carrier::Metadata { key: key.clone() };
        if !hits.is_empty() {
            records.extend(span_records(None, carrier, &hits));
            removed.extend(hits);
            doomed.push(key.clone());
        } else if options.strip_all_metadata {
            records.push(RedactionRecord::removed(None, carrier, None, None));
            doomed.push(key.clone());
        }
    }
    for key in doomed {
        catalog.metadata.shift_remove(&key);
    }
}

/// Excise matches from every title. Excision can join text into a new
/// match, so each title is re-matched until clean.
fn scrub_outline(
    catalog: &mut Catalog,
    matcher: &PatternMatcher,
    removed: &mut Vec<MatchSpan>,
    records: &mut Vec<RedactionRecord>,
) {
    let mut index = 0;
    for root in &mut catalog.outline {
        root.visit_mut(&mut |item| {
            loop {
                let hits = matcher.find_all(&item.title);
                if hits.is_empty() {
                    break;
                }
                for span in hits.iter().rev() {
                    item.title.replace_range(span.start_offset..span.end_offset, "");
                }
                records.extend(span_records(None, Carrier::Outline { index }, &hits));
                removed.extend(hits);
            }
            index += 1;
        });
    }
}

fn scrub_annotations(
    catalog: &mut Catalog,
    matcher: &PatternMatcher,
    options: ScrubOptions,
    removed: &mut Vec<MatchSpan>,
    records: &mut Vec<RedactionRecord>,
) {
    for (index, annotation) in catalog.annotations.iter_mut().enumerate() {
        for field in AnnotationField::ALL {
            let hits = annotation.field(field).map(|text| matcher.find_all(text)).unwrap_or_default();
            if hits.is_empty() {
                continue;
            }
            annotation.clear_field(field);
            records.extend(hits.iter().map(|s| {
                RedactionRecord::removed(
                    Some(annotation.page_index),
                    Carrier::Annotation {
                        index,
                        field: Some(field),
                    },
                    Some(s.pattern_kind),
                    annotation.rect,
                )
            }));
            removed.extend(hits);
        }
    }

    if options.flatten_annotations {
        for (index, annotation) in catalog.annotations.drain(..).enumerate() {
            records.push(RedactionRecord::removed(
                Some(annotation.page_index),
                Carrier::Annotation { index, field: None },
                None,
                annotation.rect,
            ));
        }
    }
}
