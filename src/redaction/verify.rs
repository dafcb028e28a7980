//! Post-redaction verification.
//!
//! The verification pass re-extracts every carrier of the redacted
//! document and re-runs all configured recognizers. It is the proof that
//! removal happened: a run whose verification fails must be discarded.

use rayon::prelude::*;

use crate::document::{Catalog, Document, Page};
use crate::error::{Error, PageError, Result};
use crate::extractors::extract_page_text;
use crate::geometry::Rect;
use crate::patterns::{MatchSpan, PatternMatcher};

use super::area;
use super::audit::{Carrier, RedactionRecord};

/// A match found after redaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivingMatch {
    /// Page of the carrier; `None` for document-level carriers
    pub page_index: Option<usize>,
    /// Where the match was found
    pub carrier: Carrier,
    /// The match
    pub span: MatchSpan,
}

// Never prints the matched value.
impl std::fmt::Display for SurvivingMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.span.pattern_kind, self.carrier)?;
        if let Some(page) = self.page_index {
            write!(f, " on page {}", page)?;
        }
        Ok(())
    }
}

/// Content left inside a redacted area.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivingContent {
    /// Page holding the area
    pub page_index: usize,
    /// What is still drawn there
    pub carrier: Carrier,
    /// Box of the remaining content
    pub bbox: Rect,
}

/// A page whose text could not be extracted for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct UnverifiablePage {
    /// Page index
    pub page_index: usize,
    /// Extraction failure
    pub reason: String,
}

/// Everything that kept a document from verifying.
#[derive(Debug, Default)]
pub struct VerificationReport {
    /// Matches still present
    pub survivors: Vec<SurvivingMatch>,
    /// Content still drawn inside redacted areas
    pub area_survivors: Vec<SurvivingContent>,
    /// Pages that could not be checked
    pub unverifiable: Vec<UnverifiablePage>,
    /// Page-local errors collected while redacting
    pub page_errors: Vec<PageError>,
    /// Records of values the run left in place
    pub unresolved: Vec<RedactionRecord>,
}

impl VerificationReport {
    /// Whether nothing survived and every page was checked.
    pub fn is_clean(&self) -> bool {
        self.survivors.is_empty()
            && self.area_survivors.is_empty()
            && self.unverifiable.is_empty()
            && self.page_errors.is_empty()
    }
}

impl std::fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} surviving matches, {} unverifiable pages",
            self.survivors.len() + self.area_survivors.len(),
            self.unverifiable.len()
        )?;
        for s in &self.survivors {
            write!(f, "; {}", s)?;
        }
        for s in &self.area_survivors {
            write!(f, "; {} inside redacted area on page {}", s.carrier, s.page_index)?;
        }
        for u in &self.unverifiable {
            write!(f, "; page {} unverifiable: {}", u.page_index, u.reason)?;
        }
        for e in &self.page_errors {
            write!(f, "; {}", e)?;
        }
        Ok(())
    }
}

/// Outcome of a verification pass.
#[derive(Debug)]
pub enum Verification {
    /// Nothing survived
    Passed,
    /// Something survived or could not be checked
    Failed(VerificationReport),
}

impl Verification {
    pub(crate) fn from_report(report: VerificationReport) -> Self {
        if report.is_clean() {
            Verification::Passed
        } else {
            Verification::Failed(report)
        }
    }

    /// Whether verification passed.
    pub fn is_passed(&self) -> bool {
        matches!(self, Verification::Passed)
    }

    /// Convert into `Ok(())` or [`Error::VerificationFailure`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Verification::Passed => Ok(()),
            Verification::Failed(report) => {
                log::warn!("Verification failed: {}", report);
                Err(Error::VerificationFailure(Box::new(report)))
            },
        }
    }
}

/// Verify every page and document-level carrier of `document`.
pub fn verify(document: &Document, matcher: &PatternMatcher) -> Verification {
    Verification::from_report(check_document(document, matcher, false))
}

/// Verify that nothing is drawn inside `area` on `page`.
pub fn verify_area(page: &Page, page_index: usize, area: &Rect) -> Verification {
    let mut report = VerificationReport::default();
    match extract_page_text(page, page_index) {
        Ok(text) => {
            report.area_survivors = area::remnants(page, &text, area)
                .into_iter()
                .map(|(carrier, bbox)| SurvivingContent {
                    page_index,
                    carrier,
                    bbox,
                })
                .collect();
        },
        Err(e) => report.unverifiable.push(UnverifiablePage {
            page_index,
            reason: e.to_string(),
        }),
    }
    Verification::from_report(report)
}

/// Build the report for a whole document, optionally checking pages in parallel.
pub(crate) fn check_document(document: &Document, matcher: &PatternMatcher, parallel: bool) -> VerificationReport {
    let check = |(page_index, page): (usize, &Page)| -> std::result::Result<Vec<SurvivingMatch>, UnverifiablePage> {
        let text = extract_page_text(page, page_index).map_err(|e| UnverifiablePage {
            page_index,
            reason: e.to_string(),
        })?;
        let marked = text.marked.iter().map(|m| m.text.as_str());
        Ok(std::iter::once(text.text.as_str())
            .chain(marked)
            .flat_map(|t| matcher.find_all(t))
            .map(|span| SurvivingMatch {
                page_index: Some(page_index),
                carrier: Carrier::Content,
                span,
            })
            .collect())
    };

    let results: Vec<_> = if parallel {
        document.pages().par_iter().enumerate().map(check).collect()
    } else {
        document.pages().iter().enumerate().map(check).collect()
    };

    let mut report = VerificationReport::default();
    for result in results {
        match result {
            Ok(survivors) => report.survivors.extend(survivors),
            Err(unverifiable) => report.unverifiable.push(unverifiable),
        }
    }
    report.survivors.extend(check_catalog(document.catalog(), matcher));
    log::debug!(
        "Verified {} pages: {} survivors, {} unverifiable",
        document.page_count(),
        report.survivors.len(),
        report.unverifiable.len()
    );
    report
}

fn check_catalog(catalog: &Catalog, matcher: &PatternMatcher) -> Vec<SurvivingMatch> {
    let mut out = Vec::new();
    let mut found = |page_index: Option<usize>, carrier: Carrier, text: &str| {
        out.extend(matcher.find_all(text).into_iter().map(|span| SurvivingMatch {
            page_index,
            carrier: carrier.clone(),
            span,
        }));
    };

    for (key, value) in &catalog.metadata {
        found(None, Carrier::Metadata { key: key.clone() }, value);
    }

    let mut index = 0;
    for root in &catalog.outline {
        root.visit(&mut |item| {
            found(None, Carrier::Outline { index }, &item.title);
            index += 1;
        });
    }

    for (index, annotation) in catalog.annotations.iter().enumerate() {
        for field in crate::annotations::AnnotationField::ALL {
            if let Some(text) = annotation.field(field) {
                found(
                    Some(annotation.page_index),
                    Carrier::Annotation {
                        index,
                        field: Some(field),
                    },
                    text,
                );
            }
        }
    }

    if let Some(xmp) = &catalog.xmp {
        found(None, Carrier::Xmp, xmp);
    }
    if let Some(search_index) = &catalog.search_index {
        found(None, Carrier::SearchIndex, search_index);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, AnnotationField};
    use crate::config::SanitizerConfig;
    use crate::document::Resources;
    use crate::fonts::Font;
    use crate::outline::OutlineItem;
    use crate::patterns::PatternKind;

    fn matcher() -> PatternMatcher {
        PatternMatcher::new(&SanitizerConfig::baseline([PatternKind::Pan, PatternKind::Aadhaar])).unwrap()
    }

    fn page(content: &[u8]) -> Page {
        Page::from_content(content, Resources::new().with_font("F1", Font::simple("Helvetica"))).unwrap()
    }

    #[test]
    fn test_clean_document_passes() {
        let doc = Document::builder()
            .page(page(b"BT /F1 12 Tf (nothing to see) Tj ET"))
            .metadata("Title", "Quarterly report")
            .build();
        assert!(verify(&doc, &matcher()).is_passed());
    }

    #[test]
    fn test_empty_document_passes() {
        let doc = Document::builder().build();
        assert!(verify(&doc, &matcher()).into_result().is_ok());
    }

    #[test]
    fn test_every_carrier_is_checked() {
        let doc = Document::builder()
            .page(page(b"BT /F1 12 Tf (PAN ABCDE1234F) Tj ET"))
            .metadata("Subject", "1234 5678 9012")
            .outline(OutlineItem::new("Root").with_child(OutlineItem::new("Holder ABCDE1234F")))
            .annotation(Annotation::new("Text", 0).with_author("ABCDE1234F"))
            .xmp("<rdf>ABCDE1234F</rdf>")
            .search_index("abcde1234f")
            .build();

        let Verification::Failed(report) = verify(&doc, &matcher()) else {
            panic!("expected failure");
        };
        let carriers: Vec<&Carrier> = report.survivors.iter().map(|s| &s.carrier).collect();
        assert_eq!(
            carriers,
            vec![
                &Carrier::Content,
                &Carrier::Metadata {
                    key: "Subject".to_string()
                },
                &Carrier::Outline { index: 1 },
                &Carrier::Annotation {
                    index: 0,
                    field: Some(AnnotationField::Author)
                },
                &Carrier::Xmp,
                &Carrier::SearchIndex,
            ]
        );
    }

    #[test]
    fn test_marked_content_text_is_checked() {
        let doc = Document::builder()
            .page(page(b"BT /F1 12 Tf /Span <</ActualText (hello)>> BDC (ABCDE1234F) Tj EMC ET"))
            .page(page(b"BT /F1 12 Tf /Figure <</Alt (Aadhaar 1234 5678 9012)>> BDC (x) Tj EMC ET"))
            .build();
        let Verification::Failed(report) = verify(&doc, &matcher()) else {
            panic!("expected failure");
        };
        let found: Vec<(Option<usize>, PatternKind)> =
            report.survivors.iter().map(|s| (s.page_index, s.span.pattern_kind)).collect();
        assert_eq!(found, vec![(Some(0), PatternKind::Pan), (Some(1), PatternKind::Aadhaar)]);
        assert!(report.survivors.iter().all(|s| s.carrier == Carrier::Content));
    }

    #[test]
    fn test_report_display_omits_values() {
        let doc = Document::builder().page(page(b"BT /F1 12 Tf (ABCDE1234F) Tj ET")).build();
        let err = verify(&doc, &matcher()).into_result().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PAN in page content on page 0"));
        assert!(!msg.contains("ABCDE1234F"));
    }

    #[test]
    fn test_unextractable_page_is_unverifiable() {
        let doc = Document::builder().page(page(b"BT /F7 12 Tf (x) Tj ET")).build();
        let Verification::Failed(report) = verify(&doc, &matcher()) else {
            panic!("expected failure");
        };
        assert_eq!(report.unverifiable.len(), 1);
        assert_eq!(report.unverifiable[0].page_index, 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let doc = Document::builder()
            .page(page(b"BT /F1 12 Tf (ABCDE1234F) Tj ET"))
            .page(page(b"BT /F1 12 Tf (clean) Tj ET"))
            .page(page(b"BT /F1 12 Tf (1234 5678 9012) Tj ET"))
            .build();
        let seq = check_document(&doc, &matcher(), false);
        let par = check_document(&doc, &matcher(), true);
        assert_eq!(seq.survivors, par.survivors);
        assert_eq!(par.survivors.len(), 2);
    }

    #[test]
    fn test_verify_area() {
        let p = page(b"BT /F1 10 Tf 100 700 Td (ABC) Tj ET");
        assert!(!verify_area(&p, 0, &Rect::new(100.0, 695.0, 20.0, 10.0)).is_passed());
        assert!(verify_area(&p, 0, &Rect::new(0.0, 0.0, 50.0, 50.0)).is_passed());
    }

    #[test]
    fn test_report_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VerificationReport>();
    }
}
