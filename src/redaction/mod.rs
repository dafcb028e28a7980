//! Locating, removing and verifying the removal of identifiers.
//!
//! [`Redactor`] runs the whole pipeline over a copy of a document:
//!
//! 1. extract each page's text with glyph provenance
//! 2. match the configured recognizers
//! 3. locate the operators behind every match
//! 4. splice the glyphs out of the content stream
//! 5. scrub the document-level carriers
//! 6. verify that nothing survived
//!
//! The input document is never modified. A run whose verification fails
//! returns [`Error::VerificationFailure`] and no document.

pub mod apply;
pub mod area;
pub mod audit;
pub mod forms;
pub mod locator;
pub mod progress;
pub mod scrub;
pub mod verify;

pub use apply::{LocatedSpan, StructuralRedactor};
pub use audit::{AuditLog, Carrier, RedactionRecord, RedactionStatus};
pub use forms::inline_forms;
pub use locator::{locate, locate_marked, Location, OperatorRef, OperatorTarget, UnlocatableReason};
pub use progress::{CancellationToken, NoProgress, ProgressHook};
pub use scrub::{scrub, ScrubOptions};
pub use verify::{
    verify, verify_area, SurvivingContent, SurvivingMatch, UnverifiablePage, Verification,
    VerificationReport,
};

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use crate::config::{SanitizerConfig, UnlocatablePolicy};
use crate::document::{Document, Page};
use crate::encryption::Action;
use crate::error::{Error, PageError, Result};
use crate::extractors::{extract_page_text, CharSource, MarkedSource, PageText, MAX_FORM_DEPTH};
use crate::geometry::Rect;
use crate::patterns::{MatchSpan, PatternMatcher};

/// Result of a successful, verified run.
#[derive(Debug)]
pub struct RedactionOutcome {
    /// The redacted copy
    pub document: Document,
    /// One record per removed value
    pub audit: AuditLog,
    /// Matches per configured term
    pub term_counts: BTreeMap<String, usize>,
}

/// What one page contributed to a run.
#[derive(Debug, Default)]
struct PageResult {
    records: Vec<RedactionRecord>,
    removed: Vec<MatchSpan>,
    errors: Vec<PageError>,
}

/// Removes identifiers from documents.
///
/// # Examples
///
/// ```
/// use pdf_sanitizer::{Document, PatternKind, Redactor, SanitizerConfig};
/// use pdf_sanitizer::document::{Page, Resources};
/// use pdf_sanitizer::fonts::Font;
/// use pdf_sanitizer::redaction::NoProgress;
///
/// let resources = Resources::new().with_font("F1", Font::simple("Helvetica"));
/// let page = Page::from_content(b"BT /F1 12 Tf (PAN ABCDE1234F) Tj ET", resources)?;
/// let doc = Document::builder().page(page).build();
///
/// let redactor = Redactor::new(SanitizerConfig::baseline([PatternKind::Pan]))?;
/// let outcome = redactor.redact(&doc, &NoProgress)?;
/// assert_eq!(outcome.audit.len(), 1);
/// assert_eq!(outcome.document.copy_text(0)?, "PAN ");
/// # Ok::<(), pdf_sanitizer::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Redactor {
    config: SanitizerConfig,
    matcher: PatternMatcher,
}

impl Redactor {
    /// Validate `config` and build the recognizers.
    pub fn new(config: SanitizerConfig) -> Result<Self> {
        let matcher = PatternMatcher::new(&config)?;
        Ok(Self { config, matcher })
    }

    /// The configuration this redactor runs with.
    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// The recognizers, for callers that verify documents themselves.
    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Remove every match of the configured kinds from `document`.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if another operation holds `document`
    /// - [`Error::PermissionDenied`] if a user-unlocked document lacks the modify permission
    /// - [`Error::Cancelled`] if `hook` asks to stop
    /// - [`Error::UnlocatableSpan`] for the first unlocatable match under [`UnlocatablePolicy::FailFast`]
    /// - [`Error::VerificationFailure`] if anything survived or a page could not be checked
    pub fn redact(&self, document: &Document, hook: &dyn ProgressHook) -> Result<RedactionOutcome> {
        let _guard = document.begin_operation()?;
        document.authorize(Action::Modify)?;

        let mut output = document.clone();
        let total = output.page_count();
        log::info!(
            "Redacting {} pages with {} recognizers",
            total,
            self.matcher.kinds().len()
        );

        let pages = output.pages_mut();
        let results: Vec<PageResult> = if self.config.parallel {
            pages
                .par_iter_mut()
                .enumerate()
                .map(|(page_index, page)| self.redact_page(page, page_index, total, hook))
                .collect::<Result<_>>()?
        } else {
            pages
                .iter_mut()
                .enumerate()
                .map(|(page_index, page)| self.redact_page(page, page_index, total, hook))
                .collect::<Result<_>>()?
        };

        let mut audit = AuditLog::new();
        let mut removed = Vec::new();
        let mut page_errors = Vec::new();
        for result in results {
            audit.append(result.records);
            removed.extend(result.removed);
            page_errors.extend(result.errors);
        }

        audit.append(scrub::scrub_catalog(
            output.catalog_mut(),
            &self.matcher,
            ScrubOptions::from(&self.config),
            &mut removed,
        ));

        let mut report = verify::check_document(&output, &self.matcher, self.config.parallel);
        report.page_errors = page_errors;
        report.unresolved = audit.unresolved().cloned().collect();
        Verification::from_report(report).into_result()?;

        log::info!(
            "Removed {} values, {} unresolved",
            audit.removed().count(),
            audit.unresolved().count()
        );
        Ok(RedactionOutcome {
            document: output,
            term_counts: self.matcher.term_counts(&removed),
            audit,
        })
    }

    fn redact_page(
        &self,
        page: &mut Page,
        page_index: usize,
        total: usize,
        hook: &dyn ProgressHook,
    ) -> Result<PageResult> {
        if hook.should_cancel() {
            log::info!("Cancelled before page {}", page_index);
            return Err(Error::Cancelled);
        }

        let mut result = PageResult::default();
        let mut rounds = 0;
        let (text, located, unlocatable) = loop {
            let text = match extract_page_text(page, page_index) {
                Ok(text) => text,
                Err(e) => {
                    let error = page_local(page_index, e);
                    log::warn!("Skipping page {}: {}", page_index, error);
                    result.errors.push(PageError { page_index, error });
                    hook.on_progress(page_index, total);
                    return Ok(result);
                },
            };

            let mut located = Vec::new();
            let mut unlocatable = Vec::new();
            let mut forms = BTreeSet::new();
            for span in self.matcher.find_all(&text.text) {
                match locate(&text, &span) {
                    Location::Located { refs, bbox } => {
                        let ls = LocatedSpan {
                            pattern_kind: Some(span.pattern_kind),
                            refs,
                            bbox,
                        };
                        located.push((span, ls));
                    },
                    Location::Unlocatable(reason) => {
                        if let UnlocatableReason::SharedFormXObject { op_index } = reason {
                            forms.insert(op_index);
                        }
                        let bbox = span_bbox(&text, &span);
                        unlocatable.push((span, reason, bbox));
                    },
                }
            }

            // Glyphs of an ActualText span already selected whole need no second pass.
            let selected: BTreeSet<usize> = located
                .iter()
                .flat_map(|(_, ls): &(MatchSpan, LocatedSpan)| ls.refs.iter())
                .filter(|r| r.target == OperatorTarget::ActualText)
                .map(|r| r.op_index)
                .collect();
            for marked in &text.marked {
                if marked.source == MarkedSource::Glyphs && marked.form_op.is_none() && selected.contains(&marked.marker)
                {
                    continue;
                }
                for span in self.matcher.find_all(&marked.text) {
                    match locate_marked(marked, &span) {
                        Location::Located { refs, bbox } => {
                            let ls = LocatedSpan {
                                pattern_kind: Some(span.pattern_kind),
                                refs,
                                bbox,
                            };
                            located.push((span, ls));
                        },
                        Location::Unlocatable(reason) => {
                            if let UnlocatableReason::SharedFormXObject { op_index } = reason {
                                forms.insert(op_index);
                            }
                            unlocatable.push((span, reason, marked.bbox));
                        },
                    }
                }
            }

            if self.config.inline_form_xobjects
                && !forms.is_empty()
                && rounds < MAX_FORM_DEPTH
                && inline_forms(page, &forms) > 0
            {
                rounds += 1;
                continue;
            }
            break (text, located, unlocatable);
        };

        for (span, reason, bbox) in unlocatable {
            let error = Error::UnlocatableSpan {
                page_index,
                kind: span.pattern_kind,
                reason: reason.to_string(),
            };
            if self.config.unlocatable == UnlocatablePolicy::FailFast {
                return Err(error);
            }
            log::warn!("{}", error);
            result.records.push(RedactionRecord::unresolved(
                Some(page_index),
                Carrier::Content,
                Some(span.pattern_kind),
                bbox,
                reason.to_string(),
            ));
            result.errors.push(PageError { page_index, error });
        }

        let (spans, located): (Vec<MatchSpan>, Vec<LocatedSpan>) = located.into_iter().unzip();
        result
            .records
            .extend(StructuralRedactor::apply(page, page_index, &text, &located)?);
        result.removed.extend(spans);

        if !located.is_empty() {
            log::debug!("Removed {} matches from page {}", located.len(), page_index);
        }
        hook.on_progress(page_index, total);
        Ok(result)
    }

    /// Remove every glyph and image drawn inside `area` on one page.
    ///
    /// Text or images drawn by a form XObject are inlined first when
    /// `inline_form_xobjects` is enabled; otherwise they stay, are recorded
    /// as unresolved and fail the area verification.
    pub fn redact_area(&self, document: &Document, page_index: usize, area: Rect) -> Result<RedactionOutcome> {
        let _guard = document.begin_operation()?;
        document.authorize(Action::Modify)?;
        document.page(page_index)?;

        let mut output = document.clone();
        let page = &mut output.pages_mut()[page_index];

        let mut rounds = 0;
        let (text, plan) = loop {
            let text = extract_page_text(page, page_index).map_err(|e| page_local(page_index, e))?;
            let plan = area::plan_area(page, &text, &area);
            if self.config.inline_form_xobjects && !plan.blocked_forms.is_empty() && rounds < MAX_FORM_DEPTH {
                let ops: BTreeSet<usize> = plan.blocked_forms.keys().copied().collect();
                if inline_forms(page, &ops) > 0 {
                    rounds += 1;
                    continue;
                }
            }
            break (text, plan);
        };

        apply::execute(page, &text, &plan.edits)?;

        let mut audit = AuditLog::new();
        if let Some(bbox) = plan.glyph_bbox {
            audit.append([RedactionRecord::removed(Some(page_index), Carrier::Content, None, Some(bbox))]);
        }
        audit.append(
            plan.images
                .iter()
                .map(|p| RedactionRecord::removed(Some(page_index), Carrier::Image, None, Some(p.bbox))),
        );
        for (&op_index, bbox) in &plan.blocked_forms {
            let reason = UnlocatableReason::SharedFormXObject { op_index };
            log::warn!("Page {}: {} left inside the area", page_index, reason);
            audit.append([RedactionRecord::unresolved(
                Some(page_index),
                Carrier::Content,
                None,
                Some(*bbox),
                reason.to_string(),
            )]);
        }

        let mut verification = verify_area(page, page_index, &area);
        if let Verification::Failed(report) = &mut verification {
            report.unresolved = audit.unresolved().cloned().collect();
        }
        verification.into_result()?;

        log::info!("Cleared area on page {}: {} records", page_index, audit.len());
        Ok(RedactionOutcome {
            document: output,
            audit,
            term_counts: BTreeMap::new(),
        })
    }
}

/// Wrap an extraction failure as a page-local pattern error.
fn page_local(page_index: usize, error: Error) -> Error {
    if error.is_page_local() {
        error
    } else {
        Error::Pattern {
            page_index,
            reason: error.to_string(),
        }
    }
}

fn span_bbox(text: &PageText, span: &MatchSpan) -> Option<Rect> {
    text.chars_in(span.start_offset, span.end_offset)
        .iter()
        .filter(|c| !matches!(c.source, CharSource::Synthetic))
        .map(|c| c.bbox)
        .reduce(|a, b| a.union(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FormXObject, ImageXObject, Resources, XObject};
    use crate::fonts::Font;
    use crate::patterns::PatternKind;

    fn resources() -> Resources {
        Resources::new().with_font("F1", Font::simple("Helvetica"))
    }

    fn form_document() -> Document {
        let form = FormXObject::from_content(b"BT /F1 12 Tf (PAN ABCDE1234F) Tj ET", resources()).unwrap();
        let page = Page::from_content(b"q /Fm0 Do Q", resources().with_xobject("Fm0", XObject::Form(form))).unwrap();
        Document::builder().page(page).build()
    }

    fn pan_config() -> SanitizerConfig {
        SanitizerConfig::baseline([PatternKind::Pan])
    }

    #[test]
    fn test_form_text_fails_fast() {
        let redactor = Redactor::new(pan_config()).unwrap();
        assert!(matches!(
            redactor.redact(&form_document(), &NoProgress),
            Err(Error::UnlocatableSpan {
                page_index: 0,
                kind: PatternKind::Pan,
                ..
            })
        ));
    }

    #[test]
    fn test_collected_unlocatable_fails_verification() {
        let redactor = Redactor::new(pan_config().with_unlocatable(UnlocatablePolicy::Collect)).unwrap();
        match redactor.redact(&form_document(), &NoProgress) {
            Err(Error::VerificationFailure(report)) => {
                assert_eq!(report.page_errors.len(), 1);
                assert_eq!(report.survivors.len(), 1);
                assert_eq!(report.unresolved.len(), 1);
                assert!(!report.unresolved[0].is_removed());
            },
            other => panic!("unexpected {:?}", other.map(|o| o.audit)),
        }
    }

    #[test]
    fn test_form_inlined_and_redacted() {
        let redactor = Redactor::new(pan_config().with_inline_form_xobjects(true)).unwrap();
        let doc = form_document();
        let outcome = redactor.redact(&doc, &NoProgress).unwrap();

        let page = &outcome.document.pages()[0];
        assert!(page.resources.xobjects.is_empty());
        assert_eq!(outcome.document.copy_text(0).unwrap(), "PAN ");
        assert_eq!(outcome.audit.len(), 1);
        // The input still paints the form.
        assert_eq!(doc.pages()[0].resources.xobjects.len(), 1);
    }

    #[test]
    fn test_nested_forms_inlined() {
        let inner = FormXObject::from_content(b"BT /F1 12 Tf (ABCDE1234F) Tj ET", resources()).unwrap();
        let outer = FormXObject::from_content(b"/Inner Do", resources().with_xobject("Inner", XObject::Form(inner))).unwrap();
        let page = Page::from_content(b"/Fm0 Do", resources().with_xobject("Fm0", XObject::Form(outer))).unwrap();
        let doc = Document::builder().page(page).build();

        let redactor = Redactor::new(pan_config().with_inline_form_xobjects(true)).unwrap();
        let outcome = redactor.redact(&doc, &NoProgress).unwrap();
        assert_eq!(outcome.audit.len(), 1);
        assert!(outcome.document.pages()[0].resources.xobjects.is_empty());
    }

    #[test]
    fn test_unreadable_page_is_collected() {
        let page = Page::from_content(b"BT /F9 12 Tf (ABCDE1234F) Tj ET", resources()).unwrap();
        let doc = Document::builder().page(page).build();
        let redactor = Redactor::new(pan_config()).unwrap();
        match redactor.redact(&doc, &NoProgress) {
            Err(Error::VerificationFailure(report)) => {
                assert!(matches!(
                    report.page_errors[0].error,
                    Error::Pattern { page_index: 0, .. }
                ));
                assert_eq!(report.unverifiable.len(), 1);
            },
            other => panic!("unexpected {:?}", other.map(|o| o.audit)),
        }
    }

    fn image_page() -> Page {
        let image = XObject::Image(ImageXObject {
            width: 1,
            height: 1,
            data: vec![0xff],
        });
        Page::from_content(
            b"BT /F1 10 Tf 100 700 Td (Account 1234) Tj ET q 50 0 0 50 300 300 cm /Im0 Do Q",
            resources().with_xobject("Im0", image),
        )
        .unwrap()
    }

    #[test]
    fn test_area_removes_glyphs() {
        let doc = Document::builder().page(image_page()).build();
        let redactor = Redactor::new(pan_config()).unwrap();

        // "Account " spans 100..140; the digits 140..160
        let outcome = redactor
            .redact_area(&doc, 0, Rect::new(141.0, 695.0, 30.0, 10.0))
            .unwrap();
        assert_eq!(outcome.document.copy_text(0).unwrap(), "Account ");
        assert_eq!(outcome.audit.len(), 1);
        assert_eq!(outcome.audit.records()[0].carrier, Carrier::Content);
        assert!(outcome.document.pages()[0].resources.xobjects.contains_key("Im0"));
    }

    #[test]
    fn test_area_removes_image() {
        let doc = Document::builder().page(image_page()).build();
        let redactor = Redactor::new(pan_config()).unwrap();
        let outcome = redactor
            .redact_area(&doc, 0, Rect::new(320.0, 320.0, 5.0, 5.0))
            .unwrap();
        let page = &outcome.document.pages()[0];
        assert!(page.resources.xobjects.is_empty());
        assert!(!page.operators.iter().any(|op| matches!(op, crate::content::Operator::Do { .. })));
        assert_eq!(outcome.audit.records()[0].carrier, Carrier::Image);
    }

    #[test]
    fn test_area_in_form_needs_inlining() {
        let redactor = Redactor::new(pan_config()).unwrap();
        let area = Rect::new(0.0, -5.0, 200.0, 20.0);
        match redactor.redact_area(&form_document(), 0, area) {
            Err(Error::VerificationFailure(report)) => {
                assert!(!report.area_survivors.is_empty());
                assert_eq!(report.unresolved.len(), 1);
            },
            other => panic!("unexpected {:?}", other.map(|o| o.audit)),
        }

        let redactor = Redactor::new(pan_config().with_inline_form_xobjects(true)).unwrap();
        let outcome = redactor.redact_area(&form_document(), 0, area).unwrap();
        assert_eq!(outcome.document.copy_text(0).unwrap(), "");
    }

    #[test]
    fn test_area_page_out_of_range() {
        let redactor = Redactor::new(pan_config()).unwrap();
        let doc = Document::builder().build();
        assert!(matches!(
            redactor.redact_area(&doc, 2, Rect::new(0.0, 0.0, 1.0, 1.0)),
            Err(Error::PageOutOfRange { index: 2, count: 0 })
        ));
    }
}
