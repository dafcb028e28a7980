//! Property tests for matching, redaction and permissions.

use pdf_sanitizer::document::{Page, Resources};
use pdf_sanitizer::encryption::Permissions;
use pdf_sanitizer::fonts::Font;
use pdf_sanitizer::redaction::{verify, NoProgress};
use pdf_sanitizer::{Document, PatternKind, PatternMatcher, Redactor, SanitizerConfig};
use proptest::prelude::*;

fn config() -> SanitizerConfig {
    SanitizerConfig::baseline([PatternKind::Pan, PatternKind::Gstin, PatternKind::Aadhaar])
}

fn document(content: &str) -> Document {
    let resources = Resources::new().with_font("F1", Font::simple("Helvetica"));
    let page = Page::from_content(content.as_bytes(), resources).unwrap();
    Document::builder().page(page).build()
}

fn filler() -> impl Strategy<Value = String> {
    "[a-z]{1,8}( [a-z]{1,8}){0,3}"
}

fn pan() -> impl Strategy<Value = String> {
    "[A-Z]{5}[0-9]{4}[A-Z]"
}

fn aadhaar() -> impl Strategy<Value = String> {
    "[2-9][0-9]{3} [0-9]{4} [0-9]{4}"
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_spans_sorted_disjoint_and_exact(text in "[A-Za-z0-9 ]{0,120}") {
        let matcher = PatternMatcher::new(&config()).unwrap();
        let spans = matcher.find_all(&text);
        for pair in spans.windows(2) {
            prop_assert!(pair[0].end_offset <= pair[1].start_offset);
        }
        for span in &spans {
            prop_assert_eq!(&text[span.start_offset..span.end_offset], span.matched_text.as_str());
        }
    }

    #[test]
    fn prop_arbitrary_text_never_panics(text in "\\PC{0,200}") {
        let matcher = PatternMatcher::new(&config()).unwrap();
        let _ = matcher.find_all(&text);
    }

    #[test]
    fn prop_redaction_removes_and_preserves(
        prefix in filler(),
        id in pan(),
        uid in aadhaar(),
        suffix in filler(),
    ) {
        let line = format!("{} {} {} {}", prefix, id, uid, suffix);
        let doc = document(&format!("BT /F1 11 Tf 50 600 Td ({}) Tj ET", line));
        let redactor = Redactor::new(config()).unwrap();

        let outcome = redactor.redact(&doc, &NoProgress).unwrap();
        prop_assert_eq!(outcome.audit.len(), 2);
        prop_assert!(verify(&outcome.document, redactor.matcher()).is_passed());

        let after = outcome.document.copy_text(0).unwrap();
        prop_assert!(after.starts_with(&prefix));
        prop_assert!(after.ends_with(&suffix));
        prop_assert!(!after.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn prop_split_identifier_removed(id in pan(), split in 1usize..10) {
        let (head, tail) = id.split_at(split);
        let doc = document(&format!("BT /F1 12 Tf (PAN {}) Tj ({} end) Tj ET", head, tail));
        let redactor = Redactor::new(config()).unwrap();

        let outcome = redactor.redact(&doc, &NoProgress).unwrap();
        prop_assert_eq!(outcome.audit.len(), 1);
        let after = outcome.document.copy_text(0).unwrap();
        prop_assert!(after.ends_with(" end"));
        prop_assert!(!redactor.matcher().is_match(&after));
    }

    #[test]
    fn prop_redaction_idempotent(id in pan(), suffix in filler()) {
        let doc = document(&format!("BT /F1 12 Tf [(Holder {}) -300 ({})] TJ ET", id, suffix));
        let redactor = Redactor::new(config()).unwrap();

        let first = redactor.redact(&doc, &NoProgress).unwrap();
        let second = redactor.redact(&first.document, &NoProgress).unwrap();
        prop_assert!(second.audit.is_empty());
        prop_assert_eq!(second.document, first.document);
    }

    #[test]
    fn prop_permission_bitmask_round_trip(print: bool, modify: bool, copy: bool, annotate: bool) {
        let mut perms = Permissions::empty();
        perms.set(Permissions::PRINT, print);
        perms.set(Permissions::MODIFY, modify);
        perms.set(Permissions::COPY, copy);
        perms.set(Permissions::ANNOTATE, annotate);

        let p = perms.to_bitmask();
        prop_assert_eq!(Permissions::from_bitmask(p), perms);
        // Bit 10 (accessibility) is always granted; bits 1-2 are always clear.
        prop_assert!(p & (1 << 9) != 0);
        prop_assert_eq!(p & 0b11, 0);
    }
}
