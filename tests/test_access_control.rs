//! Integration tests for password protection.
//!
//! Tests access control including:
//! - User vs owner unlock and the permissions each grants
//! - Enforcement of copy, modify and annotate in the document API
//! - Exclusive use while protecting
//! - Round-trip of content through protect/unlock
//! - Persistence of protected documents

use pdf_sanitizer::document::{Page, Resources};
use pdf_sanitizer::encryption::{protect, unlock, Action, Algorithm, Permissions, ProtectedDocument};
use pdf_sanitizer::fonts::Font;
use pdf_sanitizer::redaction::NoProgress;
use pdf_sanitizer::{Annotation, Document, Error, OutlineItem, PatternKind, Redactor, SanitizerConfig};

/// Helper to build a one-page document with document-level data.
fn sample_document() -> Document {
    let resources = Resources::new().with_font("F1", Font::simple("Helvetica"));
    let page = Page::from_content(b"BT /F1 12 Tf 72 700 Td (Account holder ABCDE1234F) Tj ET", resources).unwrap();
    Document::builder()
        .page(page)
        .metadata("Title", "Statement")
        .outline(OutlineItem::new("Summary").with_page(0))
        .annotation(Annotation::new("Text", 0).with_contents("checked"))
        .xmp("<x:xmpmeta/>")
        .build()
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_user_and_owner_access() {
        let doc = sample_document();
        let protected = protect(&doc, "u1", Some("o1"), Permissions::PRINT).unwrap();

        let (mut as_user, perms) = unlock(&protected, "u1").unwrap();
        assert_eq!(perms, Permissions::PRINT);
        assert!(as_user.authorize(Action::Print).is_ok());
        assert!(matches!(
            as_user.set_metadata("Subject", "edited"),
            Err(Error::PermissionDenied(Action::Modify))
        ));
        assert!(matches!(
            as_user.remove_protection(),
            Err(Error::PermissionDenied(Action::ChangeSecurity))
        ));

        let (mut as_owner, perms) = unlock(&protected, "o1").unwrap();
        assert_eq!(perms, Permissions::all());
        as_owner.set_metadata("Subject", "edited").unwrap();
        as_owner.remove_protection().unwrap();
        assert!(!as_owner.is_protected());
    }

    #[test]
    fn test_owner_unlock_restores_content() {
        let doc = sample_document();
        let protected = protect(&doc, "user", Some("owner"), Permissions::empty()).unwrap();
        let (restored, _) = unlock(&protected, "owner").unwrap();

        assert_eq!(restored.pages(), doc.pages());
        assert_eq!(restored.catalog(), doc.catalog());
    }
}

mod enforcement_tests {
    use super::*;

    #[test]
    fn test_copy_text_follows_copy_permission() {
        let doc = sample_document();

        let denied = protect(&doc, "u", Some("o"), Permissions::PRINT).unwrap();
        let (unlocked, _) = unlock(&denied, "u").unwrap();
        assert!(matches!(unlocked.copy_text(0), Err(Error::PermissionDenied(Action::Copy))));
        assert!(matches!(unlocked.page_text(0), Err(Error::PermissionDenied(Action::Copy))));
        // Pages stay readable for rendering.
        assert!(unlocked.page(0).is_ok());

        let allowed = protect(&doc, "u", Some("o"), Permissions::COPY).unwrap();
        let (unlocked, _) = unlock(&allowed, "u").unwrap();
        assert_eq!(unlocked.copy_text(0).unwrap(), "Account holder ABCDE1234F");
        let text = unlocked.page_text(0).unwrap();
        assert_eq!(text.text, "Account holder ABCDE1234F");
        assert_eq!(text.chars.len(), text.text.chars().count());
        assert!(matches!(unlocked.page_text(1), Err(Error::PageOutOfRange { index: 1, count: 1 })));
    }

    #[test]
    fn test_annotate_permission() {
        let protected = protect(&sample_document(), "u", Some("o"), Permissions::MODIFY).unwrap();
        let (mut unlocked, _) = unlock(&protected, "u").unwrap();
        assert!(matches!(
            unlocked.add_annotation(Annotation::new("Text", 0)),
            Err(Error::PermissionDenied(Action::Annotate))
        ));
        unlocked.set_metadata("Subject", "allowed").unwrap();
    }

    #[test]
    fn test_redact_then_protect() {
        let doc = sample_document();
        let outcome = Redactor::new(SanitizerConfig::baseline([PatternKind::Pan]))
            .unwrap()
            .redact(&doc, &NoProgress)
            .unwrap();
        let protected = protect(&outcome.document, "u", Some("o"), Permissions::COPY).unwrap();
        let (unlocked, _) = unlock(&protected, "u").unwrap();
        assert_eq!(unlocked.copy_text(0).unwrap(), "Account holder ");
    }
}

mod exclusive_use_tests {
    use super::*;

    #[test]
    fn test_protect_waits_for_running_operation() {
        let doc = sample_document();
        {
            let _guard = doc.begin_operation().unwrap();
            assert!(matches!(
                protect(&doc, "u", Some("o"), Permissions::all()),
                Err(Error::Busy)
            ));
        }
        assert!(protect(&doc, "u", Some("o"), Permissions::all()).is_ok());
    }

    #[test]
    fn test_reissue_waits_for_running_operation() {
        let protected = protect(&sample_document(), "u", Some("o"), Permissions::all()).unwrap();
        let (owner, _) = unlock(&protected, "o").unwrap();
        {
            let _guard = owner.begin_operation().unwrap();
            assert!(matches!(
                owner.reissue_protection("u2", Some("o2"), Permissions::COPY),
                Err(Error::Busy)
            ));
        }
        let reissued = owner.reissue_protection("u2", Some("o2"), Permissions::COPY).unwrap();
        assert_eq!(unlock(&reissued, "u2").unwrap().1, Permissions::COPY);
    }

    #[test]
    fn test_guard_released_after_protect() {
        let doc = sample_document();
        protect(&doc, "u", Some("o"), Permissions::PRINT).unwrap();
        assert!(doc.begin_operation().is_ok());
    }
}

mod credential_tests {
    use super::*;

    #[test]
    fn test_wrong_password() {
        let protected = protect(&sample_document(), "u", Some("o"), Permissions::all()).unwrap();
        assert!(matches!(unlock(&protected, "nope"), Err(Error::Authentication)));
        assert!(matches!(unlock(&protected, ""), Err(Error::Authentication)));
    }

    #[test]
    fn test_equal_passwords_rejected() {
        assert!(matches!(
            protect(&sample_document(), "same", Some("same"), Permissions::all()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_generated_owner_password() {
        let protected = protect(&sample_document(), "u", None, Permissions::PRINT).unwrap();
        let (_, perms) = unlock(&protected, "u").unwrap();
        assert_eq!(perms, Permissions::PRINT);
    }

    #[test]
    fn test_already_protected() {
        let protected = protect(&sample_document(), "u", Some("o"), Permissions::all()).unwrap();
        let (unlocked, _) = unlock(&protected, "o").unwrap();
        assert!(matches!(
            protect(&unlocked, "u2", Some("o2"), Permissions::all()),
            Err(Error::AlreadyProtected)
        ));

        let reissued = unlocked.reissue_protection("u2", Some("o2"), Permissions::COPY).unwrap();
        assert!(matches!(unlock(&reissued, "u"), Err(Error::Authentication)));
        assert_eq!(unlock(&reissued, "u2").unwrap().1, Permissions::COPY);
    }

    #[test]
    fn test_passwords_are_normalized() {
        // U+212B ANGSTROM SIGN and U+00C5 normalize to the same NFKC form.
        let protected = protect(&sample_document(), "\u{212B}ngstr\u{00F6}m", Some("o"), Permissions::all()).unwrap();
        assert!(unlock(&protected, "\u{00C5}ngstr\u{00F6}m").is_ok());
    }
}

mod persistence_tests {
    use super::*;

    #[test]
    fn test_security_info_without_password() {
        let protected = protect(&sample_document(), "u", Some("o"), Permissions::PRINT | Permissions::COPY).unwrap();
        let info = protected.security_info();
        assert_eq!(info.algorithm, Algorithm::Aes256);
        assert_eq!(info.revision, 6);
        assert_eq!(info.key_length_bits, 256);
        assert!(info.permissions.can_print());
        assert!(info.permissions.can_copy());
        assert!(!info.permissions.can_modify());
        assert!(!info.permissions.can_annotate());
        assert!(!info.permissions.can_fill_forms());
        assert!(info.permissions.can_extract_accessibility());
    }

    #[test]
    fn test_serialized_document_unlocks() {
        let protected = protect(&sample_document(), "u", Some("o"), Permissions::COPY).unwrap();
        let json = serde_json::to_string(&protected).unwrap();
        assert!(!json.contains("ABCDE1234F"));
        assert!(!json.contains("Statement"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protected.json");
        std::fs::write(&path, &json).unwrap();
        let loaded: ProtectedDocument = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(loaded.page_count(), 1);
        let (doc, _) = unlock(&loaded, "u").unwrap();
        assert_eq!(doc.metadata().get("Title").map(String::as_str), Some("Statement"));
    }
}
