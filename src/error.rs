//! Error types for the sanitization engine.
//!
//! This module defines every error that can surface from redaction,
//! verification and access control. Page-local failures are wrapped in
//! [`PageError`] and collected; document-level integrity violations are
//! returned directly as hard failures.

use crate::patterns::PatternKind;

/// Result type alias for sanitizer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during sanitization and protection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Page text could not be extracted for pattern matching
    #[error("Unreadable text on page {page_index}: {reason}")]
    Pattern {
        /// Page whose text could not be read
        page_index: usize,
        /// What made the text unreadable
        reason: String,
    },

    /// A match could not be mapped back to removable content operators
    #[error("Unlocatable {kind} match on page {page_index}: {reason}")]
    UnlocatableSpan {
        /// Page holding the match
        page_index: usize,
        /// Recognizer that produced the match
        kind: PatternKind,
        /// Why the match could not be located
        reason: String,
    },

    /// Identifiers survived redaction; the output must be discarded
    #[error("Verification failed: {0}")]
    VerificationFailure(Box<crate::redaction::VerificationReport>),

    /// Neither the owner nor the user password matched
    #[error("Authentication failed: password does not match")]
    Authentication,

    /// The unlocked document's permission bitmask forbids the action
    #[error("Permission denied: {0} is not allowed")]
    PermissionDenied(crate::encryption::Action),

    /// The document already carries an access-control descriptor
    #[error("Document is already protected; unlock it with the owner password first")]
    AlreadyProtected,

    /// Another top-level operation holds this document
    #[error("Document is busy with another operation")]
    Busy,

    /// The caller requested cancellation through the progress hook
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration rejected before any work started
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid document structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse content at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Page index outside the document
    #[error("Page index {index} out of range (document has {count} pages)")]
    PageOutOfRange {
        /// Requested index
        index: usize,
        /// Number of pages in the document
        count: usize,
    },

    /// Form XObjects nested deeper than the extractor allows
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// Cipher failure (bad key length, corrupt ciphertext)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Sealed payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is confined to one page and may be collected.
    pub fn is_page_local(&self) -> bool {
        matches!(self, Error::Pattern { .. } | Error::UnlocatableSpan { .. })
    }
}

/// A page-local error collected during a multi-page run.
#[derive(Debug)]
pub struct PageError {
    /// Page the error belongs to
    pub page_index: usize,
    /// The collected error
    pub error: Error,
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {}: {}", self.page_index, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_error() {
        let err = Error::Pattern {
            page_index: 3,
            reason: "font /F9 not found".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("page 3"));
        assert!(msg.contains("/F9"));
        assert!(err.is_page_local());
    }

    #[test]
    fn test_unlocatable_error() {
        let err = Error::UnlocatableSpan {
            page_index: 0,
            kind: PatternKind::Pan,
            reason: "text drawn by a shared form XObject".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("PAN"));
        assert!(msg.contains("form XObject"));
        assert!(err.is_page_local());
    }

    #[test]
    fn test_permission_denied_error() {
        let err = Error::PermissionDenied(crate::encryption::Action::Copy);
        assert!(format!("{}", err).contains("copy"));
        assert!(!err.is_page_local());
    }

    #[test]
    fn test_page_out_of_range_error() {
        let err = Error::PageOutOfRange { index: 5, count: 2 };
        let msg = format!("{}", err);
        assert!(msg.contains('5'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(format!("{}", err).contains("IO error"));
    }

    #[test]
    fn test_page_error_display() {
        let err = PageError {
            page_index: 7,
            error: Error::Cancelled,
        };
        assert_eq!(format!("{}", err), "page 7: Operation cancelled");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
