//! Cooperative progress reporting and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callbacks invoked between pages of a redaction run.
///
/// With parallel processing enabled the hook is called from rayon worker
/// threads, in completion order rather than page order.
pub trait ProgressHook: Send + Sync {
    /// A page finished processing.
    fn on_progress(&self, _page_index: usize, _total_pages: usize) {}

    /// Checked before each page; returning `true` aborts with [`crate::Error::Cancelled`].
    fn should_cancel(&self) -> bool {
        false
    }
}

/// A hook that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressHook for NoProgress {}

/// Shareable cancellation flag.
///
/// ```
/// use pdf_sanitizer::redaction::{CancellationToken, ProgressHook};
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// assert!(!token.should_cancel());
/// handle.cancel();
/// assert!(token.should_cancel());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl ProgressHook for CancellationToken {
    fn should_cancel(&self) -> bool {
        self.is_cancelled()
    }
}
