//! Cancellation and staleness tokens for preview loads
//!
//! Every load request handed to the rendering engine carries a [`LoadToken`].
//! The controller only accepts a completion whose token matches the live
//! session and its current attempt; anything else is a stale callback from a
//! superseded attempt or a closed session and is dropped.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation flag shared between a preview session and its in-flight load
///
/// The rendering engine has no abort API, so cancellation is cooperative: a
/// host running the load on another task can poll `is_cancelled()` and skip
/// reporting. Clones share the same state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancel this token and every clone of it
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

/// Attempt token identifying one Validating entry
///
/// `attempt` is the session's password attempt count at the time the request
/// was issued: 0 for the initial load, then strictly increasing with each
/// submitted password.
#[derive(Debug, Clone)]
pub struct LoadToken {
    pub session: SessionId,
    pub attempt: u32,
    cancel: CancellationToken,
}

impl LoadToken {
    pub(crate) fn new(session: SessionId, attempt: u32) -> Self {
        Self { session, attempt, cancel: CancellationToken::new() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True when `other` was issued for the same session and attempt.
    pub fn matches(&self, other: &LoadToken) -> bool {
        self.session == other.session && self.attempt == other.attempt
    }
}
