//! SessionState entity - process-local "inside a sync session" flag.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether the bound engine is inside a `sync_session` body, so
/// per-operation auto-pull/auto-push can be suppressed while a session is
/// coalescing them into one pull-at-entry + one push-at-exit.
///
/// Shared across every thread using the same engine instance: the Process
/// Lock already serialises session bodies within the process, so one
/// atomic flag is enough to suppress auto-sync for whichever session is
/// currently running.
#[derive(Debug, Default)]
pub struct SessionState {
    active: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn enter(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Clear the flag unconditionally. Called on every exit path from the
    /// session body, including when the body or the exit push fails.
    pub fn exit(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
