//! Cooperative cancellation shared across one running cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Abort flag checked between steps of long-running work.
///
/// Cancellation is honored only at step boundaries; a provisioning
/// transaction that observes the flag mid-flight still runs its
/// compensating rollback before returning.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
