//! Cooperative cancellation.
//!
//! A [`CancelFlag`] is shared between the caller (for example a Ctrl-C
//! handler) and a session. Long-running loops check it between attempts and
//! between chunks and stop with [`Error::Interrupted`](crate::Error::Interrupted).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns whether it was already requested.
    pub fn cancel(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());

        assert!(!handle.cancel());
        assert!(flag.is_cancelled());
        assert!(flag.cancel());
    }

    #[test]
    fn test_independent_flags() {
        let a = CancelFlag::new();
        let b = CancelFlag::new();
        a.cancel();
        assert!(!b.is_cancelled());
    }
}
