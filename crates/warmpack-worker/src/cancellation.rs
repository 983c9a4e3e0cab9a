//! Last-request-wins cancellation
//!
//! Every build is stamped on arrival. A newer stamp makes every older token
//! stale; a stale build may still compile, but its result is reported as
//! cancelled instead of success.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Issues request timestamps and remembers the latest one
#[derive(Debug, Clone, Default)]
pub struct CancellationGuard {
    latest: Arc<AtomicU64>,
}

impl CancellationGuard {
    /// Create a guard with no requests recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request and return its token.
    ///
    /// Timestamps are wall-clock milliseconds, bumped past the previous
    /// stamp when two requests land in the same millisecond.
    pub fn stamp(&self) -> CancellationToken {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .latest
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);

        CancellationToken {
            timestamp: now.max(previous + 1),
            latest: self.latest.clone(),
        }
    }

    /// Timestamp of the most recent request, 0 before the first one
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

/// A build's view of the guard: its own timestamp plus the shared latest
#[derive(Debug, Clone)]
pub struct CancellationToken {
    timestamp: u64,
    latest: Arc<AtomicU64>,
}

impl CancellationToken {
    /// Timestamp captured when the request arrived
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// True once a newer request has been stamped
    pub fn is_stale(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_is_current() {
        let guard = CancellationGuard::new();
        assert_eq!(guard.latest(), 0);

        let token = guard.stamp();
        assert!(!token.is_stale());
        assert_eq!(guard.latest(), token.timestamp());
    }

    #[test]
    fn test_new_stamp_supersedes_old_tokens() {
        let guard = CancellationGuard::new();
        let first = guard.stamp();
        let second = guard.stamp();
        let third = guard.stamp();

        assert!(first.is_stale());
        assert!(second.is_stale());
        assert!(!third.is_stale());
        assert!(first.timestamp() < second.timestamp());
        assert!(second.timestamp() < third.timestamp());
    }

    #[test]
    fn test_clones_share_latest() {
        let guard = CancellationGuard::new();
        let token = guard.stamp();

        guard.clone().stamp();
        assert!(token.is_stale());
        assert!(token.clone().is_stale());
    }
}
