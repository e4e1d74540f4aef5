//! Sliding-window admission
//!
//! This module provides [`SlidingWindowLimiter`], which decides per key
//! whether a request fits under "at most `limit` events in any trailing
//! `window`". Every operation prunes the key's history against its own
//! `now` before looking at it, so results never depend on the compactor
//! having run.

use super::config::WindowConfig;
use super::history::KeyHistory;
use super::store::{CompactionReport, HistoryAccess, ShardedStore, Store};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Result of an admission check
///
/// All fields are computed under the same exclusive access as the decision
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// The configured limit
    pub limit: usize,
    /// Admissions still available in the current window after this decision
    pub remaining: usize,
    /// Time until the next admission can succeed (zero if one can now)
    pub retry_after: Duration,
}

/// Per-key sliding-window limiter
///
/// Safe to share across threads; wrap in an [`Arc`](std::sync::Arc) to do
/// so. Use [`Limiter`](crate::Limiter) to get one with a background
/// compactor attached.
///
/// # Example
///
/// ```
/// use slidewin::{SlidingWindowLimiter, WindowConfig};
/// use std::time::{Duration, Instant};
///
/// let config = WindowConfig::new(2, Duration::from_secs(1), Duration::from_secs(5)).unwrap();
/// let limiter = SlidingWindowLimiter::new(config);
///
/// let now = Instant::now();
/// assert!(limiter.allow("user:1", now));
/// assert!(limiter.allow("user:1", now));
/// assert!(!limiter.allow("user:1", now));
/// assert_eq!(limiter.retry_after("user:1", now), Duration::from_secs(1));
/// ```
pub struct SlidingWindowLimiter<S: Store = ShardedStore> {
    config: WindowConfig,
    store: S,
    sweeps: AtomicU64,
}

impl SlidingWindowLimiter<ShardedStore> {
    /// Create a limiter backed by a default [`ShardedStore`]
    pub fn new(config: WindowConfig) -> Self {
        Self::with_store(config, ShardedStore::new())
    }
}

impl<S: Store> SlidingWindowLimiter<S> {
    /// Create a limiter backed by the given store
    pub fn with_store(config: WindowConfig, store: S) -> Self {
        SlidingWindowLimiter {
            config,
            store,
            sweeps: AtomicU64::new(0),
        }
    }

    /// The limiter's configuration
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Admit or deny one request for `key` at `now`
    ///
    /// Admitted requests are recorded; denied requests leave no trace and do
    /// not count against future quota. With a limit of zero nothing is ever
    /// admitted.
    pub fn allow(&self, key: &str, now: Instant) -> bool {
        self.check(key, now).allowed
    }

    /// Admit or deny one request and report the resulting quota state
    pub fn check(&self, key: &str, now: Instant) -> Decision {
        let limit = self.config.limit();
        let window = self.config.window();

        let decision = self.store.with_history(HistoryAccess::new(), key, |history| {
            history.prune(now, window);

            let allowed = history.len() < limit;
            if allowed {
                history.record(now);
            }

            Decision {
                allowed,
                limit,
                remaining: limit.saturating_sub(history.len()),
                retry_after: self.retry_delay(history, now),
            }
        });

        trace!(
            key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "admission decision"
        );
        decision
    }

    /// Admissions still available for `key` at `now`
    ///
    /// Never records anything. If this returns a positive value, an
    /// immediately following [`allow`](Self::allow) with the same `now`
    /// admits, barring a concurrent admission for the same key.
    pub fn remaining_quota(&self, key: &str, now: Instant) -> usize {
        let limit = self.config.limit();
        let window = self.config.window();

        self.store.with_history(HistoryAccess::new(), key, |history| {
            history.prune(now, window);
            limit.saturating_sub(history.len())
        })
    }

    /// How long until `key` can be admitted again
    ///
    /// Zero when the key is under quota. Otherwise the time until the oldest
    /// of the `limit` most recent stamps leaves the window; an
    /// [`allow`](Self::allow) at `now + retry_after` then admits.
    ///
    /// With a limit of zero no admission is ever possible and
    /// [`Duration::MAX`] is returned. `now + Duration::MAX` overflows and
    /// panics, so compare against it or use [`Instant::checked_add`] before
    /// scheduling a retry:
    ///
    /// ```
    /// use slidewin::{SlidingWindowLimiter, WindowConfig};
    /// use std::time::{Duration, Instant};
    ///
    /// let config = WindowConfig::new(0, Duration::from_secs(1), Duration::from_secs(1)).unwrap();
    /// let limiter = SlidingWindowLimiter::new(config);
    ///
    /// let now = Instant::now();
    /// let delay = limiter.retry_after("anyone", now);
    /// assert_eq!(delay, Duration::MAX);
    /// assert!(now.checked_add(delay).is_none());
    /// ```
    pub fn retry_after(&self, key: &str, now: Instant) -> Duration {
        let window = self.config.window();

        self.store.with_history(HistoryAccess::new(), key, |history| {
            history.prune(now, window);
            self.retry_delay(history, now)
        })
    }

    /// Prune every key against `now` and evict keys left empty
    ///
    /// This is what the background compactor runs on each tick. It never
    /// admits or denies anything.
    pub fn compact(&self, now: Instant) -> CompactionReport {
        let mut report = self.store
            .compact(HistoryAccess::new(), now, self.config.window());
        report.sweep = self.sweeps.fetch_add(1, Ordering::Relaxed) + 1;
        report
    }

    /// Number of keys currently held by the store
    ///
    /// Includes keys whose history in-line pruning has emptied but the
    /// compactor has not removed yet, so this can exceed the number of keys
    /// for which [`is_tracked`](Self::is_tracked) is true.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Whether `key` currently has any recorded admissions
    pub fn is_tracked(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    #[cfg(test)]
    pub(crate) fn stamps(&self, key: &str) -> Vec<Instant> {
        self.store
            .with_history(HistoryAccess::new(), key, |history| history.iter().collect())
    }

    // Expects a history already pruned against `now`
    fn retry_delay(&self, history: &KeyHistory, now: Instant) -> Duration {
        let limit = self.config.limit();
        if history.len() < limit {
            return Duration::ZERO;
        }

        match history.earliest_of_last(limit) {
            Some(earliest) => earliest
                .checked_add(self.config.window())
                .map_or(Duration::MAX, |frees_at| {
                    frees_at.saturating_duration_since(now)
                }),
            None => Duration::MAX,
        }
    }
}
