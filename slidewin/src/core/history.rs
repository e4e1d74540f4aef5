//! Per-key admission history
//!
//! A [`KeyHistory`] records the instants at which a key was admitted. Stamps
//! are kept in non-decreasing order, so everything that has left the window
//! is always a prefix and pruning is a binary search plus a front drain.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

// Buffers at or below this capacity are never shrunk.
const SHRINK_FLOOR: usize = 16;

/// Ordered admission stamps for a single key
///
/// Read-only outside this crate; stamps are only added by an admission.
///
/// ```compile_fail
/// use slidewin::KeyHistory;
/// use std::time::Instant;
///
/// let mut history = KeyHistory::new();
/// history.record(Instant::now());
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyHistory {
    stamps: VecDeque<Instant>,
}

impl KeyHistory {
    /// Create an empty history
    pub fn new() -> Self {
        KeyHistory {
            stamps: VecDeque::new(),
        }
    }

    /// Number of stamps currently held
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether the history holds no stamps
    ///
    /// An empty history is indistinguishable from a key that was never seen.
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Most recent stamp
    pub fn newest(&self) -> Option<Instant> {
        self.stamps.back().copied()
    }

    /// Iterate stamps from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = Instant> + '_ {
        self.stamps.iter().copied()
    }

    /// Drop every stamp `t` with `t <= now - window`
    ///
    /// Keeps exactly the half-open interval `(now - window, now]`. A stamp
    /// sitting on the boundary has aged a full window and is expired.
    /// If `now - window` precedes the clock's origin nothing can be expired.
    ///
    /// Returns the number of stamps removed.
    pub(crate) fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let Some(cutoff) = now.checked_sub(window) else {
            return 0;
        };

        let expired = self.stamps.partition_point(|&stamp| stamp <= cutoff);
        if expired > 0 {
            self.stamps.drain(..expired);
            self.maybe_shrink();
        }
        expired
    }

    /// Append an admission stamp
    ///
    /// A `now` older than the newest stamp is recorded as the newest stamp,
    /// which keeps the buffer ordered when callers capture time before
    /// contending for the same key.
    pub(crate) fn record(&mut self, now: Instant) {
        let stamp = match self.stamps.back() {
            Some(&newest) if newest > now => newest,
            _ => now,
        };
        self.stamps.push_back(stamp);
    }

    /// Oldest of the `n` most recent stamps
    ///
    /// This is the stamp whose expiry frees a slot when the key holds
    /// exactly `n` stamps. `None` when `n` is zero or fewer than `n` stamps
    /// are held.
    pub fn earliest_of_last(&self, n: usize) -> Option<Instant> {
        if n == 0 || self.stamps.len() < n {
            return None;
        }
        self.stamps.get(self.stamps.len() - n).copied()
    }

    fn maybe_shrink(&mut self) {
        let capacity = self.stamps.capacity();
        if capacity > SHRINK_FLOOR && self.stamps.len() * 4 < capacity {
            self.stamps
                .shrink_to((self.stamps.len() * 2).max(SHRINK_FLOOR));
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.stamps.capacity()
    }
}
