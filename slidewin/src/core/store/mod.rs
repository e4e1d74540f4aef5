use super::history::KeyHistory;
use std::time::{Duration, Instant};

#[cfg(feature = "ahash")]
pub(crate) use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
pub(crate) use std::collections::HashMap;


mod locked;
mod sharded;

pub use locked::LockedStore;
pub use sharded::{ShardedStore, ShardedStoreBuilder};

// Pre-allocate this much extra space to avoid rehashing near capacity
pub(crate) const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;

mod sealed {
    pub trait Sealed {}
}

/// Capability to reach a store's histories
///
/// Only this crate can create one, so histories change exclusively through
/// the limiter's own admission and compaction paths.
///
/// ```compile_fail
/// use slidewin::store::{HistoryAccess, LockedStore, Store};
///
/// let store = LockedStore::new();
/// store.with_history(HistoryAccess(()), "k", |history| history.len());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HistoryAccess(());

impl HistoryAccess {
    pub(crate) const fn new() -> Self {
        HistoryAccess(())
    }
}

/// Storage for per-key admission histories
///
/// Implementations guarantee that the closure passed to
/// [`with_history`](Store::with_history) runs with exclusive access to the
/// key's history, so prune, check and append happen as one unit.
///
/// This trait is sealed. Outside the crate a store can be chosen and
/// inspected, but its histories cannot be touched.

pub trait Store: sealed::Sealed + Send + Sync {
    /// Run `f` with exclusive access to the history for `key`
    ///
    /// Missing keys are presented as an empty history. The key is only
    /// inserted into the store if `f` leaves that history non-empty, so
    /// read-only paths never allocate entries for unknown keys.
    ///
    /// `f` must not call back into the store; the key's lock is held.
    fn with_history<R, F>(&self, access: HistoryAccess, key: &str, f: F) -> R
    where
        F: FnOnce(&mut KeyHistory) -> R;

    /// Prune every history against `now` and drop keys left empty
    fn compact(&self, access: HistoryAccess, now: Instant, window: Duration) -> CompactionReport;

    /// Number of keys currently held
    ///
    /// Includes entries emptied by in-line pruning that the compactor has
    /// not removed yet.
    fn len(&self) -> usize;

    /// Whether the store holds no keys
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` has a non-empty history
    fn contains(&self, key: &str) -> bool;
}

/// Outcome of a compaction sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Sequence number of the sweep, starting at 1
    pub sweep: u64,
    /// Keys still holding stamps after the sweep
    pub keys_retained: usize,
    /// Keys removed because their history emptied
    pub keys_evicted: usize,
    /// Stamps dropped across all keys
    pub stamps_pruned: usize,
}

impl CompactionReport {
    pub(crate) fn absorb(&mut self, other: CompactionReport) {
        self.keys_retained += other.keys_retained;
        self.keys_evicted += other.keys_evicted;
        self.stamps_pruned += other.stamps_pruned;
    }
}

/// Shared lookup used by every backend once the owning lock is held
pub(crate) fn with_entry<R, F>(data: &mut HashMap<String, KeyHistory>, key: &str, f: F) -> R
where
    F: FnOnce(&mut KeyHistory) -> R,
{
    if let Some(history) = data.get_mut(key) {
        return f(history);
    }

    let mut history = KeyHistory::new();
    let result = f(&mut history);
    if !history.is_empty() {
        data.insert(key.to_owned(), history);
    }
    result
}

pub(crate) fn compact_map(
    data: &mut HashMap<String, KeyHistory>,
    now: Instant,
    window: Duration,
) -> CompactionReport {
    let mut report = CompactionReport::default();
    data.retain(|_, history| {
        report.stamps_pruned += history.prune(now, window);
        if history.is_empty() {
            report.keys_evicted += 1;
            false
        } else {
            report.keys_retained += 1;
            true
        }
    });
    report
}
