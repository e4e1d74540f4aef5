use super::{
    CAPACITY_OVERHEAD_FACTOR, CompactionReport, HashMap, HistoryAccess, Store, compact_map,
    sealed, with_entry,
};
use crate::core::history::KeyHistory;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: usize = 1000;

/// Single-lock store
///
/// One mutex guards the whole key space. Every operation, on any key, is
/// serialized. Simple and predictable; best for modest call rates or when
/// compaction must observe the entire store at one instant.
///
/// # Example
///
/// ```
/// use slidewin::{LockedStore, SlidingWindowLimiter, WindowConfig};
///
/// let config = WindowConfig::builder().build().unwrap();
/// let limiter = SlidingWindowLimiter::with_store(config, LockedStore::with_capacity(10_000));
/// ```
pub struct LockedStore {
    data: Mutex<HashMap<String, KeyHistory>>,
}

impl LockedStore {
    /// Create a new LockedStore with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new LockedStore sized for `capacity` keys
    ///
    /// The store will allocate 30% more space to reduce hash collisions.
    pub fn with_capacity(capacity: usize) -> Self {
        LockedStore {
            data: Mutex::new(HashMap::with_capacity(
                (capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
            )),
        }
    }
}

impl Default for LockedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl sealed::Sealed for LockedStore {}

impl Store for LockedStore {
    fn with_history<R, F>(&self, _access: HistoryAccess, key: &str, f: F) -> R
    where
        F: FnOnce(&mut KeyHistory) -> R,
    {
        let mut data = self.data.lock();
        with_entry(&mut data, key, f)
    }

    fn compact(&self, _access: HistoryAccess, now: Instant, window: Duration) -> CompactionReport {
        let mut data = self.data.lock();
        compact_map(&mut data, now, window)
    }

    fn len(&self) -> usize {
        self.data.lock().len()
    }

    fn contains(&self, key: &str) -> bool {
        self.data
            .lock()
            .get(key)
            .is_some_and(|history| !history.is_empty())
    }
}
