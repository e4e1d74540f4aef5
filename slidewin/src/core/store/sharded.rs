use super::{
    CAPACITY_OVERHEAD_FACTOR, CompactionReport, HashMap, HistoryAccess, Store, compact_map,
    sealed, with_entry,
};
use crate::core::history::KeyHistory;
use parking_lot::Mutex;
use std::hash::BuildHasher;
use std::time::{Duration, Instant};

#[cfg(feature = "ahash")]
use ahash::RandomState;
#[cfg(not(feature = "ahash"))]
use std::collections::hash_map::RandomState;

const DEFAULT_CAPACITY: usize = 1000;
const SHARDS_PER_CPU: usize = 4;

/// Lock-striped store for concurrent callers
///
/// Keys are partitioned across independently locked shards, so callers on
/// different keys rarely contend. Operations on one key still hold that
/// key's shard lock for their whole duration. Compaction locks one shard at
/// a time; each key it touches is pruned in full before the shard is
/// released.
///
/// # Example
///
/// ```
/// use slidewin::ShardedStore;
///
/// let store = ShardedStore::builder()
///     .shards(64)
///     .capacity(1_000_000)
///     .build();
/// ```
pub struct ShardedStore {
    shards: Box<[Mutex<HashMap<String, KeyHistory>>]>,
    hasher: RandomState,
}

/// Builder for configuring a ShardedStore
pub struct ShardedStoreBuilder {
    shards: usize,
    capacity: usize,
}

impl ShardedStore {
    /// Create a store with four shards per available CPU
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new builder for configuring a ShardedStore
    pub fn builder() -> ShardedStoreBuilder {
        ShardedStoreBuilder::default()
    }

    fn with_config(shard_count: usize, capacity: usize) -> Self {
        let shard_count = shard_count.max(1);
        let per_shard =
            (capacity as f64 * CAPACITY_OVERHEAD_FACTOR / shard_count as f64).ceil() as usize;

        let shards = (0..shard_count)
            .map(|_| Mutex::new(HashMap::with_capacity(per_shard)))
            .collect();

        ShardedStore {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, KeyHistory>> {
        let index = (BuildHasher::hash_one(&self.hasher, key) as usize) % self.shards.len();
        &self.shards[index]
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl sealed::Sealed for ShardedStore {}

impl Store for ShardedStore {
    fn with_history<R, F>(&self, _access: HistoryAccess, key: &str, f: F) -> R
    where
        F: FnOnce(&mut KeyHistory) -> R,
    {
        let mut data = self.shard(key).lock();
        with_entry(&mut data, key, f)
    }

    fn compact(&self, _access: HistoryAccess, now: Instant, window: Duration) -> CompactionReport {
        let mut report = CompactionReport::default();
        for shard in self.shards.iter() {
            let mut data = shard.lock();
            report.absorb(compact_map(&mut data, now, window));
        }
        report
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    fn contains(&self, key: &str) -> bool {
        self.shard(key)
            .lock()
            .get(key)
            .is_some_and(|history| !history.is_empty())
    }
}

impl Default for ShardedStoreBuilder {
    fn default() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            shards: cpu_count * SHARDS_PER_CPU,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ShardedStoreBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of shards (at least one is always used)
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Set the expected number of unique keys across all shards
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Build the ShardedStore with the configured settings
    pub fn build(self) -> ShardedStore {
        ShardedStore::with_config(self.shards, self.capacity)
    }
}
