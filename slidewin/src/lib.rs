//! # Slidewin
//!
//! An in-process, per-key sliding-window admission controller for Rust.
//!
//! ## Overview
//!
//! Slidewin enforces quotas of the form "at most `limit` events per trailing
//! `window`" independently for every key (user id, API key, ...):
//! - **Exact windows**: an event counts for exactly `window`, then expires
//! - **No trace on denial**: rejected requests never consume quota
//! - **Introspection**: remaining quota and time until the next admission
//! - **Bounded memory**: in-line pruning plus a background compactor that
//!   evicts idle keys
//!
//! ## Quick Start
//!
//! ```
//! use slidewin::Limiter;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), slidewin::LimiterError> {
//! // 5 requests per 10 seconds, idle keys swept every 5 seconds
//! let limiter = Limiter::new(5, Duration::from_secs(10), Duration::from_secs(5))?;
//!
//! let now = limiter.now();
//! if limiter.allow("user:123", now) {
//!     println!("Allowed! Remaining: {}", limiter.remaining_quota("user:123", now));
//! } else {
//!     println!("Rate limited! Retry after: {:?}", limiter.retry_after("user:123", now));
//! }
//!
//! limiter.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Time
//!
//! Every operation takes `now` explicitly, so decisions are reproducible and
//! tests never need to sleep. The [`Clock`] given to a [`Limiter`] is only
//! read by the compactor and by [`Limiter::now`]. [`ManualClock`] and
//! [`TokioClock`] make compaction deterministic in tests.
//!
//! ## Store Types
//!
//! ### [`ShardedStore`]
//! Keys are spread over independently locked shards. The default; best when
//! many threads call the limiter at once.
//!
//! ### [`LockedStore`]
//! A single lock over the whole key space. Simplest; every operation is
//! serialized.
//!
//! Either way, all operations on one key are linearizable: prune, check and
//! append run as one unit, so concurrent callers can never be admitted past
//! the limit.
//!
//! ## Without a Runtime
//!
//! [`SlidingWindowLimiter`] has the same operations and no background task.
//! Call [`SlidingWindowLimiter::compact`] yourself to reclaim idle keys.
//!
//! ```
//! use slidewin::{SlidingWindowLimiter, WindowConfig};
//! use std::time::{Duration, Instant};
//!
//! let config = WindowConfig::new(1, Duration::from_secs(1), Duration::from_secs(1)).unwrap();
//! let limiter = SlidingWindowLimiter::new(config);
//!
//! let now = Instant::now();
//! assert!(limiter.allow("job", now));
//! let report = limiter.compact(now + Duration::from_secs(1));
//! assert_eq!(report.keys_evicted, 1);
//! ```
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing
//! - `compactor` (default): Background compaction on Tokio and the [`Limiter`] handle

pub mod core;

pub use core::{
    Clock, CompactionReport, Decision, KeyHistory, LimiterError, LockedStore, ManualClock,
    ShardedStore, ShardedStoreBuilder, SlidingWindowLimiter, Store, SystemClock, WindowConfig,
    WindowConfigBuilder,
};

#[cfg(feature = "compactor")]
pub use core::{Compactor, CompactorHandle, Limiter, LimiterBuilder, TokioClock};

// Re-export the store module so benchmarks can access it
pub use crate::core::store;
