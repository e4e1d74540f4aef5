//! Core components of the slidewin admission controller
//!
//! This module contains the fundamental building blocks:
//! - [`config`]: Validated limiter configuration
//! - [`clock`]: Time sources injected into the limiter
//! - [`history`]: Per-key ordered timestamp buffers and the pruning rule
//! - [`store`]: Storage backends mapping keys to histories
//! - [`rate_limiter`]: The sliding-window admission operations
//! - [`compactor`]: Background sweep that reclaims idle keys
//! - [`handle`]: The owning [`Limiter`] that ties a store to its compactor

pub mod clock;
pub mod config;
pub mod history;
pub mod rate_limiter;
pub mod store;

#[cfg(feature = "compactor")]
pub mod compactor;
#[cfg(feature = "compactor")]
pub mod handle;


pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{WindowConfig, WindowConfigBuilder};
pub use history::KeyHistory;
pub use rate_limiter::{Decision, SlidingWindowLimiter};
pub use store::{CompactionReport, LockedStore, ShardedStore, ShardedStoreBuilder, Store};

#[cfg(feature = "compactor")]
pub use clock::TokioClock;
#[cfg(feature = "compactor")]
pub use compactor::{Compactor, CompactorHandle};
#[cfg(feature = "compactor")]
pub use handle::{Limiter, LimiterBuilder};

use thiserror::Error;

/// Errors that can occur while constructing a limiter
///
/// Admission operations themselves never fail; every variant here is a
/// configuration-time or startup problem.
///
/// # Example
///
/// ```
/// use slidewin::{LimiterError, WindowConfig};
/// use std::time::Duration;
///
/// match WindowConfig::new(-1, Duration::from_secs(10), Duration::from_secs(5)) {
///     Err(LimiterError::NegativeLimit(n)) => println!("rejected limit {n}"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// The limit was negative
    #[error("negative limit: {0}")]
    NegativeLimit(i64),
    /// The sliding window had zero length
    #[error("window must be a positive duration")]
    ZeroWindow,
    /// The compactor period had zero length
    #[error("cleanup period must be a positive duration")]
    ZeroCleanupPeriod,
    /// The compactor was started outside of a Tokio runtime
    #[error("no Tokio runtime available to run the compactor")]
    NoRuntime,
}
