//! The owning limiter handle
//!
//! [`Limiter`] bundles a [`SlidingWindowLimiter`] with the compactor that
//! keeps its memory bounded. Each instance owns its own store and task, so
//! any number of independently configured limiters can coexist.

use super::LimiterError;
use super::clock::{Clock, SystemClock};
use super::compactor::{Compactor, CompactorHandle};
use super::config::{WindowConfig, WindowConfigBuilder};
use super::rate_limiter::{Decision, SlidingWindowLimiter};
use super::store::{CompactionReport, ShardedStore, Store};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// A sliding-window limiter with its background compactor
///
/// Must be created inside a Tokio runtime. The compactor starts immediately
/// and stops when the limiter is dropped or [`shutdown`](Self::shutdown) is
/// awaited.
///
/// # Example
///
/// ```
/// use slidewin::Limiter;
/// use std::time::{Duration, Instant};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), slidewin::LimiterError> {
/// let limiter = Limiter::new(3, Duration::from_secs(10), Duration::from_secs(5))?;
///
/// let now = Instant::now();
/// for _ in 0..3 {
///     assert!(limiter.allow("user:42", now));
/// }
/// assert!(!limiter.allow("user:42", now));
/// assert_eq!(limiter.remaining_quota("user:42", now), 0);
/// assert_eq!(limiter.retry_after("user:42", now), Duration::from_secs(10));
///
/// limiter.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Limiter<S = ShardedStore, C = SystemClock>
where
    S: Store + 'static,
    C: Clock + Clone,
{
    core: Arc<SlidingWindowLimiter<S>>,
    clock: C,
    compactor: CompactorHandle,
}

impl Limiter {
    /// Create a limiter with the default store and the system clock
    ///
    /// # Errors
    ///
    /// Any [`WindowConfig`] validation error, or
    /// [`LimiterError::NoRuntime`] outside a Tokio runtime.
    pub fn new(
        limit: i64,
        window: Duration,
        cleanup_period: Duration,
    ) -> Result<Self, LimiterError> {
        Self::builder()
            .limit(limit)
            .window(window)
            .cleanup_period(cleanup_period)
            .build()
    }

    /// Create a new builder for configuring a Limiter
    pub fn builder() -> LimiterBuilder {
        LimiterBuilder {
            config: WindowConfig::builder(),
            store: ShardedStore::new(),
            clock: SystemClock,
        }
    }
}

impl<S, C> Limiter<S, C>
where
    S: Store + 'static,
    C: Clock + Clone,
{
    /// Assemble a limiter from a validated config, a store and a clock
    pub fn from_parts(config: WindowConfig, store: S, clock: C) -> Result<Self, LimiterError> {
        let core = Arc::new(SlidingWindowLimiter::with_store(config, store));
        let compactor = Compactor::spawn(core.clone(), clock.clone())?;

        Ok(Limiter {
            core,
            clock,
            compactor,
        })
    }

    /// Current time from the limiter's clock
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// See [`SlidingWindowLimiter::allow`]
    pub fn allow(&self, key: &str, now: Instant) -> bool {
        self.core.allow(key, now)
    }

    /// See [`SlidingWindowLimiter::check`]
    pub fn check(&self, key: &str, now: Instant) -> Decision {
        self.core.check(key, now)
    }

    /// See [`SlidingWindowLimiter::remaining_quota`]
    pub fn remaining_quota(&self, key: &str, now: Instant) -> usize {
        self.core.remaining_quota(key, now)
    }

    /// See [`SlidingWindowLimiter::retry_after`]
    pub fn retry_after(&self, key: &str, now: Instant) -> Duration {
        self.core.retry_after(key, now)
    }

    /// The limiter's configuration
    pub fn config(&self) -> &WindowConfig {
        self.core.config()
    }

    /// Number of keys currently held by the store
    pub fn tracked_keys(&self) -> usize {
        self.core.tracked_keys()
    }

    /// Whether `key` currently has any recorded admissions
    pub fn is_tracked(&self, key: &str) -> bool {
        self.core.is_tracked(key)
    }

    /// Receive the report of every compaction sweep
    pub fn compaction_reports(&self) -> watch::Receiver<CompactionReport> {
        self.compactor.subscribe()
    }

    /// The shared core limiter
    pub fn core(&self) -> &Arc<SlidingWindowLimiter<S>> {
        &self.core
    }

    /// Stop the compactor and wait for it to exit
    pub async fn shutdown(self) {
        self.compactor.shutdown().await;
    }
}

/// Builder for configuring a Limiter
///
/// # Example
///
/// ```
/// use slidewin::{Limiter, LockedStore, ManualClock};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), slidewin::LimiterError> {
/// let clock = ManualClock::new();
/// let limiter = Limiter::builder()
///     .limit(100)
///     .window(Duration::from_secs(60))
///     .cleanup_period(Duration::from_secs(30))
///     .store(LockedStore::with_capacity(10_000))
///     .clock(clock.clone())
///     .build()?;
///
/// assert!(limiter.allow("api_key", limiter.now()));
/// # Ok(())
/// # }
/// ```
pub struct LimiterBuilder<S = ShardedStore, C = SystemClock> {
    config: WindowConfigBuilder,
    store: S,
    clock: C,
}

impl<S, C> LimiterBuilder<S, C>
where
    S: Store + 'static,
    C: Clock + Clone,
{
    /// Set the maximum number of events per window
    pub fn limit(mut self, limit: i64) -> Self {
        self.config = self.config.limit(limit);
        self
    }

    /// Set the length of the trailing window
    pub fn window(mut self, window: Duration) -> Self {
        self.config = self.config.window(window);
        self
    }

    /// Set the interval between compaction sweeps
    pub fn cleanup_period(mut self, period: Duration) -> Self {
        self.config = self.config.cleanup_period(period);
        self
    }

    /// Use a different store
    pub fn store<T: Store + 'static>(self, store: T) -> LimiterBuilder<T, C> {
        LimiterBuilder {
            config: self.config,
            store,
            clock: self.clock,
        }
    }

    /// Use a different clock for compaction ticks and [`Limiter::now`]
    pub fn clock<T: Clock + Clone>(self, clock: T) -> LimiterBuilder<S, T> {
        LimiterBuilder {
            config: self.config,
            store: self.store,
            clock,
        }
    }

    /// Validate the configuration and start the limiter
    pub fn build(self) -> Result<Limiter<S, C>, LimiterError> {
        let config = self.config.build()?;
        Limiter::from_parts(config, self.store, self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::{ManualClock, TokioClock};
    use crate::core::store::LockedStore;

    #[test]
    fn test_new_outside_runtime_is_an_error() {
        let result = Limiter::new(1, Duration::from_secs(1), Duration::from_secs(1));
        assert!(matches!(result, Err(LimiterError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        assert!(matches!(
            Limiter::new(-1, Duration::from_secs(1), Duration::from_secs(1)),
            Err(LimiterError::NegativeLimit(-1))
        ));
        assert!(matches!(
            Limiter::new(1, Duration::ZERO, Duration::from_secs(1)),
            Err(LimiterError::ZeroWindow)
        ));
        assert!(matches!(
            Limiter::new(1, Duration::from_secs(1), Duration::ZERO),
            Err(LimiterError::ZeroCleanupPeriod)
        ));
    }

    #[tokio::test]
    async fn test_independent_limiters_coexist() {
        let strict = Limiter::new(1, Duration::from_secs(60), Duration::from_secs(30)).unwrap();
        let loose = Limiter::builder()
            .limit(10)
            .window(Duration::from_secs(60))
            .store(LockedStore::new())
            .build()
            .unwrap();

        let now = Instant::now();
        assert!(strict.allow("shared", now));
        assert!(!strict.allow("shared", now));
        assert!(loose.allow("shared", now));
        assert_eq!(loose.remaining_quota("shared", now), 9);

        strict.shutdown().await;
        loose.shutdown().await;
    }

    #[tokio::test]
    async fn test_manual_clock_drives_now() {
        let clock = ManualClock::new();
        let limiter = Limiter::builder()
            .limit(2)
            .window(Duration::from_secs(10))
            .clock(clock.clone())
            .build()
            .unwrap();

        assert!(limiter.allow("m", limiter.now()));
        assert!(limiter.allow("m", limiter.now()));
        assert!(!limiter.allow("m", limiter.now()));

        clock.advance(Duration::from_secs(4));
        assert_eq!(
            limiter.retry_after("m", limiter.now()),
            Duration::from_secs(6)
        );

        clock.advance(Duration::from_secs(6));
        assert!(limiter.allow("m", limiter.now()));

        limiter.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_reclamation_through_handle() {
        let window = Duration::from_secs(10);
        let period = Duration::from_secs(3);
        let limiter = Limiter::builder()
            .limit(4)
            .window(window)
            .cleanup_period(period)
            .clock(TokioClock)
            .build()
            .unwrap();

        for user in ["alice", "bob", "charlie"] {
            assert!(limiter.allow(user, limiter.now()));
        }
        assert_eq!(limiter.tracked_keys(), 3);

        // No calls for longer than window + cleanup period
        tokio::time::sleep(window + period + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.compaction_reports().borrow().keys_evicted >= 1);
        assert_eq!(limiter.remaining_quota("alice", limiter.now()), 4);

        limiter.shutdown().await;
    }
}
