//! Limiter configuration
//!
//! A [`WindowConfig`] is immutable once built and is always valid: every
//! constructor runs the same checks.

use super::LimiterError;
use std::time::Duration;

// Defaults match a small interactive workload: 5 events per 10 seconds,
// swept every 5 seconds.
const DEFAULT_LIMIT: i64 = 5;
const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
const DEFAULT_CLEANUP_PERIOD: Duration = Duration::from_secs(5);

/// Quota definition for a sliding-window limiter
///
/// "At most `limit` admitted events per trailing `window`", with idle keys
/// reclaimed every `cleanup_period`.
///
/// # Example
///
/// ```
/// use slidewin::WindowConfig;
/// use std::time::Duration;
///
/// let config = WindowConfig::new(3, Duration::from_secs(10), Duration::from_secs(5)).unwrap();
/// assert_eq!(config.limit(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    limit: usize,
    window: Duration,
    cleanup_period: Duration,
}

impl WindowConfig {
    /// Create a validated configuration
    ///
    /// # Errors
    ///
    /// - [`LimiterError::NegativeLimit`]: `limit < 0`
    /// - [`LimiterError::ZeroWindow`]: `window` is zero
    /// - [`LimiterError::ZeroCleanupPeriod`]: `cleanup_period` is zero
    ///
    /// A `limit` of zero is accepted and means every request is denied.
    pub fn new(
        limit: i64,
        window: Duration,
        cleanup_period: Duration,
    ) -> Result<Self, LimiterError> {
        if limit < 0 {
            return Err(LimiterError::NegativeLimit(limit));
        }
        if window.is_zero() {
            return Err(LimiterError::ZeroWindow);
        }
        if cleanup_period.is_zero() {
            return Err(LimiterError::ZeroCleanupPeriod);
        }

        // Saturates on 32-bit targets
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        Ok(WindowConfig {
            limit,
            window,
            cleanup_period,
        })
    }

    /// Create a new builder for configuring a WindowConfig
    pub fn builder() -> WindowConfigBuilder {
        WindowConfigBuilder::default()
    }

    /// Maximum number of admitted events per window
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Length of the trailing window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// How often the compactor sweeps the store
    pub fn cleanup_period(&self) -> Duration {
        self.cleanup_period
    }
}

/// Builder for configuring a WindowConfig
///
/// # Example
///
/// ```
/// use slidewin::WindowConfig;
/// use std::time::Duration;
///
/// let config = WindowConfig::builder()
///     .limit(100)
///     .window(Duration::from_secs(60))
///     .cleanup_period(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert_eq!(config.window(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct WindowConfigBuilder {
    limit: i64,
    window: Duration,
    cleanup_period: Duration,
}

impl Default for WindowConfigBuilder {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
            cleanup_period: DEFAULT_CLEANUP_PERIOD,
        }
    }
}

impl WindowConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of events per window
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the length of the trailing window
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the interval between compaction sweeps
    ///
    /// Shorter periods reclaim idle keys sooner at the cost of more frequent
    /// full-store scans. Correctness never depends on this value.
    pub fn cleanup_period(mut self, period: Duration) -> Self {
        self.cleanup_period = period;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<WindowConfig, LimiterError> {
        WindowConfig::new(self.limit, self.window, self.cleanup_period)
    }
}
