//! Simple metrics collection for observability
//!
//! Lightweight atomic counters for admission decisions and compaction
//! sweeps, with a bounded table of the most-denied keys.

use parking_lot::Mutex;
use slidewin::CompactionReport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

const DEFAULT_MAX_DENIED_KEYS: usize = 100;
const MAX_DENIED_KEYS_LIMIT: usize = 10_000;

/// Metrics collected while a simulation runs
pub struct Metrics {
    /// Simulation start time
    start_time: Instant,

    /// Admission decisions
    pub total_requests: AtomicU64,
    pub requests_allowed: AtomicU64,
    pub requests_denied: AtomicU64,

    /// Compaction
    pub compaction_sweeps: AtomicU64,
    pub keys_evicted: AtomicU64,
    pub stamps_pruned: AtomicU64,
    pub tracked_keys: AtomicUsize,

    /// Denial counts per key, capped at `max_denied_keys` entries
    denied_keys: Mutex<HashMap<String, u64>>,
    max_denied_keys: usize,
}

/// Builder for configuring Metrics
pub struct MetricsBuilder {
    max_denied_keys: usize,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new builder for configuring Metrics
    pub fn builder() -> MetricsBuilder {
        MetricsBuilder {
            max_denied_keys: DEFAULT_MAX_DENIED_KEYS,
        }
    }

    /// Record one admission decision for `key`
    pub fn record_decision(&self, key: &str, allowed: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if allowed {
            self.requests_allowed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.requests_denied.fetch_add(1, Ordering::Relaxed);
        if self.max_denied_keys == 0 {
            return;
        }

        let mut denied = self.denied_keys.lock();
        if let Some(count) = denied.get_mut(key) {
            *count += 1;
        } else if denied.len() < self.max_denied_keys {
            denied.insert(key.to_string(), 1);
        }
    }

    /// Record a finished compaction sweep
    pub fn record_compaction(&self, report: &CompactionReport) {
        self.compaction_sweeps.fetch_add(1, Ordering::Relaxed);
        self.keys_evicted
            .fetch_add(report.keys_evicted as u64, Ordering::Relaxed);
        self.stamps_pruned
            .fetch_add(report.stamps_pruned as u64, Ordering::Relaxed);
        self.tracked_keys
            .store(report.keys_retained, Ordering::Relaxed);
    }

    /// Most-denied keys, highest count first
    pub fn top_denied_keys(&self, n: usize) -> Vec<(String, u64)> {
        let denied = self.denied_keys.lock();
        let mut keys: Vec<(String, u64)> = denied
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        keys.truncate(n);
        keys
    }

    /// Time since the simulation started, in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(1024);

        output.push_str("# HELP slidewin_uptime_seconds Time since simulation start in seconds\n");
        output.push_str("# TYPE slidewin_uptime_seconds gauge\n");
        output.push_str(&format!(
            "slidewin_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        output.push_str("# HELP slidewin_requests_total Total number of admission checks\n");
        output.push_str("# TYPE slidewin_requests_total counter\n");
        output.push_str(&format!(
            "slidewin_requests_total {}\n\n",
            self.total_requests.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP slidewin_requests_allowed Total requests admitted\n");
        output.push_str("# TYPE slidewin_requests_allowed counter\n");
        output.push_str(&format!(
            "slidewin_requests_allowed {}\n\n",
            self.requests_allowed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP slidewin_requests_denied Total requests denied\n");
        output.push_str("# TYPE slidewin_requests_denied counter\n");
        output.push_str(&format!(
            "slidewin_requests_denied {}\n\n",
            self.requests_denied.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP slidewin_compaction_sweeps Total compaction sweeps\n");
        output.push_str("# TYPE slidewin_compaction_sweeps counter\n");
        output.push_str(&format!(
            "slidewin_compaction_sweeps {}\n\n",
            self.compaction_sweeps.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP slidewin_keys_evicted Total idle keys evicted by compaction\n");
        output.push_str("# TYPE slidewin_keys_evicted counter\n");
        output.push_str(&format!(
            "slidewin_keys_evicted {}\n\n",
            self.keys_evicted.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP slidewin_stamps_pruned Total expired stamps dropped by compaction\n");
        output.push_str("# TYPE slidewin_stamps_pruned counter\n");
        output.push_str(&format!(
            "slidewin_stamps_pruned {}\n\n",
            self.stamps_pruned.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP slidewin_tracked_keys Keys retained after the last sweep\n");
        output.push_str("# TYPE slidewin_tracked_keys gauge\n");
        output.push_str(&format!(
            "slidewin_tracked_keys {}\n",
            self.tracked_keys.load(Ordering::Relaxed)
        ));

        let top = self.top_denied_keys(self.max_denied_keys);
        if !top.is_empty() {
            output.push_str("\n# HELP slidewin_top_denied_keys Denials per key\n");
            output.push_str("# TYPE slidewin_top_denied_keys gauge\n");
            for (rank, (key, count)) in top.iter().enumerate() {
                output.push_str(&format!(
                    "slidewin_top_denied_keys{{key=\"{}\",rank=\"{}\"}} {}\n",
                    key.replace('"', "\\\""),
                    rank + 1,
                    count
                ));
            }
        }

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsBuilder {
    /// Maximum number of distinct denied keys to track (0 disables, capped at 10,000)
    pub fn max_denied_keys(mut self, max: usize) -> Self {
        self.max_denied_keys = max.min(MAX_DENIED_KEYS_LIMIT);
        self
    }

    /// Build the Metrics instance
    pub fn build(self) -> Metrics {
        Metrics {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            requests_allowed: AtomicU64::new(0),
            requests_denied: AtomicU64::new(0),
            compaction_sweeps: AtomicU64::new(0),
            keys_evicted: AtomicU64::new(0),
            stamps_pruned: AtomicU64::new(0),
            tracked_keys: AtomicUsize::new(0),
            denied_keys: Mutex::new(HashMap::new()),
            max_denied_keys: self.max_denied_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_allowed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_denied.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.compaction_sweeps.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_decision() {
        let metrics = Metrics::new();

        metrics.record_decision("alice", true);
        metrics.record_decision("alice", false);
        metrics.record_decision("bob", false);
        metrics.record_decision("alice", false);

        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.requests_allowed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_denied.load(Ordering::Relaxed), 3);
        assert_eq!(
            metrics.top_denied_keys(10),
            vec![("alice".to_string(), 2), ("bob".to_string(), 1)]
        );
    }

    #[test]
    fn test_record_compaction() {
        let metrics = Metrics::new();
        let report = CompactionReport {
            sweep: 1,
            keys_retained: 4,
            keys_evicted: 6,
            stamps_pruned: 30,
        };

        metrics.record_compaction(&report);
        metrics.record_compaction(&CompactionReport {
            sweep: 2,
            keys_retained: 1,
            keys_evicted: 3,
            stamps_pruned: 5,
        });

        assert_eq!(metrics.compaction_sweeps.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.keys_evicted.load(Ordering::Relaxed), 9);
        assert_eq!(metrics.stamps_pruned.load(Ordering::Relaxed), 35);
        assert_eq!(metrics.tracked_keys.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_denied_keys_are_bounded() {
        let metrics = Metrics::builder().max_denied_keys(10).build();
        for i in 0..50 {
            metrics.record_decision(&format!("user:{i}"), false);
        }
        // Keys already tracked keep counting
        metrics.record_decision("user:0", false);

        let top = metrics.top_denied_keys(100);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0], ("user:0".to_string(), 2));
    }

    #[test]
    fn test_disabled_denied_keys_tracking() {
        let metrics = Metrics::builder().max_denied_keys(0).build();
        for i in 0..100 {
            metrics.record_decision(&format!("user:{i}"), false);
        }

        let prometheus = metrics.export_prometheus();
        assert!(!prometheus.contains("slidewin_top_denied_keys"));
        assert!(prometheus.contains("slidewin_requests_denied 100"));
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_decision("alice", true);
        metrics.record_decision("bob", false);
        metrics.record_compaction(&CompactionReport {
            sweep: 1,
            keys_retained: 2,
            keys_evicted: 1,
            stamps_pruned: 3,
        });

        let output = metrics.export_prometheus();
        assert!(output.contains("slidewin_uptime_seconds"));
        assert!(output.contains("slidewin_requests_total 2"));
        assert!(output.contains("slidewin_requests_allowed 1"));
        assert!(output.contains("slidewin_requests_denied 1"));
        assert!(output.contains("slidewin_compaction_sweeps 1"));
        assert!(output.contains("slidewin_keys_evicted 1"));
        assert!(output.contains("slidewin_tracked_keys 2"));
        assert!(output.contains("slidewin_top_denied_keys{key=\"bob\",rank=\"1\"} 1"));
    }
}
