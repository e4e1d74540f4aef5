//! Bursty multi-user workload
//!
//! Every configured user gets its own task that fires requests at the shared
//! limiter with a random pause between them. An optional late probe checks
//! that the first user's quota has come back once its window has slid past
//! the burst. Compaction reports are forwarded into [`Metrics`] while the
//! workload runs.

use crate::config::WorkloadConfig;
use crate::metrics::Metrics;
use anyhow::{Result, anyhow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use slidewin::{Clock, Limiter, Store};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one simulated user
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserReport {
    pub user: String,
    pub allowed: usize,
    pub denied: usize,
    /// Longest wait the limiter asked this user for, `None` if it said the
    /// user can never be admitted
    pub longest_retry_after_ms: Option<u64>,
}

/// Outcome of the late probe request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeReport {
    pub user: String,
    pub after_ms: u64,
    pub allowed: bool,
    pub remaining: usize,
}

/// Compaction totals over the whole run
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CompactionTotals {
    pub sweeps: u64,
    pub keys_evicted: u64,
    pub stamps_pruned: u64,
}

/// Summary printed when the simulation ends
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub limit: usize,
    pub window_ms: u64,
    pub elapsed_ms: u64,
    pub users: Vec<UserReport>,
    pub late_probe: Option<ProbeReport>,
    pub compaction: CompactionTotals,
    /// Keys still held by the store after the final sweep
    pub tracked_keys: usize,
}

/// Drive `limiter` with `workload` and collect the results
///
/// The limiter is shut down before this returns.
///
/// # Errors
///
/// Returns an error if a user task panics.
pub async fn run<S, C>(
    workload: &WorkloadConfig,
    limiter: Limiter<S, C>,
    metrics: Arc<Metrics>,
) -> Result<SimulationReport>
where
    S: Store + 'static,
    C: Clock + Clone,
{
    let started = tokio::time::Instant::now();
    let limit = limiter.config().limit();
    let window = limiter.config().window();
    let cleanup_period = limiter.config().cleanup_period();

    info!(
        users = workload.users.len(),
        requests_per_user = workload.requests_per_user,
        limit,
        ?window,
        "simulation started"
    );

    let forwarder = spawn_report_forwarder(&limiter, metrics.clone());
    let limiter = Arc::new(limiter);

    let mut users: Vec<JoinHandle<UserReport>> = Vec::with_capacity(workload.users.len());
    for (idx, user) in workload.users.iter().enumerate() {
        let rng = match workload.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ idx as u64),
            None => StdRng::from_entropy(),
        };
        users.push(tokio::spawn(simulate_user(
            user.clone(),
            workload.requests_per_user,
            workload.max_jitter,
            rng,
            limiter.clone(),
            metrics.clone(),
        )));
    }

    let probe = match (workload.late_probe, workload.users.first()) {
        (Some(delay), Some(user)) => Some(tokio::spawn(late_probe(
            user.clone(),
            delay,
            limiter.clone(),
            metrics.clone(),
        ))),
        _ => None,
    };

    let mut user_reports = Vec::with_capacity(users.len());
    for task in users {
        user_reports.push(task.await?);
    }
    let late_probe = match probe {
        Some(task) => Some(task.await?),
        None => None,
    };

    // Let the compactor run once more so idle keys show up as evicted
    let mut reports = limiter.compaction_reports();
    reports.borrow_and_update();
    if tokio::time::timeout(sweep_wait(cleanup_period), reports.changed())
        .await
        .is_err()
    {
        warn!(?cleanup_period, "no compaction sweep after the workload finished");
    }
    let tracked_keys = limiter.tracked_keys();

    let limiter = Arc::try_unwrap(limiter)
        .map_err(|_| anyhow!("limiter still shared after the workload finished"))?;
    limiter.shutdown().await;
    forwarder.await?;

    let report = SimulationReport {
        limit,
        window_ms: millis(window),
        elapsed_ms: millis(started.elapsed()),
        users: user_reports,
        late_probe,
        compaction: CompactionTotals {
            sweeps: metrics.compaction_sweeps.load(Ordering::Relaxed),
            keys_evicted: metrics.keys_evicted.load(Ordering::Relaxed),
            stamps_pruned: metrics.stamps_pruned.load(Ordering::Relaxed),
        },
        tracked_keys,
    };

    info!(elapsed_ms = report.elapsed_ms, "simulation finished");
    Ok(report)
}

async fn simulate_user<S, C>(
    user: String,
    requests: usize,
    max_jitter: Duration,
    mut rng: StdRng,
    limiter: Arc<Limiter<S, C>>,
    metrics: Arc<Metrics>,
) -> UserReport
where
    S: Store + 'static,
    C: Clock + Clone,
{
    let mut report = UserReport {
        user,
        allowed: 0,
        denied: 0,
        longest_retry_after_ms: Some(0),
    };

    for request in 1..=requests {
        let decision = limiter.check(&report.user, limiter.now());
        metrics.record_decision(&report.user, decision.allowed);

        if decision.allowed {
            report.allowed += 1;
            info!(
                user = %report.user,
                request,
                remaining = decision.remaining,
                "request allowed"
            );
        } else {
            report.denied += 1;
            report.longest_retry_after_ms =
                longest_retry(report.longest_retry_after_ms, decision.retry_after);
            if decision.retry_after == Duration::MAX {
                info!(user = %report.user, request, "request denied, never admissible");
            } else {
                let retry_after_ms = millis(decision.retry_after);
                info!(user = %report.user, request, retry_after_ms, "request denied");
            }
        }

        if request < requests {
            tokio::time::sleep(jitter(&mut rng, max_jitter)).await;
        }
    }

    report
}

async fn late_probe<S, C>(
    user: String,
    delay: Duration,
    limiter: Arc<Limiter<S, C>>,
    metrics: Arc<Metrics>,
) -> ProbeReport
where
    S: Store + 'static,
    C: Clock + Clone,
{
    tokio::time::sleep(delay).await;

    let decision = limiter.check(&user, limiter.now());
    metrics.record_decision(&user, decision.allowed);
    info!(
        user = %user,
        allowed = decision.allowed,
        remaining = decision.remaining,
        "late probe"
    );

    ProbeReport {
        user,
        after_ms: millis(delay),
        allowed: decision.allowed,
        remaining: decision.remaining,
    }
}

fn spawn_report_forwarder<S, C>(limiter: &Limiter<S, C>, metrics: Arc<Metrics>) -> JoinHandle<()>
where
    S: Store + 'static,
    C: Clock + Clone,
{
    let mut reports = limiter.compaction_reports();
    tokio::spawn(async move {
        // Ends once the compactor drops its sender
        while reports.changed().await.is_ok() {
            let report = *reports.borrow_and_update();
            metrics.record_compaction(&report);
            debug!(sweep = report.sweep, evicted = report.keys_evicted, "compaction recorded");
        }
    })
}

fn jitter(rng: &mut StdRng, max: Duration) -> Duration {
    let max_ms = millis(max);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..max_ms))
}

// How long to wait for one more sweep once the workload is done
fn sweep_wait(cleanup_period: Duration) -> Duration {
    cleanup_period.saturating_mul(2)
}

// `Duration::MAX` from the limiter means never, which stays never
fn longest_retry(longest: Option<u64>, retry_after: Duration) -> Option<u64> {
    if retry_after == Duration::MAX {
        return None;
    }
    longest.map(|ms| ms.max(millis(retry_after)))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulation finished in {}ms (limit {} per {}ms)",
            self.elapsed_ms, self.limit, self.window_ms
        )?;
        writeln!(f)?;
        writeln!(f, "{:<16} {:>8} {:>8} {:>16}", "user", "allowed", "denied", "max retry (ms)")?;
        for user in &self.users {
            let longest = match user.longest_retry_after_ms {
                Some(ms) => ms.to_string(),
                None => "never".to_string(),
            };
            writeln!(
                f,
                "{:<16} {:>8} {:>8} {:>16}",
                user.user, user.allowed, user.denied, longest
            )?;
        }

        if let Some(probe) = &self.late_probe {
            writeln!(f)?;
            writeln!(
                f,
                "Late probe for {} after {}ms: {} (remaining {})",
                probe.user,
                probe.after_ms,
                if probe.allowed { "allowed" } else { "denied" },
                probe.remaining
            )?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Compaction: {} sweeps, {} keys evicted, {} stamps pruned",
            self.compaction.sweeps, self.compaction.keys_evicted, self.compaction.stamps_pruned
        )?;
        write!(f, "Keys still tracked: {}", self.tracked_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_below_max() {
        let mut rng = StdRng::seed_from_u64(7);
        let max = Duration::from_millis(50);
        for _ in 0..1_000 {
            assert!(jitter(&mut rng, max) < max);
        }
        assert_eq!(jitter(&mut rng, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_sweep_wait_saturates() {
        assert_eq!(sweep_wait(Duration::from_secs(5)), Duration::from_secs(10));
        assert_eq!(sweep_wait(Duration::from_secs(u64::MAX)), Duration::MAX);
    }

    #[test]
    fn test_longest_retry_never_is_sticky() {
        let longest = longest_retry(Some(0), Duration::from_millis(400));
        assert_eq!(longest, Some(400));
        assert_eq!(longest_retry(longest, Duration::from_millis(100)), Some(400));
        assert_eq!(longest_retry(longest, Duration::MAX), None);
        assert_eq!(longest_retry(None, Duration::from_millis(900)), None);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_report_renders_as_text() {
        let report = SimulationReport {
            limit: 5,
            window_ms: 10_000,
            elapsed_ms: 12_345,
            users: vec![
                UserReport {
                    user: "alice".to_string(),
                    allowed: 5,
                    denied: 7,
                    longest_retry_after_ms: Some(8_000),
                },
                UserReport {
                    user: "mallory".to_string(),
                    allowed: 0,
                    denied: 3,
                    longest_retry_after_ms: None,
                },
            ],
            late_probe: Some(ProbeReport {
                user: "alice".to_string(),
                after_ms: 12_000,
                allowed: true,
                remaining: 4,
            }),
            compaction: CompactionTotals {
                sweeps: 3,
                keys_evicted: 2,
                stamps_pruned: 10,
            },
            tracked_keys: 1,
        };

        let text = report.to_string();
        assert!(text.contains("limit 5 per 10000ms"));
        assert!(text.contains("alice"));
        assert!(text.lines().any(|line| line.starts_with("alice") && line.ends_with("8000")));
        assert!(text.lines().any(|line| line.starts_with("mallory") && line.ends_with("never")));
        assert!(!text.contains(&u64::MAX.to_string()));
        assert!(text.contains("Late probe for alice after 12000ms: allowed (remaining 4)"));
        assert!(text.contains("3 sweeps, 2 keys evicted, 10 stamps pruned"));
        assert!(text.ends_with("Keys still tracked: 1"));
    }
}
