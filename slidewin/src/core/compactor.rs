//! Background compaction
//!
//! In-line pruning only touches keys that are being called. A key that
//! receives a burst and then goes quiet would keep its stale stamps forever,
//! so the compactor sweeps the whole store every `cleanup_period`.

use super::LimiterError;
use super::clock::Clock;
use super::rate_limiter::SlidingWindowLimiter;
use super::store::{CompactionReport, Store};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Spawns the compaction task
pub struct Compactor;

impl Compactor {
    /// Start sweeping `limiter` every `cleanup_period` on the current runtime
    ///
    /// The first sweep happens one full period after the call. Each sweep is
    /// stamped with `clock`.
    ///
    /// # Errors
    ///
    /// [`LimiterError::NoRuntime`] when called outside a Tokio runtime.
    pub fn spawn<S, C>(
        limiter: Arc<SlidingWindowLimiter<S>>,
        clock: C,
    ) -> Result<CompactorHandle, LimiterError>
    where
        S: Store + 'static,
        C: Clock,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LimiterError::NoRuntime)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (report_tx, report_rx) = watch::channel(CompactionReport::default());

        let task = runtime.spawn(run_compactor(limiter, clock, shutdown_rx, report_tx));

        Ok(CompactorHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
            reports: report_rx,
        })
    }
}

/// Handle to a running compactor
///
/// Dropping the handle signals the task to stop after any sweep in progress.
/// Use [`shutdown`](Self::shutdown) to also wait for it to finish.
pub struct CompactorHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    reports: watch::Receiver<CompactionReport>,
}

impl CompactorHandle {
    /// Receive the report of every completed sweep
    ///
    /// The initial value is an empty report with `sweep == 0`.
    pub fn subscribe(&self) -> watch::Receiver<CompactionReport> {
        self.reports.clone()
    }

    /// Report from the most recent sweep
    pub fn last_report(&self) -> CompactionReport {
        *self.reports.borrow()
    }

    /// Stop the compactor and wait for the task to exit
    ///
    /// A sweep that is already running always completes first.
    pub async fn shutdown(mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            // A panicked sweep has nothing left to clean up
            let _ = task.await;
        }
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already have exited
            let _ = tx.send(());
        }
    }
}

impl Drop for CompactorHandle {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

async fn run_compactor<S, C>(
    limiter: Arc<SlidingWindowLimiter<S>>,
    clock: C,
    mut shutdown_rx: oneshot::Receiver<()>,
    report_tx: watch::Sender<CompactionReport>,
) where
    S: Store,
    C: Clock,
{
    let period = limiter.config().cleanup_period();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately
    ticker.tick().await;

    info!(?period, "compactor started");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                let report = limiter.compact(clock.now());
                debug!(
                    sweep = report.sweep,
                    retained = report.keys_retained,
                    evicted = report.keys_evicted,
                    pruned = report.stamps_pruned,
                    "compaction sweep finished"
                );
                report_tx.send_replace(report);
            }
        }
    }

    info!("compactor stopped");
}
