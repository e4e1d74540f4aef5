use slidewin::{Limiter, LockedStore, ShardedStore, TokioClock};
use slidewin_sim::config::WorkloadConfig;
use slidewin_sim::metrics::Metrics;
use slidewin_sim::simulation;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_test::assert_ok;

fn burst(users: &[&str], requests: usize, late_probe: Option<Duration>) -> WorkloadConfig {
    WorkloadConfig {
        users: users.iter().map(|user| user.to_string()).collect(),
        requests_per_user: requests,
        max_jitter: Duration::ZERO,
        late_probe,
        seed: Some(1),
    }
}

#[tokio::test(start_paused = true)]
async fn test_burst_is_capped_and_quota_returns() {
    // Every request lands at t=0, the probe at t=12s
    let workload = burst(&["alice", "bob"], 5, Some(Duration::from_secs(12)));
    let limiter = assert_ok!(
        Limiter::builder()
            .limit(3)
            .window(Duration::from_secs(10))
            .cleanup_period(Duration::from_secs(5))
            .clock(TokioClock)
            .build()
    );
    let metrics = Arc::new(Metrics::new());

    let report = assert_ok!(simulation::run(&workload, limiter, metrics.clone()).await);

    for user in &report.users {
        assert_eq!(user.allowed, 3, "{} admitted past the limit", user.user);
        assert_eq!(user.denied, 2);
        assert_eq!(user.longest_retry_after_ms, Some(10_000));
    }

    let probe = report.late_probe.expect("probe configured");
    assert_eq!(probe.user, "alice");
    assert!(probe.allowed);
    assert_eq!(probe.remaining, 2);

    assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 11);
    assert_eq!(metrics.requests_allowed.load(Ordering::Relaxed), 7);
    assert_eq!(metrics.requests_denied.load(Ordering::Relaxed), 4);

    // bob went idle at t=0; only alice's probe stamp survives the last sweep
    assert_eq!(report.tracked_keys, 1);
    assert!(report.compaction.sweeps >= 1);
    assert!(report.compaction.keys_evicted >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_limit_denies_everyone() {
    let workload = burst(&["carol"], 4, None);
    let limiter = assert_ok!(
        Limiter::builder()
            .limit(0)
            .window(Duration::from_secs(1))
            .cleanup_period(Duration::from_secs(1))
            .store(LockedStore::new())
            .clock(TokioClock)
            .build()
    );
    let metrics = Arc::new(Metrics::new());

    let report = assert_ok!(simulation::run(&workload, limiter, metrics.clone()).await);

    assert_eq!(report.users[0].allowed, 0);
    assert_eq!(report.users[0].denied, 4);
    assert_eq!(report.users[0].longest_retry_after_ms, None);
    assert!(report.to_string().contains("never"));
    assert!(report.late_probe.is_none());
    assert_eq!(report.tracked_keys, 0);
    assert_eq!(metrics.top_denied_keys(1), vec![("carol".to_string(), 4)]);
}

#[tokio::test(start_paused = true)]
async fn test_jittered_workload_respects_window() {
    let workload = WorkloadConfig {
        users: vec!["dave".to_string(), "erin".to_string(), "frank".to_string()],
        requests_per_user: 40,
        max_jitter: Duration::from_millis(500),
        late_probe: None,
        seed: Some(42),
    };
    let limiter = assert_ok!(
        Limiter::builder()
            .limit(5)
            .window(Duration::from_secs(2))
            .cleanup_period(Duration::from_secs(1))
            .store(ShardedStore::builder().shards(4).build())
            .clock(TokioClock)
            .build()
    );
    let metrics = Arc::new(Metrics::new());

    let report = assert_ok!(simulation::run(&workload, limiter, metrics).await);

    // 40 requests with pauses under 500ms span less than 20s, so at most
    // ten full windows of admissions per user
    for user in &report.users {
        assert_eq!(user.allowed + user.denied, 40);
        assert!(user.allowed >= 5);
        assert!(user.allowed <= 5 * 10, "{} allowed {}", user.user, user.allowed);
    }
    assert!(report.compaction.sweeps >= 1);
}
