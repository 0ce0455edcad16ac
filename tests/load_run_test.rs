//! End-to-end runs against the mock API client: full orchestration from
//! preflight through aggregation, without a real network target.

use std::sync::Arc;
use std::time::Duration;

use bioauth_load_test::client::BioAuthApi;
use bioauth_load_test::config::{Config, DelayRangeMs};
use bioauth_load_test::error::LoadSimError;
use bioauth_load_test::orchestrator::Orchestrator;
use bioauth_load_test::testutil::MockApiClient;

fn fast_config(population: usize, concurrency: usize) -> Config {
    Config {
        population,
        concurrency_limit: concurrency,
        demo_batch_size: 0,
        inter_step_delay_ms: DelayRangeMs::ZERO,
        inter_method_delay_ms: DelayRangeMs::ZERO,
        preflight_retries: 1,
        seed: Some(1234),
        ..Config::default()
    }
}

#[tokio::test]
async fn single_user_all_success() {
    let mock = Arc::new(MockApiClient::new());
    let orchestrator =
        Orchestrator::new(fast_config(1, 1), Arc::clone(&mock) as Arc<dyn BioAuthApi>);

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.aggregate.total_sessions, 1);
    assert_eq!(report.aggregate.success_rate, 100.0);
    assert!(report.aggregate.failures.is_empty());
}

#[tokio::test]
async fn single_user_failure_is_reported() {
    let mock = Arc::new(MockApiClient::new());
    mock.fail_user("loaduser1");
    let orchestrator =
        Orchestrator::new(fast_config(1, 1), Arc::clone(&mock) as Arc<dyn BioAuthApi>);

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.aggregate.failed_sessions, 1);
    assert_eq!(report.aggregate.success_rate, 0.0);
    assert_eq!(report.aggregate.failures[0].username, "loaduser1");
}

#[tokio::test]
async fn four_users_at_concurrency_two_all_succeed() {
    let mock = Arc::new(MockApiClient::new());
    mock.set_delay(Duration::from_millis(10));
    let orchestrator =
        Orchestrator::new(fast_config(4, 2), Arc::clone(&mock) as Arc<dyn BioAuthApi>);

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.aggregate.total_sessions, 4);
    // All sessions succeed, so the rate must be exactly 100.0
    assert_eq!(report.aggregate.success_rate, 100.0);
    assert!(
        mock.max_concurrency() <= 2,
        "observed {} concurrent calls",
        mock.max_concurrency()
    );
}

#[tokio::test]
async fn partial_failure_rate_is_exact() {
    let mock = Arc::new(MockApiClient::new());
    for id in 1..=3 {
        mock.fail_user(&format!("loaduser{}", id));
    }
    let orchestrator =
        Orchestrator::new(fast_config(10, 5), Arc::clone(&mock) as Arc<dyn BioAuthApi>);

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.aggregate.total_sessions, 10);
    assert_eq!(report.aggregate.failed_sessions, 3);
    assert_eq!(report.aggregate.success_rate, 70.0);
}

#[tokio::test]
async fn unreachable_target_generates_no_load() {
    let mock = Arc::new(MockApiClient::new());
    mock.set_health_down(true);
    let orchestrator =
        Orchestrator::new(fast_config(10, 5), Arc::clone(&mock) as Arc<dyn BioAuthApi>);

    let result = orchestrator.run().await;
    assert!(matches!(result, Err(LoadSimError::PreflightFailed(_))));
    assert_eq!(mock.call_count(), 0, "no session call may reach the target");
}

#[tokio::test]
async fn slow_target_times_out_into_failure_outcomes() {
    let mock = Arc::new(MockApiClient::new());
    mock.set_delay(Duration::from_secs(10));
    let config = Config {
        per_task_timeout_secs: 1,
        ..fast_config(2, 2)
    };
    let orchestrator = Orchestrator::new(config, Arc::clone(&mock) as Arc<dyn BioAuthApi>);

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.aggregate.total_sessions, 2);
    assert_eq!(report.aggregate.failed_sessions, 2);
    assert!(report
        .aggregate
        .failures
        .iter()
        .all(|f| f.error.as_deref().unwrap_or_default().contains("timed out")));
    assert!(report.timeouts >= 2);
}

#[tokio::test]
async fn variant_totals_cover_the_whole_population() {
    let mock = Arc::new(MockApiClient::new());
    let orchestrator =
        Orchestrator::new(fast_config(20, 5), Arc::clone(&mock) as Arc<dyn BioAuthApi>);

    let report = orchestrator.run().await.unwrap();
    let variant_total: u64 = report.aggregate.by_variant.values().map(|v| v.total).sum();
    assert_eq!(variant_total, 20);
}
