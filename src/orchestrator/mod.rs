// Run orchestrator module
//
// Coordinates the full run: preflight health gate, sequential demo
// phase, concurrent load phase, metrics observation, and the final
// report. A shutdown flag is honored at every phase boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::{AggregateReport, ResultAggregator};
use crate::behavior::BehaviorSelector;
use crate::client::{BioAuthApi, HealthStatus, MetricsQuery};
use crate::config::Config;
use crate::dispatcher::TaskDispatcher;
use crate::error::LoadSimError;
use crate::reporter::{build_report, filter_metric_lines, MetricsReport, RunReport};
use crate::session::{EventSink, NullSink, SessionSimulator};
use crate::stats::StatsCollector;
use crate::users::UserGenerator;

const PREFLIGHT_RETRY_DELAY: Duration = Duration::from_millis(500);
const METRIC_FILTER: &str = "biometric";
const METRIC_SAMPLE_LINES: usize = 5;
const ATTEMPTS_METRIC: &str = "biometric_auth_attempts_total";

pub struct Orchestrator {
    config: Config,
    api: Arc<dyn BioAuthApi>,
    metrics_query: Option<Arc<dyn MetricsQuery>>,
    stats: Arc<StatsCollector>,
    sink: Arc<dyn EventSink>,
    shutdown_flag: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(config: Config, api: Arc<dyn BioAuthApi>) -> Self {
        Self {
            config,
            api,
            metrics_query: None,
            stats: Arc::new(StatsCollector::new()),
            sink: Arc::new(NullSink),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_metrics_query(mut self, query: Arc<dyn MetricsQuery>) -> Self {
        self.metrics_query = Some(query);
        self
    }

    /// Flag checked at phase boundaries; set it to stop the run early.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_flag)
    }

    /// Install a Ctrl-C handler that requests shutdown.
    pub fn setup_signal_handler(&self) -> Result<(), LoadSimError> {
        let flag = Arc::clone(&self.shutdown_flag);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .map_err(|e| LoadSimError::ConfigError(format!("Failed to set signal handler: {}", e)))
    }

    /// Request shutdown (for testing or programmatic use).
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn stats(&self) -> Arc<StatsCollector> {
        Arc::clone(&self.stats)
    }

    /// Probe the target before dispatching any session. Retries with a
    /// fixed delay; no load is generated until this passes.
    pub async fn preflight(&self) -> Result<HealthStatus, LoadSimError> {
        let attempts = self.config.preflight_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.api.health().await {
                Ok(status) if status.healthy => return Ok(status),
                Ok(status) => {
                    last_error = format!("target unhealthy: {:?}", status);
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(PREFLIGHT_RETRY_DELAY).await;
            }
        }

        Err(LoadSimError::PreflightFailed(format!(
            "no healthy answer after {} attempts: {}",
            attempts, last_error
        )))
    }

    /// Execute the whole run and produce the final report.
    pub async fn run(&self) -> Result<RunReport, LoadSimError> {
        let started_at = epoch_now();

        let health = self.preflight().await?;
        self.sink.on_preflight(&health);

        let mut selector = match self.config.seed {
            Some(seed) => BehaviorSelector::with_seed(seed),
            None => BehaviorSelector::new(),
        };
        let simulator = Arc::new(SessionSimulator::new(
            Arc::clone(&self.api),
            Arc::clone(&self.stats),
            Arc::clone(&self.sink),
            &self.config,
        ));

        // Demo phase: a handful of users, one at a time, so the target's
        // behavior is easy to follow before the concurrent batch hits it.
        if !self.shutdown_requested() {
            let demo_users = UserGenerator::demo_batch(self.config.demo_batch_size, &mut selector);
            for user in &demo_users {
                if self.shutdown_requested() {
                    break;
                }
                simulator.run(user).await;
            }
        }

        // Load phase: the concurrent batch.
        let aggregate = if self.shutdown_requested() {
            empty_aggregate()
        } else {
            let users = UserGenerator::load_batch(self.config.population, &mut selector);
            let expected = users.len();
            let dispatcher =
                TaskDispatcher::new(Arc::clone(&simulator), Arc::clone(&self.stats), &self.config);
            let outcomes = dispatcher.run_batch(users).await;
            ResultAggregator::aggregate(expected, &outcomes)?
        };

        let metrics = if self.shutdown_requested() {
            None
        } else {
            self.observe_metrics().await
        };

        let finished_at = epoch_now();
        Ok(build_report(
            &self.config,
            aggregate,
            &self.stats.snapshot(),
            metrics,
            &started_at,
            &finished_at,
        ))
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Post-run metrics observation. Best effort: an unreachable metrics
    /// endpoint or Prometheus never fails the run.
    async fn observe_metrics(&self) -> Option<MetricsReport> {
        let exposition_sample = match self.api.metrics_text().await {
            Ok(text) => filter_metric_lines(&text, METRIC_FILTER, METRIC_SAMPLE_LINES),
            Err(_) => Vec::new(),
        };

        let prometheus_series = match &self.metrics_query {
            Some(query) => query.query(ATTEMPTS_METRIC).await.ok(),
            None => None,
        };

        if exposition_sample.is_empty() && prometheus_series.is_none() {
            None
        } else {
            Some(MetricsReport {
                exposition_sample,
                prometheus_series,
            })
        }
    }
}

fn empty_aggregate() -> AggregateReport {
    AggregateReport {
        total_sessions: 0,
        successful_sessions: 0,
        failed_sessions: 0,
        success_rate: 0.0,
        avg_session_ms: 0,
        max_session_ms: 0,
        by_variant: Default::default(),
        failures: Vec::new(),
    }
}

/// Current time as a unix-epoch seconds string.
fn epoch_now() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}
