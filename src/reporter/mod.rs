// Reporter module - result data models, console output, JSON output
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::aggregate::AggregateReport;
use crate::config::Config;
use crate::session::{EventSink, SessionOutcome, StepEvent};
use crate::stats::StatsSnapshot;
use crate::users::SimulatedUser;

/// Post-run metrics observations: a sample of the target's exposition
/// text and the Prometheus series count, when either was reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub exposition_sample: Vec<String>,
    pub prometheus_series: Option<usize>,
}

/// Full run result, serialized as the JSON output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: Config,
    pub aggregate: AggregateReport,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub timeouts: u64,
    pub network_failures: u64,
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub status_codes: HashMap<u16, u64>,
    #[serde(default)]
    pub metrics: Option<MetricsReport>,
    pub started_at: String,
    pub finished_at: String,
}

/// Build the run report from the aggregate and a final stats snapshot.
pub fn build_report(
    config: &Config,
    aggregate: AggregateReport,
    snapshot: &StatsSnapshot,
    metrics: Option<MetricsReport>,
    started_at: &str,
    finished_at: &str,
) -> RunReport {
    RunReport {
        config: config.clone(),
        aggregate,
        total_calls: snapshot.total_calls,
        successful_calls: snapshot.successful_calls,
        failed_calls: snapshot.failed_calls,
        timeouts: snapshot.timeouts,
        network_failures: snapshot.network_failures,
        latency_p50_ms: snapshot.latency_p50.as_secs_f64() * 1000.0,
        latency_p90_ms: snapshot.latency_p90.as_secs_f64() * 1000.0,
        latency_p95_ms: snapshot.latency_p95.as_secs_f64() * 1000.0,
        latency_p99_ms: snapshot.latency_p99.as_secs_f64() * 1000.0,
        status_codes: snapshot.status_codes.clone(),
        metrics,
        started_at: started_at.to_string(),
        finished_at: finished_at.to_string(),
    }
}

/// Write the run report to a file as pretty-printed JSON.
pub fn write_json_result(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Lines of a metrics exposition containing `needle`, at most `limit`.
pub fn filter_metric_lines(exposition: &str, needle: &str, limit: usize) -> Vec<String> {
    exposition
        .lines()
        .filter(|line| line.contains(needle))
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// Print the final run summary to stdout.
pub fn display_run_summary(report: &RunReport) {
    println!("=== Load Run Summary ===");
    println!("Sessions:     {}", report.aggregate.total_sessions);
    println!("Succeeded:    {}", report.aggregate.successful_sessions);
    println!("Failed:       {}", report.aggregate.failed_sessions);
    println!("Success Rate: {:.1}%", report.aggregate.success_rate);
    println!("By Variant:");
    for (variant, stats) in &report.aggregate.by_variant {
        println!("  {}: {}/{}", variant, stats.succeeded, stats.total);
    }
    if !report.aggregate.failures.is_empty() {
        println!("Failed Sessions:");
        for failure in &report.aggregate.failures {
            println!(
                "  {} ({})",
                failure.username,
                failure.error.as_deref().unwrap_or("method failure")
            );
        }
    }
    if let Some(metrics) = &report.metrics {
        if !metrics.exposition_sample.is_empty() {
            println!("Target Metrics:");
            for line in &metrics.exposition_sample {
                println!("  {}", line);
            }
        }
        if let Some(series) = metrics.prometheus_series {
            println!("Prometheus attempt series: {}", series);
        }
    }
    println!("========================");
}

/// Event sink that narrates the run on stdout. The quiet form only
/// reports session boundaries.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl EventSink for ConsoleReporter {
    fn on_preflight(&self, status: &crate::client::HealthStatus) {
        let uptime = status
            .uptime_secs
            .map(|s| format!("{:.1}s", s))
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "Target healthy (backing store {}, uptime {})",
            if status.backing_store_ok { "ok" } else { "down" },
            uptime,
        );
    }

    fn on_session_start(&self, user: &SimulatedUser) {
        println!(
            "[{}] session start ({})",
            user.username,
            user.variant.name()
        );
    }

    fn on_step(&self, event: &StepEvent) {
        if !self.verbose {
            return;
        }
        let status = event
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{}] {} {:?} -> {} ({}, {:.0}ms)",
            event.username,
            event.method.name(),
            event.phase,
            if event.success { "ok" } else { "fail" },
            status,
            event.latency.as_secs_f64() * 1000.0,
        );
        if let Some(detail) = &event.detail {
            println!("[{}]   {}", event.username, detail);
        }
    }

    fn on_session_end(&self, outcome: &SessionOutcome) {
        println!(
            "[{}] session {} in {}ms",
            outcome.username,
            if outcome.success { "succeeded" } else { "failed" },
            outcome.duration_ms,
        );
    }
}
