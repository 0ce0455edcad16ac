use clap::Parser;
use std::sync::Arc;

use bioauth_load_test::cli::{resolve_config, Cli};
use bioauth_load_test::client::{BioAuthApi, HttpApiClient, MetricsQuery, PrometheusQuery};
use bioauth_load_test::error::LoadSimError;
use bioauth_load_test::orchestrator::Orchestrator;
use bioauth_load_test::reporter::{display_run_summary, write_json_result, ConsoleReporter};
use bioauth_load_test::session::EventSink;
use bioauth_load_test::stats::StatsCollector;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<(), LoadSimError> {
    let config = resolve_config(cli)?;

    let api = Arc::new(HttpApiClient::from_config(&config)) as Arc<dyn BioAuthApi>;
    let prometheus = Arc::new(PrometheusQuery::from_config(&config)) as Arc<dyn MetricsQuery>;
    let sink = Arc::new(ConsoleReporter::new(cli.verbose)) as Arc<dyn EventSink>;

    let orchestrator = Orchestrator::new(config, api)
        .with_sink(sink)
        .with_metrics_query(prometheus);
    orchestrator.setup_signal_handler()?;
    let stats = orchestrator.stats();

    let report = orchestrator.run().await?;

    StatsCollector::display_final_summary(&stats.snapshot());
    display_run_summary(&report);

    if let Some(path) = &cli.output {
        write_json_result(&report, path)
            .map_err(|e| LoadSimError::ConfigError(format!("Failed to write result: {}", e)))?;
        println!("Result written to {}", path.display());
    }

    Ok(())
}
