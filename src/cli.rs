// CLI argument definitions using clap derive macros
use clap::Parser;
use std::path::PathBuf;

use crate::config::{self, Config};
use crate::error::LoadSimError;

/// Biometric authentication load simulator
#[derive(Parser, Debug, PartialEq)]
#[command(name = "bioauth-load-test")]
pub struct Cli {
    /// JSON config file path; every value can also be set by flag
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Number of simulated users in the load batch
    #[arg(long)]
    pub population: Option<usize>,
    /// Maximum number of concurrent sessions
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Target API host
    #[arg(long)]
    pub host: Option<String>,
    /// Target API port
    #[arg(long)]
    pub port: Option<u16>,
    /// Number of demo users simulated sequentially before the load batch
    #[arg(long)]
    pub demo: Option<usize>,
    /// Seed for behavior selection; omit for entropy
    #[arg(long)]
    pub seed: Option<u64>,
    /// JSON result output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Print every API call, not just session boundaries
    #[arg(short, long)]
    pub verbose: bool,
}

/// Build the effective Config: file values (or defaults) with flag
/// overrides applied, re-validated afterwards.
pub fn resolve_config(cli: &Cli) -> Result<Config, LoadSimError> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_from_file(path)?,
        None => Config::default(),
    };

    if let Some(population) = cli.population {
        cfg.population = population;
    }
    if let Some(concurrency) = cli.concurrency {
        cfg.concurrency_limit = concurrency;
    }
    if let Some(host) = &cli.host {
        cfg.api_host = host.clone();
    }
    if let Some(port) = cli.port {
        cfg.api_port = port;
    }
    if let Some(demo) = cli.demo {
        cfg.demo_batch_size = demo;
    }
    if let Some(seed) = cli.seed {
        cfg.seed = Some(seed);
    }

    cfg.validate().map_err(|errors| {
        LoadSimError::ConfigError(format!("Validation failed: {}", errors.join("; ")))
    })?;

    Ok(cfg)
}
