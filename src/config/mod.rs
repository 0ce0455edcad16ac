// Configuration manager module
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::LoadSimError;

/// Bounds for a randomized pacing delay, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRangeMs {
    pub min: u64,
    pub max: u64,
}

impl DelayRangeMs {
    pub const ZERO: DelayRangeMs = DelayRangeMs { min: 0, max: 0 };
}

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target API host.
    pub api_host: String,
    /// Target API port.
    pub api_port: u16,
    /// Path prefix for all API operations.
    pub api_base_path: String,
    /// Prometheus host for the metrics-query phase.
    pub prometheus_host: String,
    /// Prometheus port.
    pub prometheus_port: u16,
    /// Number of simulated users in the load batch.
    pub population: usize,
    /// Maximum number of sessions running at any instant.
    pub concurrency_limit: usize,
    /// Deadline for one whole session task, in seconds.
    pub per_task_timeout_secs: u64,
    /// Deadline for one API call, in seconds. Must be shorter than the
    /// per-task timeout so an abandoned call cannot pin a task slot.
    pub per_call_timeout_secs: u64,
    /// Number of individual users simulated sequentially before the
    /// load batch.
    pub demo_batch_size: usize,
    /// Delay between the begin and confirm calls of a two-phase method.
    pub inter_step_delay_ms: DelayRangeMs,
    /// Delay between methods within one session.
    pub inter_method_delay_ms: DelayRangeMs,
    /// Retries for the preflight health probe.
    pub preflight_retries: u32,
    /// Seed for behavior selection; None draws from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 3001,
            api_base_path: "/api/v1".to_string(),
            prometheus_host: "127.0.0.1".to_string(),
            prometheus_port: 9090,
            population: 20,
            concurrency_limit: 5,
            per_task_timeout_secs: 30,
            per_call_timeout_secs: 10,
            demo_batch_size: 5,
            inter_step_delay_ms: DelayRangeMs { min: 200, max: 500 },
            inter_method_delay_ms: DelayRangeMs { min: 200, max: 800 },
            preflight_retries: 3,
            seed: None,
        }
    }
}

impl Config {
    /// Validate configuration values. Collects every problem instead of
    /// stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.population == 0 {
            errors.push("population must be at least 1".to_string());
        }
        if self.concurrency_limit == 0 {
            errors.push("concurrency_limit must be at least 1".to_string());
        }
        if self.api_port == 0 {
            errors.push("api_port must be greater than 0".to_string());
        }
        if self.per_task_timeout_secs == 0 {
            errors.push("per_task_timeout_secs must be greater than 0".to_string());
        }
        if self.per_call_timeout_secs == 0 {
            errors.push("per_call_timeout_secs must be greater than 0".to_string());
        }
        if self.per_call_timeout_secs >= self.per_task_timeout_secs {
            errors.push(
                "per_call_timeout_secs must be shorter than per_task_timeout_secs".to_string(),
            );
        }
        for (name, range) in [
            ("inter_step_delay_ms", &self.inter_step_delay_ms),
            ("inter_method_delay_ms", &self.inter_method_delay_ms),
        ] {
            if range.min > range.max {
                errors.push(format!("{}.min must be <= {}.max", name, name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn per_task_timeout(&self) -> Duration {
        Duration::from_secs(self.per_task_timeout_secs)
    }

    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.per_call_timeout_secs)
    }
}

/// Load configuration from a JSON string and validate it.
pub fn load_from_str(json: &str) -> Result<Config, LoadSimError> {
    let config: Config = serde_json::from_str(json)
        .map_err(|e| LoadSimError::ConfigError(format!("JSON parse error: {}", e)))?;

    config.validate().map_err(|errors| {
        LoadSimError::ConfigError(format!("Validation failed: {}", errors.join("; ")))
    })?;

    Ok(config)
}

/// Load configuration from a JSON file and validate it.
pub fn load_from_file(path: &Path) -> Result<Config, LoadSimError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LoadSimError::ConfigError(format!("Failed to read config file: {}", e)))?;
    load_from_str(&content)
}
