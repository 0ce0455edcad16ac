// Prometheus query collaborator.
//
// After the load run the orchestrator asks Prometheus how many
// authentication attempts the target recorded. Only the result count is
// needed, so the query surface is a single method behind a trait.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::http;
use crate::config::Config;
use crate::error::LoadSimError;

/// Counts the result series a Prometheus instant query returns.
#[async_trait]
pub trait MetricsQuery: Send + Sync {
    async fn query(&self, metric: &str) -> Result<usize, LoadSimError>;
}

pub struct PrometheusQuery {
    host: String,
    port: u16,
    call_timeout: Duration,
}

impl PrometheusQuery {
    pub fn new(host: &str, port: u16, call_timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            call_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.prometheus_host,
            config.prometheus_port,
            config.per_call_timeout(),
        )
    }
}

#[async_trait]
impl MetricsQuery for PrometheusQuery {
    async fn query(&self, metric: &str) -> Result<usize, LoadSimError> {
        let path = format!("/api/v1/query?query={}", metric);
        let raw = http::execute(&self.host, self.port, "GET", &path, None, self.call_timeout)
            .await?;
        let resp = http::parse_response(&raw)?;
        if !resp.is_success() {
            return Err(LoadSimError::HttpError(format!(
                "prometheus answered {}",
                resp.status
            )));
        }
        Ok(count_results(&resp.body))
    }
}

/// Number of series in a Prometheus query response body.
fn count_results(body: &Value) -> usize {
    body.get("data")
        .and_then(|d| d.get("result"))
        .and_then(Value::as_array)
        .map(|r| r.len())
        .unwrap_or(0)
}
