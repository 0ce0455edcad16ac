// Shared test doubles for the API collaborators.
// - records every call with its operation name and username
// - optional failure injection, per operation or global
// - optional artificial latency
// - tracks the concurrency high-water mark across in-flight calls

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::client::{ApiResponse, BioAuthApi, HealthStatus, MetricsQuery};
use crate::error::LoadSimError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub username: String,
}

pub struct MockApiClient {
    pub calls: Mutex<Vec<RecordedCall>>,
    /// Operations that answer HTTP 500 instead of 200.
    failing_ops: Mutex<HashSet<&'static str>>,
    /// Usernames whose calls all answer HTTP 500.
    failing_users: Mutex<HashSet<String>>,
    /// When set, health() reports unreachable.
    health_down: Mutex<bool>,
    /// Artificial per-call latency.
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

impl MockApiClient {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_ops: Mutex::new(HashSet::new()),
            failing_users: Mutex::new(HashSet::new()),
            health_down: Mutex::new(false),
            delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    pub fn fail_operation(&self, operation: &'static str) {
        self.failing_ops.lock().unwrap().insert(operation);
    }

    pub fn fail_user(&self, username: &str) {
        self.failing_users.lock().unwrap().insert(username.to_string());
    }

    pub fn set_health_down(&self, down: bool) {
        *self.health_down.lock().unwrap() = down;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Largest number of calls that were ever in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    async fn record(
        &self,
        operation: &'static str,
        username: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        self.calls.lock().unwrap().push(RecordedCall {
            operation,
            username: username.to_string(),
        });

        let fail = self.failing_ops.lock().unwrap().contains(operation)
            || self.failing_users.lock().unwrap().contains(username);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            Ok(ApiResponse {
                status: 500,
                body: json!({"error": "injected failure"}),
            })
        } else {
            Ok(ApiResponse {
                status: 200,
                body: json!({"ok": true}),
            })
        }
    }
}

impl Default for MockApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BioAuthApi for MockApiClient {
    async fn begin_webauthn_registration(
        &self,
        username: &str,
        _display_name: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.record("webauthn_register_begin", username).await
    }

    async fn begin_webauthn_authentication(
        &self,
        username: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.record("webauthn_authenticate_begin", username).await
    }

    async fn generate_qr(
        &self,
        username: &str,
        _payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.record("qr_generate", username).await
    }

    async fn validate_qr(
        &self,
        username: &str,
        _payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.record("qr_validate", username).await
    }

    async fn recognize_fingerprint(
        &self,
        username: &str,
        _payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.record("fingerprint_recognize", username).await
    }

    async fn recognize_face(
        &self,
        username: &str,
        _payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.record("face_recognize", username).await
    }

    async fn health(&self) -> Result<HealthStatus, LoadSimError> {
        if *self.health_down.lock().unwrap() {
            return Err(LoadSimError::NetworkError(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(HealthStatus {
            healthy: true,
            backing_store_ok: true,
            uptime_secs: Some(1.0),
        })
    }

    async fn metrics_text(&self) -> Result<String, LoadSimError> {
        Ok(concat!(
            "# HELP biometric_auth_attempts_total Total authentication attempts\n",
            "# TYPE biometric_auth_attempts_total counter\n",
            "biometric_auth_attempts_total{method=\"webauthn\"} 12\n",
            "biometric_auth_attempts_total{method=\"face\"} 7\n",
            "process_cpu_seconds_total 1.5\n",
        )
        .to_string())
    }
}

/// Metrics query double answering a fixed series count.
pub struct MockMetricsQuery {
    pub result_count: usize,
    pub queried: Mutex<Vec<String>>,
}

impl MockMetricsQuery {
    pub fn new(result_count: usize) -> Self {
        Self {
            result_count,
            queried: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MetricsQuery for MockMetricsQuery {
    async fn query(&self, metric: &str) -> Result<usize, LoadSimError> {
        self.queried.lock().unwrap().push(metric.to_string());
        Ok(self.result_count)
    }
}
