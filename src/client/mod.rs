// Network collaborator module
//
// The engine never talks HTTP directly; it goes through the BioAuthApi
// trait so tests can substitute a mock. The one HttpApiClient instance is
// shared read-mostly across all concurrent sessions behind an Arc.

mod http;
mod prometheus;

pub use http::HttpApiClient;
pub use prometheus::{MetricsQuery, PrometheusQuery};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LoadSimError;

/// Outcome of one API call: status plus parsed body. Transport failures
/// surface as `Err`; a non-2xx status is a successful transport exchange
/// and shows up here.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// The target API answers 200 or 201 on success.
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }
}

/// Health probe payload: backing-store status and uptime as reported by
/// the target. Reachability is implied by getting an answer at all.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub backing_store_ok: bool,
    pub uptime_secs: Option<f64>,
}

/// The biometric-authentication API surface the simulator exercises.
#[async_trait]
pub trait BioAuthApi: Send + Sync {
    async fn begin_webauthn_registration(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<ApiResponse, LoadSimError>;

    async fn begin_webauthn_authentication(
        &self,
        username: &str,
    ) -> Result<ApiResponse, LoadSimError>;

    async fn generate_qr(&self, username: &str, payload: &str)
        -> Result<ApiResponse, LoadSimError>;

    async fn validate_qr(&self, username: &str, payload: &str)
        -> Result<ApiResponse, LoadSimError>;

    async fn recognize_fingerprint(
        &self,
        username: &str,
        payload: &str,
    ) -> Result<ApiResponse, LoadSimError>;

    async fn recognize_face(
        &self,
        username: &str,
        payload: &str,
    ) -> Result<ApiResponse, LoadSimError>;

    async fn health(&self) -> Result<HealthStatus, LoadSimError>;

    /// Raw metrics exposition text, filterable by substring downstream.
    async fn metrics_text(&self) -> Result<String, LoadSimError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_200_and_201_are_success() {
        for status in [200, 201] {
            let resp = ApiResponse {
                status,
                body: Value::Null,
            };
            assert!(resp.is_success(), "status {} should be success", status);
        }
    }

    #[test]
    fn non_2xx_statuses_are_failure() {
        for status in [204, 301, 400, 401, 404, 500, 503] {
            let resp = ApiResponse {
                status,
                body: json!({"error": "nope"}),
            };
            assert!(!resp.is_success(), "status {} should be failure", status);
        }
    }
}
