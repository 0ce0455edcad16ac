// Minimal HTTP/1.1 client over tokio TCP.
//
// One connection per request with Connection: close framing, so the
// response body is simply everything after the header block. Each request
// runs under its own deadline, shorter than the dispatcher's per-task
// timeout, so an unresponsive target cannot pin a session slot.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::client::{ApiResponse, BioAuthApi, HealthStatus};
use crate::config::Config;
use crate::error::LoadSimError;

/// HTTP implementation of the BioAuthApi collaborator.
pub struct HttpApiClient {
    host: String,
    port: u16,
    base_path: String,
    call_timeout: Duration,
}

impl HttpApiClient {
    pub fn new(host: &str, port: u16, base_path: &str, call_timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            base_path: base_path.trim_end_matches('/').to_string(),
            call_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.api_host,
            config.api_port,
            &config.api_base_path,
            config.per_call_timeout(),
        )
    }

    async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, LoadSimError> {
        let path = format!("{}{}", self.base_path, path);
        let raw = execute(
            &self.host,
            self.port,
            "POST",
            &path,
            Some(&body),
            self.call_timeout,
        )
        .await?;
        parse_response(&raw)
    }

    async fn get(&self, path: &str) -> Result<ApiResponse, LoadSimError> {
        let path = format!("{}{}", self.base_path, path);
        let raw = execute(&self.host, self.port, "GET", &path, None, self.call_timeout).await?;
        parse_response(&raw)
    }
}

#[async_trait]
impl BioAuthApi for HttpApiClient {
    async fn begin_webauthn_registration(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.post(
            "/webauthn/register/begin",
            json!({ "username": username, "displayName": display_name }),
        )
        .await
    }

    async fn begin_webauthn_authentication(
        &self,
        username: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.post(
            "/webauthn/authenticate/begin",
            json!({ "username": username }),
        )
        .await
    }

    async fn generate_qr(
        &self,
        username: &str,
        payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.post("/qr/generate", json!({ "username": username, "data": payload }))
            .await
    }

    async fn validate_qr(
        &self,
        username: &str,
        payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.post(
            "/qr/validate",
            json!({ "username": username, "qrData": payload }),
        )
        .await
    }

    async fn recognize_fingerprint(
        &self,
        username: &str,
        payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.post(
            "/fingerprint/recognize",
            json!({ "username": username, "fingerprintData": payload }),
        )
        .await
    }

    async fn recognize_face(
        &self,
        username: &str,
        payload: &str,
    ) -> Result<ApiResponse, LoadSimError> {
        self.post(
            "/face/recognize",
            json!({ "username": username, "faceData": payload }),
        )
        .await
    }

    async fn health(&self) -> Result<HealthStatus, LoadSimError> {
        let resp = self.get("/health").await?;
        Ok(HealthStatus {
            healthy: resp.is_success(),
            backing_store_ok: resp
                .body
                .get("redis")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            uptime_secs: resp.body.get("uptime").and_then(Value::as_f64),
        })
    }

    async fn metrics_text(&self) -> Result<String, LoadSimError> {
        let path = format!("{}/metrics", self.base_path);
        let raw = execute(&self.host, self.port, "GET", &path, None, self.call_timeout).await?;
        let (status, body) = split_response(&raw)?;
        if status != 200 {
            return Err(LoadSimError::HttpError(format!(
                "metrics endpoint answered {}",
                status
            )));
        }
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

/// Issue one request and return the raw response bytes, under a deadline.
pub(crate) async fn execute(
    host: &str,
    port: u16,
    method: &str,
    path: &str,
    body: Option<&Value>,
    deadline: Duration,
) -> Result<Vec<u8>, LoadSimError> {
    tokio::time::timeout(deadline, execute_inner(host, port, method, path, body))
        .await
        .map_err(|_| LoadSimError::Timeout(format!("{} {}", method, path)))?
}

async fn execute_inner(
    host: &str,
    port: u16,
    method: &str,
    path: &str,
    body: Option<&Value>,
) -> Result<Vec<u8>, LoadSimError> {
    let mut stream = TcpStream::connect((host, port)).await?;

    let payload = body.map(|v| v.to_string()).unwrap_or_default();
    let mut request = format!(
        "{} {} HTTP/1.1\r\nHost: {}:{}\r\nConnection: close\r\nAccept: application/json\r\n",
        method, path, host, port
    );
    if !payload.is_empty() {
        request.push_str("Content-Type: application/json\r\n");
        request.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    request.push_str("\r\n");
    request.push_str(&payload);

    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::with_capacity(4096);
    stream.read_to_end(&mut raw).await?;
    Ok(raw)
}

/// Split raw response bytes into (status code, body bytes).
pub(crate) fn split_response(raw: &[u8]) -> Result<(u16, &[u8]), LoadSimError> {
    let header_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| LoadSimError::HttpError("missing header terminator".to_string()))?;
    let head = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| LoadSimError::HttpError("non-UTF8 response head".to_string()))?;

    // Status line: HTTP/1.1 200 OK
    let status_line = head
        .lines()
        .next()
        .ok_or_else(|| LoadSimError::HttpError("empty response".to_string()))?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| {
            LoadSimError::HttpError(format!("malformed status line: {}", status_line))
        })?;

    Ok((status, &raw[header_end + 4..]))
}

/// Parse raw response bytes into an ApiResponse with a JSON body.
/// Non-JSON bodies are carried as strings; empty bodies as null.
pub(crate) fn parse_response(raw: &[u8]) -> Result<ApiResponse, LoadSimError> {
    let (status, body) = split_response(raw)?;
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
    };
    Ok(ApiResponse { status, body })
}
