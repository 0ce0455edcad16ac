#[derive(Debug, thiserror::Error)]
pub enum LoadSimError {
    #[error("Network error: {0}")]
    NetworkError(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Outcome count mismatch: expected {expected}, got {actual}")]
    ConfigMismatch { expected: usize, actual: usize },
    #[error("Preflight health check failed: {0}")]
    PreflightFailed(String),
    #[error("Timed out: {0}")]
    Timeout(String),
}
