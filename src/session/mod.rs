// Session simulator module
//
// Executes one simulated user's method plan against the API, recording
// every call in the stats collector and emitting structured step events.
// A session succeeds only when every attempted method succeeds.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::{AuthMethod, BehaviorVariant};
use crate::client::BioAuthApi;
use crate::config::{Config, DelayRangeMs};
use crate::error::LoadSimError;
use crate::stats::StatsCollector;
use crate::users::SimulatedUser;

/// Which half of a method an API call belongs to. Single-phase methods
/// only ever emit `Single`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Begin,
    Confirm,
    Single,
}

/// One structured event per API call.
#[derive(Debug, Clone)]
pub struct StepEvent {
    pub user_id: u32,
    pub username: String,
    pub method: AuthMethod,
    pub phase: StepPhase,
    pub success: bool,
    pub status: Option<u16>,
    pub latency: Duration,
    pub detail: Option<String>,
}

/// Receives session lifecycle and step events. Implementations must not
/// block; they run on the session task.
pub trait EventSink: Send + Sync {
    fn on_preflight(&self, _status: &crate::client::HealthStatus) {}
    fn on_session_start(&self, _user: &SimulatedUser) {}
    fn on_step(&self, _event: &StepEvent) {}
    fn on_session_end(&self, _outcome: &SessionOutcome) {}
}

/// Sink that discards everything.
pub struct NullSink;

impl EventSink for NullSink {}

/// Per-method result inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub method: AuthMethod,
    pub success: bool,
}

/// Terminal result of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub user_id: u32,
    pub username: String,
    pub variant: BehaviorVariant,
    pub success: bool,
    pub method_results: Vec<MethodResult>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl SessionOutcome {
    /// Outcome for a session that never completed: task timeout, panic,
    /// or cancellation. Always counts as a failure.
    pub fn aborted(user: &SimulatedUser, error: impl Into<String>) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            variant: user.variant,
            success: false,
            method_results: Vec::new(),
            duration_ms: 0,
            error: Some(error.into()),
        }
    }
}

/// Drives one user's plan. Cheap to clone per task via the shared Arcs.
pub struct SessionSimulator {
    api: Arc<dyn BioAuthApi>,
    stats: Arc<StatsCollector>,
    sink: Arc<dyn EventSink>,
    inter_step_delay: DelayRangeMs,
    inter_method_delay: DelayRangeMs,
}

/// Keeps the active-session gauge honest even when the session future is
/// dropped mid-flight by a task timeout.
struct ActiveGuard {
    stats: Arc<StatsCollector>,
}

impl ActiveGuard {
    fn new(stats: Arc<StatsCollector>) -> Self {
        stats.increment_active_sessions();
        Self { stats }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.stats.decrement_active_sessions();
    }
}

impl SessionSimulator {
    pub fn new(
        api: Arc<dyn BioAuthApi>,
        stats: Arc<StatsCollector>,
        sink: Arc<dyn EventSink>,
        config: &Config,
    ) -> Self {
        Self {
            api,
            stats,
            sink,
            inter_step_delay: config.inter_step_delay_ms,
            inter_method_delay: config.inter_method_delay_ms,
        }
    }

    /// Run the user's full method plan. Never returns Err; every failure
    /// mode folds into the outcome.
    pub async fn run(&self, user: &SimulatedUser) -> SessionOutcome {
        let started = Instant::now();
        let _guard = ActiveGuard::new(Arc::clone(&self.stats));
        self.sink.on_session_start(user);

        let mut method_results = Vec::with_capacity(user.methods.len());
        for (i, &method) in user.methods.iter().enumerate() {
            if i > 0 {
                self.pause(self.inter_method_delay).await;
            }
            let success = self.run_method(user, method).await;
            method_results.push(MethodResult { method, success });
        }

        let success = !method_results.is_empty() && method_results.iter().all(|r| r.success);
        let outcome = SessionOutcome {
            user_id: user.id,
            username: user.username.clone(),
            variant: user.variant,
            success,
            method_results,
            duration_ms: started.elapsed().as_millis() as u64,
            error: None,
        };
        self.sink.on_session_end(&outcome);
        outcome
    }

    /// Execute one method. Two-phase methods skip the confirm call when
    /// the begin call fails.
    async fn run_method(&self, user: &SimulatedUser, method: AuthMethod) -> bool {
        match method {
            AuthMethod::WebAuthn => {
                let begin = self
                    .call(
                        user,
                        method,
                        StepPhase::Begin,
                        self.api
                            .begin_webauthn_registration(&user.username, &user.display_name),
                    )
                    .await;
                if !begin {
                    return false;
                }
                self.pause(self.inter_step_delay).await;
                self.call(
                    user,
                    method,
                    StepPhase::Confirm,
                    self.api.begin_webauthn_authentication(&user.username),
                )
                .await
            }
            AuthMethod::Qr => {
                let payload = format!("auth-request-{}", user.username);
                let begin = self
                    .call(
                        user,
                        method,
                        StepPhase::Begin,
                        self.api.generate_qr(&user.username, &payload),
                    )
                    .await;
                if !begin {
                    return false;
                }
                self.pause(self.inter_step_delay).await;
                let token = format!("qr-token-{}", user.username);
                self.call(
                    user,
                    method,
                    StepPhase::Confirm,
                    self.api.validate_qr(&user.username, &token),
                )
                .await
            }
            AuthMethod::Fingerprint => {
                let sample = format!("fingerprint-sample-{}", user.username);
                self.call(
                    user,
                    method,
                    StepPhase::Single,
                    self.api.recognize_fingerprint(&user.username, &sample),
                )
                .await
            }
            AuthMethod::Face => {
                let sample = format!("face-sample-{}", user.username);
                self.call(
                    user,
                    method,
                    StepPhase::Single,
                    self.api.recognize_face(&user.username, &sample),
                )
                .await
            }
        }
    }

    /// One API call: measure latency, record stats, emit the step event.
    async fn call<F>(
        &self,
        user: &SimulatedUser,
        method: AuthMethod,
        phase: StepPhase,
        fut: F,
    ) -> bool
    where
        F: Future<Output = Result<crate::client::ApiResponse, LoadSimError>> + Send,
    {
        let started = Instant::now();
        let result = fut.await;
        let latency = started.elapsed();

        match result {
            Ok(resp) => {
                self.stats.record_call(method, resp.status, latency);
                let success = resp.is_success();
                self.sink.on_step(&StepEvent {
                    user_id: user.id,
                    username: user.username.clone(),
                    method,
                    phase,
                    success,
                    status: Some(resp.status),
                    latency,
                    detail: None,
                });
                success
            }
            Err(err) => {
                self.stats.record_failure(method);
                match &err {
                    LoadSimError::Timeout(_) => self.stats.record_timeout(),
                    LoadSimError::NetworkError(_) => self.stats.record_network_failure(),
                    _ => {}
                }
                self.sink.on_step(&StepEvent {
                    user_id: user.id,
                    username: user.username.clone(),
                    method,
                    phase,
                    success: false,
                    status: None,
                    latency,
                    detail: Some(err.to_string()),
                });
                false
            }
        }
    }

    /// Randomized pacing delay. The draw happens before the await so the
    /// future stays Send.
    async fn pause(&self, range: DelayRangeMs) {
        let delay = draw_delay(range);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn draw_delay(range: DelayRangeMs) -> Duration {
    if range.max == 0 {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(range.min..=range.max);
    Duration::from_millis(ms)
}
