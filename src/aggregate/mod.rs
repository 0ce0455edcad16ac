// Result aggregator module
//
// Folds per-session outcomes into one report. Refuses to aggregate when
// the outcome count does not match the dispatched population; a silent
// partial report would hide lost sessions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LoadSimError;
use crate::session::SessionOutcome;

/// Per-variant slice of the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantStats {
    pub total: u64,
    pub succeeded: u64,
}

/// One failed session, kept for the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub user_id: u32,
    pub username: String,
    pub error: Option<String>,
}

/// The whole run, summarized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub total_sessions: u64,
    pub successful_sessions: u64,
    pub failed_sessions: u64,
    /// Percentage in [0, 100]. Exactly 100.0 when every session succeeded.
    pub success_rate: f64,
    pub avg_session_ms: u64,
    pub max_session_ms: u64,
    pub by_variant: BTreeMap<String, VariantStats>,
    pub failures: Vec<FailureDetail>,
}

pub struct ResultAggregator;

impl ResultAggregator {
    /// Aggregate outcomes for a batch that dispatched `expected` users.
    pub fn aggregate(
        expected: usize,
        outcomes: &[SessionOutcome],
    ) -> Result<AggregateReport, LoadSimError> {
        if outcomes.len() != expected {
            return Err(LoadSimError::ConfigMismatch {
                expected,
                actual: outcomes.len(),
            });
        }

        let total = outcomes.len() as u64;
        let succeeded = outcomes.iter().filter(|o| o.success).count() as u64;
        let failed = total - succeeded;
        let success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 * 100.0 / total as f64
        };

        let durations: Vec<u64> = outcomes.iter().map(|o| o.duration_ms).collect();
        let avg_session_ms = if durations.is_empty() {
            0
        } else {
            durations.iter().sum::<u64>() / durations.len() as u64
        };
        let max_session_ms = durations.iter().copied().max().unwrap_or(0);

        let mut by_variant: BTreeMap<String, VariantStats> = BTreeMap::new();
        for outcome in outcomes {
            let entry = by_variant
                .entry(outcome.variant.name().to_string())
                .or_default();
            entry.total += 1;
            if outcome.success {
                entry.succeeded += 1;
            }
        }

        let failures = outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| FailureDetail {
                user_id: o.user_id,
                username: o.username.clone(),
                error: o.error.clone(),
            })
            .collect();

        Ok(AggregateReport {
            total_sessions: total,
            successful_sessions: succeeded,
            failed_sessions: failed,
            success_rate,
            avg_session_ms,
            max_session_ms,
            by_variant,
            failures,
        })
    }
}
