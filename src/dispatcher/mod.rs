// Task dispatcher module
//
// Fans a batch of simulated users out across tokio tasks, never letting
// more than the configured limit run at once. The semaphore permit is
// acquired before the spawn, so the spawn rate itself is bounded. Each
// task carries its own deadline; on expiry the session future is dropped,
// which cancels any in-flight API call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::session::{SessionOutcome, SessionSimulator};
use crate::stats::StatsCollector;
use crate::users::SimulatedUser;

pub struct TaskDispatcher {
    simulator: Arc<SessionSimulator>,
    stats: Arc<StatsCollector>,
    concurrency_limit: usize,
    task_timeout: Duration,
}

impl TaskDispatcher {
    pub fn new(
        simulator: Arc<SessionSimulator>,
        stats: Arc<StatsCollector>,
        config: &Config,
    ) -> Self {
        Self {
            simulator,
            stats,
            concurrency_limit: config.concurrency_limit,
            task_timeout: config.per_task_timeout(),
        }
    }

    /// Run every user's session and return exactly one outcome per user,
    /// in input order. Timeouts and panicked tasks become failure
    /// outcomes rather than being dropped.
    pub async fn run_batch(&self, users: Vec<SimulatedUser>) -> Vec<SessionOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut handles = Vec::with_capacity(users.len());

        for user in users {
            // Never closed, so acquisition only fails on shutdown of the
            // semaphore itself.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let simulator = Arc::clone(&self.simulator);
            let stats = Arc::clone(&self.stats);
            let timeout = self.task_timeout;
            let task_user = user.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match tokio::time::timeout(timeout, simulator.run(&task_user)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        stats.record_timeout();
                        SessionOutcome::aborted(
                            &task_user,
                            format!(
                                "session for {} timed out after {:?}",
                                task_user.username, timeout
                            ),
                        )
                    }
                }
            });
            handles.push((user, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (user, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_err) => {
                    outcomes.push(SessionOutcome::aborted(
                        &user,
                        format!("session task for {} aborted: {}", user.username, join_err),
                    ));
                }
            }
        }
        outcomes
    }
}
