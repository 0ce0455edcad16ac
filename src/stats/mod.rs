// Statistics collector module

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::behavior::AuthMethod;

/// Thread-safe statistics collector using atomic operations.
/// Latency recording uses sharded buffers to reduce lock contention
/// under high concurrency.
pub struct StatsCollector {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    active_sessions: AtomicU64,
    timeouts: AtomicU64,
    network_failures: AtomicU64,
    status_codes: DashMap<u16, AtomicU64>,
    method_calls: DashMap<&'static str, AtomicU64>,
    latency_shards: Vec<Mutex<Vec<Duration>>>,
    shard_count: usize,
    start_time: Instant,
}

/// A point-in-time snapshot of collected statistics.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub timestamp: Instant,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub active_sessions: u64,
    pub timeouts: u64,
    pub network_failures: u64,
    pub calls_per_sec: f64,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p95: Duration,
    pub latency_p99: Duration,
    pub status_codes: HashMap<u16, u64>,
    pub method_calls: HashMap<&'static str, u64>,
}

impl StatsCollector {
    /// Create a new StatsCollector.
    pub fn new() -> Self {
        let shard_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let latency_shards = (0..shard_count)
            .map(|_| Mutex::new(Vec::new()))
            .collect();
        Self {
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            network_failures: AtomicU64::new(0),
            status_codes: DashMap::new(),
            method_calls: DashMap::new(),
            latency_shards,
            shard_count,
            start_time: Instant::now(),
        }
    }

    /// Record a completed API call with its status code and latency.
    /// Counts as success only for 200/201.
    pub fn record_call(&self, method: AuthMethod, status_code: u16, latency: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if matches!(status_code, 200 | 201) {
            self.successful_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }
        self.status_codes
            .entry(status_code)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        self.method_calls
            .entry(method.name())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        let idx = self.shard_index();
        self.latency_shards[idx].lock().unwrap().push(latency);
    }

    /// Select a shard based on the current thread ID.
    fn shard_index(&self) -> usize {
        let thread_id = std::thread::current().id();
        let hash = format!("{:?}", thread_id);
        let mut h: usize = 0;
        for b in hash.bytes() {
            h = h.wrapping_mul(31).wrapping_add(b as usize);
        }
        h % self.shard_count
    }

    /// Record a call that never produced a response.
    pub fn record_failure(&self, method: AuthMethod) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
        self.method_calls
            .entry(method.name())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a per-call or per-task deadline expiry.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transport-level failure (connect, read, write).
    pub fn record_network_failure(&self) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the running-session count.
    pub fn increment_active_sessions(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the running-session count.
    pub fn decrement_active_sessions(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Take a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let total = self.total_calls.load(Ordering::Relaxed);
        let elapsed = now.duration_since(self.start_time).as_secs_f64();
        let calls_per_sec = if elapsed > 0.0 {
            total as f64 / elapsed
        } else {
            0.0
        };

        // Merge all shards into a single Vec for percentile calculation
        let mut all_latencies = Vec::new();
        for shard in &self.latency_shards {
            let guard = shard.lock().unwrap();
            all_latencies.extend_from_slice(&guard);
        }
        let (p50, p90, p95, p99) = calculate_percentiles(&all_latencies);

        let mut status_map = HashMap::new();
        for entry in self.status_codes.iter() {
            status_map.insert(*entry.key(), entry.value().load(Ordering::Relaxed));
        }
        let mut method_map = HashMap::new();
        for entry in self.method_calls.iter() {
            method_map.insert(*entry.key(), entry.value().load(Ordering::Relaxed));
        }

        StatsSnapshot {
            timestamp: now,
            total_calls: total,
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            calls_per_sec,
            latency_p50: p50,
            latency_p90: p90,
            latency_p95: p95,
            latency_p99: p99,
            status_codes: status_map,
            method_calls: method_map,
        }
    }

    /// Display a formatted stats snapshot to stdout.
    pub fn display_snapshot(snapshot: &StatsSnapshot) {
        println!("--- Stats Snapshot ---");
        println!(
            "Total: {} | Success: {} | Failed: {} | Active: {}",
            snapshot.total_calls,
            snapshot.successful_calls,
            snapshot.failed_calls,
            snapshot.active_sessions
        );
        println!(
            "Calls/s: {:.1} | Timeouts: {} | Network failures: {}",
            snapshot.calls_per_sec, snapshot.timeouts, snapshot.network_failures
        );
        println!(
            "Latency p50: {:.1}ms | p90: {:.1}ms | p95: {:.1}ms | p99: {:.1}ms",
            snapshot.latency_p50.as_secs_f64() * 1000.0,
            snapshot.latency_p90.as_secs_f64() * 1000.0,
            snapshot.latency_p95.as_secs_f64() * 1000.0,
            snapshot.latency_p99.as_secs_f64() * 1000.0,
        );
        if !snapshot.status_codes.is_empty() {
            let mut codes: Vec<_> = snapshot.status_codes.iter().collect();
            codes.sort_by_key(|(k, _)| *k);
            let code_strs: Vec<String> =
                codes.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
            println!("Status Codes: {}", code_strs.join(" | "));
        }
        println!("---------------------");
    }

    /// Display a final call-level summary.
    pub fn display_final_summary(snapshot: &StatsSnapshot) {
        println!("=== Call Statistics ===");
        println!("Total Calls:      {}", snapshot.total_calls);
        println!("Successful Calls: {}", snapshot.successful_calls);
        println!("Failed Calls:     {}", snapshot.failed_calls);
        println!("Timeouts:         {}", snapshot.timeouts);
        println!("Network Failures: {}", snapshot.network_failures);
        println!("Average Calls/s:  {:.1}", snapshot.calls_per_sec);
        println!(
            "Latency p50: {:.1}ms | p90: {:.1}ms | p95: {:.1}ms | p99: {:.1}ms",
            snapshot.latency_p50.as_secs_f64() * 1000.0,
            snapshot.latency_p90.as_secs_f64() * 1000.0,
            snapshot.latency_p95.as_secs_f64() * 1000.0,
            snapshot.latency_p99.as_secs_f64() * 1000.0,
        );
        if !snapshot.method_calls.is_empty() {
            println!("Calls by Method:");
            let mut methods: Vec<_> = snapshot.method_calls.iter().collect();
            methods.sort_by_key(|(k, _)| *k);
            for (method, count) in &methods {
                println!("  {}: {}", method, count);
            }
        }
        if !snapshot.status_codes.is_empty() {
            println!("Status Code Distribution:");
            let mut codes: Vec<_> = snapshot.status_codes.iter().collect();
            codes.sort_by_key(|(k, _)| *k);
            for (code, count) in &codes {
                println!("  {}: {}", code, count);
            }
        }
        println!("=======================");
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate percentiles from a slice of durations.
/// Returns (p50, p90, p95, p99). Returns Duration::ZERO for empty input.
pub fn calculate_percentiles(latencies: &[Duration]) -> (Duration, Duration, Duration, Duration) {
    if latencies.is_empty() {
        return (
            Duration::ZERO,
            Duration::ZERO,
            Duration::ZERO,
            Duration::ZERO,
        );
    }

    let mut sorted = latencies.to_vec();
    sorted.sort();

    let len = sorted.len();
    let p50 = percentile_at(&sorted, len, 50.0);
    let p90 = percentile_at(&sorted, len, 90.0);
    let p95 = percentile_at(&sorted, len, 95.0);
    let p99 = percentile_at(&sorted, len, 99.0);

    (p50, p90, p95, p99)
}

/// Get the value at a given percentile from a sorted slice using nearest-rank method.
fn percentile_at(sorted: &[Duration], len: usize, pct: f64) -> Duration {
    if len == 1 {
        return sorted[0];
    }
    // Nearest-rank: index = ceil(pct/100 * len) - 1
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(len - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // ===== Unit Tests =====

    #[test]
    fn test_new_collector_has_zero_values() {
        let collector = StatsCollector::new();
        let snap = collector.snapshot();
        assert_eq!(snap.total_calls, 0);
        assert_eq!(snap.successful_calls, 0);
        assert_eq!(snap.failed_calls, 0);
        assert_eq!(snap.active_sessions, 0);
        assert_eq!(snap.timeouts, 0);
        assert_eq!(snap.network_failures, 0);
        assert!(snap.status_codes.is_empty());
        assert!(snap.method_calls.is_empty());
        assert_eq!(snap.latency_p50, Duration::ZERO);
        assert_eq!(snap.latency_p99, Duration::ZERO);
    }

    #[test]
    fn test_record_call_classifies_by_status() {
        let collector = StatsCollector::new();
        collector.record_call(AuthMethod::WebAuthn, 200, Duration::from_millis(10));
        collector.record_call(AuthMethod::Qr, 201, Duration::from_millis(20));
        collector.record_call(AuthMethod::Face, 500, Duration::from_millis(5));

        let snap = collector.snapshot();
        assert_eq!(snap.total_calls, 3);
        assert_eq!(snap.successful_calls, 2);
        assert_eq!(snap.failed_calls, 1);
        assert_eq!(*snap.status_codes.get(&200).unwrap(), 1);
        assert_eq!(*snap.status_codes.get(&201).unwrap(), 1);
        assert_eq!(*snap.status_codes.get(&500).unwrap(), 1);
    }

    #[test]
    fn test_record_call_tracks_methods() {
        let collector = StatsCollector::new();
        collector.record_call(AuthMethod::WebAuthn, 200, Duration::from_millis(1));
        collector.record_call(AuthMethod::WebAuthn, 200, Duration::from_millis(1));
        collector.record_call(AuthMethod::Fingerprint, 200, Duration::from_millis(1));

        let snap = collector.snapshot();
        assert_eq!(*snap.method_calls.get("webauthn").unwrap(), 2);
        assert_eq!(*snap.method_calls.get("fingerprint").unwrap(), 1);
        assert!(snap.method_calls.get("face").is_none());
    }

    #[test]
    fn test_record_failure_increments_counters() {
        let collector = StatsCollector::new();
        collector.record_failure(AuthMethod::Face);
        collector.record_failure(AuthMethod::Face);

        let snap = collector.snapshot();
        assert_eq!(snap.total_calls, 2);
        assert_eq!(snap.failed_calls, 2);
        assert_eq!(snap.successful_calls, 0);
        assert_eq!(*snap.method_calls.get("face").unwrap(), 2);
    }

    #[test]
    fn test_timeout_and_network_failure_counters_are_independent() {
        let collector = StatsCollector::new();
        collector.record_timeout();
        collector.record_timeout();
        collector.record_network_failure();

        let snap = collector.snapshot();
        assert_eq!(snap.timeouts, 2);
        assert_eq!(snap.network_failures, 1);
        assert_eq!(snap.total_calls, 0);
    }

    #[test]
    fn test_active_sessions_increment_decrement() {
        let collector = StatsCollector::new();
        collector.increment_active_sessions();
        collector.increment_active_sessions();
        collector.increment_active_sessions();
        assert_eq!(collector.snapshot().active_sessions, 3);

        collector.decrement_active_sessions();
        assert_eq!(collector.snapshot().active_sessions, 2);
    }

    #[test]
    fn test_percentile_empty_latencies() {
        let (p50, p90, p95, p99) = calculate_percentiles(&[]);
        assert_eq!(p50, Duration::ZERO);
        assert_eq!(p90, Duration::ZERO);
        assert_eq!(p95, Duration::ZERO);
        assert_eq!(p99, Duration::ZERO);
    }

    #[test]
    fn test_percentile_single_element() {
        let latencies = vec![Duration::from_millis(42)];
        let (p50, p90, p95, p99) = calculate_percentiles(&latencies);
        assert_eq!(p50, Duration::from_millis(42));
        assert_eq!(p90, Duration::from_millis(42));
        assert_eq!(p95, Duration::from_millis(42));
        assert_eq!(p99, Duration::from_millis(42));
    }

    #[test]
    fn test_percentile_known_distribution() {
        // 100 values: 1ms, 2ms, ..., 100ms
        let latencies: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        let (p50, p90, p95, p99) = calculate_percentiles(&latencies);

        assert_eq!(p50, Duration::from_millis(50));
        assert_eq!(p90, Duration::from_millis(90));
        assert_eq!(p95, Duration::from_millis(95));
        assert_eq!(p99, Duration::from_millis(99));
    }

    #[test]
    fn test_percentile_unsorted_input() {
        // Verify that calculate_percentiles sorts internally
        let latencies = vec![
            Duration::from_millis(100),
            Duration::from_millis(1),
            Duration::from_millis(50),
            Duration::from_millis(75),
            Duration::from_millis(25),
        ];
        let (p50, p90, p95, p99) = calculate_percentiles(&latencies);

        // Sorted: [1, 25, 50, 75, 100] (len=5)
        // nearest-rank: idx = ceil(pct/100 * 5) - 1
        assert_eq!(p50, Duration::from_millis(50));
        assert_eq!(p90, Duration::from_millis(100));
        assert_eq!(p95, Duration::from_millis(100));
        assert_eq!(p99, Duration::from_millis(100));
    }

    #[test]
    fn test_snapshot_rate_is_non_negative() {
        let collector = StatsCollector::new();
        collector.record_call(AuthMethod::Qr, 200, Duration::from_millis(10));
        let snap = collector.snapshot();
        assert!(snap.calls_per_sec >= 0.0);
    }

    #[test]
    fn test_display_does_not_panic() {
        let collector = StatsCollector::new();
        collector.record_call(AuthMethod::WebAuthn, 200, Duration::from_millis(10));
        collector.record_call(AuthMethod::Face, 404, Duration::from_millis(20));
        collector.record_failure(AuthMethod::Qr);
        collector.record_timeout();
        collector.increment_active_sessions();

        let snap = collector.snapshot();
        StatsCollector::display_snapshot(&snap);
        StatsCollector::display_final_summary(&snap);

        let empty = StatsCollector::new().snapshot();
        StatsCollector::display_snapshot(&empty);
        StatsCollector::display_final_summary(&empty);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let collector = Arc::new(StatsCollector::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let c = Arc::clone(&collector);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    c.record_call(AuthMethod::WebAuthn, 200, Duration::from_millis(5));
                    c.increment_active_sessions();
                    c.decrement_active_sessions();
                }
            }));
        }

        for _ in 0..5 {
            let c = Arc::clone(&collector);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    c.record_failure(AuthMethod::Qr);
                    c.record_timeout();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let snap = collector.snapshot();
        assert_eq!(snap.total_calls, 10 * 100 + 5 * 100);
        assert_eq!(snap.successful_calls, 1000);
        assert_eq!(snap.failed_calls, 500);
        assert_eq!(snap.timeouts, 500);
        assert_eq!(snap.active_sessions, 0);
    }

    #[test]
    fn test_sharding_produces_same_percentiles_as_single_vec() {
        // Record latencies via the sharded StatsCollector and verify
        // the snapshot percentiles match calculate_percentiles on the same data
        let durations: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();

        let collector = StatsCollector::new();
        for &d in &durations {
            collector.record_call(AuthMethod::Fingerprint, 200, d);
        }

        let snap = collector.snapshot();
        let (exp_p50, exp_p90, exp_p95, exp_p99) = calculate_percentiles(&durations);

        assert_eq!(snap.latency_p50, exp_p50);
        assert_eq!(snap.latency_p90, exp_p90);
        assert_eq!(snap.latency_p95, exp_p95);
        assert_eq!(snap.latency_p99, exp_p99);
    }

    #[test]
    fn test_shard_count_is_positive() {
        let collector = StatsCollector::new();
        assert!(collector.shard_count > 0, "shard_count must be at least 1");
    }

    // ===== Property-Based Tests =====

    use proptest::collection::vec;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_latency_percentile_matches_nearest_rank(
            latencies_ms in vec(1u64..10_000, 1..200)
        ) {
            let latencies: Vec<Duration> = latencies_ms.iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect();

            let (p50, p90, p95, p99) = calculate_percentiles(&latencies);

            let mut sorted: Vec<Duration> = latencies.clone();
            sorted.sort();
            let len = sorted.len();

            // Nearest-rank method: index = ceil(pct/100 * len) - 1
            let expected_p50 = sorted[(50.0_f64 / 100.0 * len as f64).ceil() as usize - 1];
            let expected_p90 = sorted[(90.0_f64 / 100.0 * len as f64).ceil() as usize - 1];
            let expected_p95 = sorted[(95.0_f64 / 100.0 * len as f64).ceil() as usize - 1];
            let expected_p99 = sorted[((99.0_f64 / 100.0 * len as f64).ceil() as usize - 1).min(len - 1)];

            prop_assert_eq!(p50, expected_p50, "p50 mismatch for len={}", len);
            prop_assert_eq!(p90, expected_p90, "p90 mismatch for len={}", len);
            prop_assert_eq!(p95, expected_p95, "p95 mismatch for len={}", len);
            prop_assert_eq!(p99, expected_p99, "p99 mismatch for len={}", len);
        }
    }

    proptest! {
        #[test]
        fn prop_status_code_aggregation(
            codes in vec(100u16..700, 1..200)
        ) {
            let collector = StatsCollector::new();

            for &code in &codes {
                collector.record_call(AuthMethod::WebAuthn, code, Duration::from_millis(1));
            }

            let snap = collector.snapshot();

            let mut expected: HashMap<u16, u64> = HashMap::new();
            for &code in &codes {
                *expected.entry(code).or_insert(0) += 1;
            }

            prop_assert_eq!(snap.status_codes.len(), expected.len(),
                "number of distinct status codes mismatch");

            for (code, count) in &expected {
                let actual = snap.status_codes.get(code).copied().unwrap_or(0);
                prop_assert_eq!(actual, *count,
                    "count mismatch for status code {}", code);
            }

            // Success split must match the 200/201 rule
            let expected_success: u64 = codes.iter()
                .filter(|&&c| c == 200 || c == 201)
                .count() as u64;
            prop_assert_eq!(snap.successful_calls, expected_success);
            prop_assert_eq!(snap.failed_calls, codes.len() as u64 - expected_success);
        }
    }
}
