//! Server metrics for Prometheus
//!
//! Tracks requests per key-value operation and renders them together with
//! the cache coordinator's counters in the Prometheus text format.

use kvcache_cache::StatsSnapshot;
use kvcache_common::CacheMode;
use std::fmt::{Display, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Key-value operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvOperation {
    Create,
    Read,
    Update,
    Delete,
}

impl KvOperation {
    pub const ALL: [Self; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            KvOperation::Create => "create",
            KvOperation::Read => "read",
            KvOperation::Update => "update",
            KvOperation::Delete => "delete",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Per-operation metrics
#[derive(Debug, Default)]
struct OperationMetrics {
    requests_total: AtomicU64,
    /// Requests that ended in an error response (including expected ones)
    requests_failed: AtomicU64,
    /// Total latency in microseconds
    latency_us_total: AtomicU64,
}

/// Request metrics for the HTTP surface
#[derive(Debug)]
pub struct ServerMetrics {
    start_time: Instant,
    operations: [OperationMetrics; 4],
    deferred_flush_failures_reported: AtomicU64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            operations: Default::default(),
            deferred_flush_failures_reported: AtomicU64::new(0),
        }
    }

    /// Record one completed request
    pub fn record(&self, op: KvOperation, success: bool, started: Instant) {
        let m = &self.operations[op.index()];
        m.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            m.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        m.latency_us_total.fetch_add(micros, Ordering::Relaxed);
    }

    /// Count flush failures handed to clients
    pub fn record_flush_failures_reported(&self, count: usize) {
        if count > 0 {
            self.deferred_flush_failures_reported
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn requests_total(&self, op: KvOperation) -> u64 {
        self.operations[op.index()]
            .requests_total
            .load(Ordering::Relaxed)
    }

    pub fn requests_failed(&self, op: KvOperation) -> u64 {
        self.operations[op.index()]
            .requests_failed
            .load(Ordering::Relaxed)
    }

    /// Export all metrics in Prometheus text format
    pub fn export_prometheus(&self, cache: &StatsSnapshot, mode: CacheMode) -> String {
        let mut output = String::with_capacity(4 * 1024);

        write_metric(
            &mut output,
            "kvcache_uptime_seconds",
            "Server uptime in seconds",
            "counter",
            self.start_time.elapsed().as_secs(),
        );

        let _ = writeln!(output, "# HELP kvcache_cache_info Cache configuration");
        let _ = writeln!(output, "# TYPE kvcache_cache_info gauge");
        let _ = writeln!(output, "kvcache_cache_info{{mode=\"{mode}\"}} 1");

        write_metric(&mut output, "kvcache_cache_capacity", "Maximum cached entries", "gauge", cache.capacity);
        write_metric(&mut output, "kvcache_cache_entries", "Entries currently cached", "gauge", cache.entries);
        write_metric(&mut output, "kvcache_cache_dirty_entries", "Cached entries not yet written to the store", "gauge", cache.dirty);
        write_metric(&mut output, "kvcache_cache_hits_total", "Reads served from the cache", "counter", cache.hits);
        write_metric(&mut output, "kvcache_cache_misses_total", "Reads that went to the backing store", "counter", cache.misses);
        write_metric(&mut output, "kvcache_cache_hit_ratio", "Cache hit ratio (0.0 to 1.0)", "gauge", format!("{:.4}", cache.hit_ratio));
        write_metric(&mut output, "kvcache_cache_evictions_total", "Entries evicted on overflow", "counter", cache.evictions);
        write_metric(&mut output, "kvcache_cache_writebacks_total", "Dirty entries written back to the store", "counter", cache.writebacks);
        write_metric(&mut output, "kvcache_cache_flush_failures_total", "Dirty entries whose write-back failed", "counter", cache.flush_failures);
        write_metric(
            &mut output,
            "kvcache_deferred_flush_failures_reported_total",
            "Flush failures reported to clients",
            "counter",
            self.deferred_flush_failures_reported.load(Ordering::Relaxed),
        );

        let _ = writeln!(output, "# HELP kvcache_requests_total Requests per operation");
        let _ = writeln!(output, "# TYPE kvcache_requests_total counter");
        for op in KvOperation::ALL {
            let _ = writeln!(
                output,
                "kvcache_requests_total{{operation=\"{}\"}} {}",
                op.as_str(),
                self.requests_total(op)
            );
        }

        let _ = writeln!(output, "# HELP kvcache_requests_failed_total Error responses per operation");
        let _ = writeln!(output, "# TYPE kvcache_requests_failed_total counter");
        for op in KvOperation::ALL {
            let _ = writeln!(
                output,
                "kvcache_requests_failed_total{{operation=\"{}\"}} {}",
                op.as_str(),
                self.requests_failed(op)
            );
        }

        let _ = writeln!(output, "# HELP kvcache_request_latency_seconds_sum Total request latency per operation");
        let _ = writeln!(output, "# TYPE kvcache_request_latency_seconds_sum counter");
        for op in KvOperation::ALL {
            let micros = self.operations[op.index()]
                .latency_us_total
                .load(Ordering::Relaxed);
            let _ = writeln!(
                output,
                "kvcache_request_latency_seconds_sum{{operation=\"{}\"}} {:.6}",
                op.as_str(),
                micros as f64 / 1_000_000.0
            );
        }

        output
    }
}

fn write_metric(output: &mut String, name: &str, help: &str, kind: &str, value: impl Display) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {kind}");
    let _ = writeln!(output, "{name} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            hits: 3,
            misses: 1,
            evictions: 2,
            writebacks: 1,
            flush_failures: 1,
            entries: 4,
            dirty: 2,
            capacity: 10,
            hit_ratio: 0.75,
        }
    }

    #[test]
    fn test_record_counts_failures() {
        let metrics = ServerMetrics::new();
        metrics.record(KvOperation::Read, true, Instant::now());
        metrics.record(KvOperation::Read, false, Instant::now());
        metrics.record(KvOperation::Create, true, Instant::now());

        assert_eq!(metrics.requests_total(KvOperation::Read), 2);
        assert_eq!(metrics.requests_failed(KvOperation::Read), 1);
        assert_eq!(metrics.requests_total(KvOperation::Create), 1);
        assert_eq!(metrics.requests_total(KvOperation::Delete), 0);
    }

    #[test]
    fn test_export_prometheus() {
        let metrics = ServerMetrics::new();
        metrics.record(KvOperation::Update, false, Instant::now());
        metrics.record_flush_failures_reported(2);

        let text = metrics.export_prometheus(&snapshot(), CacheMode::WriteBack);
        assert!(text.contains("kvcache_cache_info{mode=\"write-back\"} 1"));
        assert!(text.contains("kvcache_cache_entries 4"));
        assert!(text.contains("kvcache_cache_hit_ratio 0.7500"));
        assert!(text.contains("kvcache_cache_flush_failures_total 1"));
        assert!(text.contains("kvcache_deferred_flush_failures_reported_total 2"));
        assert!(text.contains("kvcache_requests_failed_total{operation=\"update\"} 1"));
        assert!(text.contains("# TYPE kvcache_requests_total counter"));
    }
}
