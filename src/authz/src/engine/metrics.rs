//! Prometheus metrics collection for decision engine observability

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Engine performance metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineMetrics {
    /// Total number of evaluated checks
    pub total_checks: u64,

    pub allowed_decisions: u64,
    pub denied_decisions: u64,

    /// Checks rejected before evaluation
    pub validation_errors: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Latency percentiles over the sample window
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,

    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    /// Calculate cache hit rate
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Metrics collector with Prometheus-compatible export
///
/// Counters are atomics so the check path never waits on a lock; only the
/// latency window takes a short mutex.
pub struct MetricsCollector {
    total_checks: AtomicU64,
    allowed: AtomicU64,
    denied: AtomicU64,
    validation_errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    /// Recent latency samples in milliseconds
    latency_samples: Mutex<VecDeque<f64>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_window(10_000)
    }

    /// Collector keeping at most `max_samples` latency samples
    pub fn with_window(max_samples: usize) -> Self {
        Self {
            total_checks: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
            denied: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            latency_samples: Mutex::new(VecDeque::with_capacity(max_samples.min(10_000))),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an evaluated check
    pub fn record_decision(&self, allowed: bool, latency: Duration) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        if allowed {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied.fetch_add(1, Ordering::Relaxed);
        }

        let mut samples = self.latency_samples.lock();
        if samples.len() == self.max_samples {
            samples.pop_front();
        }
        samples.push_back(latency.as_secs_f64() * 1000.0);
    }

    pub fn record_validation_error(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current metrics with percentiles computed over the sample window
    pub fn snapshot(&self) -> EngineMetrics {
        let mut sorted: Vec<f64> = self.latency_samples.lock().iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let avg_latency_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };

        EngineMetrics {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            allowed_decisions: self.allowed.load(Ordering::Relaxed),
            denied_decisions: self.denied.load(Ordering::Relaxed),
            validation_errors: self.validation_errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            latency_p50_ms: percentile(&sorted, 0.50),
            latency_p90_ms: percentile(&sorted, 0.90),
            latency_p99_ms: percentile(&sorted, 0.99),
            avg_latency_ms,
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in [
            &self.total_checks,
            &self.allowed,
            &self.denied,
            &self.validation_errors,
            &self.cache_hits,
            &self.cache_misses,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.latency_samples.lock().clear();
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.snapshot();

        format!(
            r#"# HELP authz_checks_total Total number of access checks
# TYPE authz_checks_total counter
authz_checks_total {}

# HELP authz_allowed_total Number of allowed decisions
# TYPE authz_allowed_total counter
authz_allowed_total {}

# HELP authz_denied_total Number of denied decisions
# TYPE authz_denied_total counter
authz_denied_total {}

# HELP authz_validation_errors_total Checks rejected as malformed
# TYPE authz_validation_errors_total counter
authz_validation_errors_total {}

# HELP authz_cache_hits_total Effective-permission cache hits
# TYPE authz_cache_hits_total counter
authz_cache_hits_total {}

# HELP authz_cache_misses_total Effective-permission cache misses
# TYPE authz_cache_misses_total counter
authz_cache_misses_total {}

# HELP authz_check_latency_seconds Check latency percentiles
# TYPE authz_check_latency_seconds summary
authz_check_latency_seconds{{quantile="0.5"}} {}
authz_check_latency_seconds{{quantile="0.9"}} {}
authz_check_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.total_checks,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.validation_errors,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile from sorted data
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_decision() {
        let collector = MetricsCollector::new();

        collector.record_decision(true, Duration::from_micros(50));
        collector.record_decision(false, Duration::from_micros(50));
        collector.record_decision(true, Duration::from_micros(50));

        let metrics = collector.snapshot();
        assert_eq!(metrics.total_checks, 3);
        assert_eq!(metrics.allowed_decisions, 2);
        assert_eq!(metrics.denied_decisions, 1);
        assert!((metrics.allow_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let collector = MetricsCollector::with_window(3);

        for ms in [100, 5, 10, 15] {
            collector.record_decision(true, Duration::from_millis(ms));
        }

        let metrics = collector.snapshot();
        assert!((metrics.avg_latency_ms - 10.0).abs() < 1.0);
        assert!(metrics.latency_p99_ms < 100.0);
    }

    #[test]
    fn test_prometheus_export() {
        let collector = MetricsCollector::new();

        collector.record_decision(true, Duration::from_millis(1));
        collector.record_cache_hit();
        collector.record_validation_error();

        let prometheus = collector.export_prometheus();
        assert!(prometheus.contains("authz_checks_total 1"));
        assert!(prometheus.contains("authz_allowed_total 1"));
        assert!(prometheus.contains("authz_cache_hits_total 1"));
        assert!(prometheus.contains("authz_validation_errors_total 1"));
    }

    #[test]
    fn test_reset() {
        let collector = MetricsCollector::new();

        collector.record_decision(true, Duration::from_millis(1));
        collector.record_cache_miss();
        collector.reset();

        let metrics = collector.snapshot();
        assert_eq!(metrics.total_checks, 0);
        assert_eq!(metrics.cache_misses, 0);
        assert_eq!(metrics.avg_latency_ms, 0.0);
    }
}
