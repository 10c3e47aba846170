// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for the load path.
//!
//! Provides lightweight metrics collection without external dependencies:
//! how many loads were dispatched, how long dispatch took, and what each
//! instrumented module went through (patched, skipped, unpatched).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Dispatch latency bucket boundaries in microseconds.
const DISPATCH_BUCKETS: [u64; 5] = [1, 10, 100, 1_000, 10_000];

/// Central metrics collection.
///
/// Recording never takes a write lock except the first time a module name
/// is seen.
#[derive(Debug)]
pub struct Metrics {
    /// Per-module patch lifecycle counters.
    modules: RwLock<HashMap<String, ModuleCounters>>,

    /// Interceptor dispatch counters.
    dispatch: DispatchCounters,

    /// Start time for calculating uptime.
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
            dispatch: DispatchCounters::new(),
            start_time: Instant::now(),
        }
    }

    /// Record one interceptor dispatch.
    pub fn record_dispatch(&self, duration: Duration, hooks_matched: usize) {
        self.dispatch.record(duration, hooks_matched);
    }

    fn with_module(&self, name: &str, f: impl Fn(&ModuleCounters)) {
        if let Some(counters) = self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            f(counters);
            return;
        }
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        f(modules.entry(name.to_string()).or_default());
    }

    /// A module (or one of its files) reached an orchestrator.
    pub fn record_load(&self, module: &str) {
        self.with_module(module, |m| ModuleCounters::bump(&m.loads));
    }

    /// A patch function ran.
    pub fn record_patch(&self, module: &str) {
        self.with_module(module, |m| ModuleCounters::bump(&m.patched));
    }

    /// A load was left alone because no supported range matched.
    pub fn record_skip(&self, module: &str) {
        self.with_module(module, |m| ModuleCounters::bump(&m.skipped));
    }

    /// An unpatch function ran.
    pub fn record_unpatch(&self, module: &str) {
        self.with_module(module, |m| ModuleCounters::bump(&m.unpatched));
    }

    /// Get metrics for a specific module.
    pub fn module_metrics(&self, name: &str) -> Option<ModuleMetrics> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(ModuleCounters::snapshot)
    }

    /// Get dispatch metrics.
    pub fn dispatch_metrics(&self) -> DispatchMetrics {
        self.dispatch.snapshot()
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            modules: self
                .modules
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(name, counters)| (name.clone(), counters.snapshot()))
                .collect(),
            dispatch: self.dispatch_metrics(),
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.dispatch.reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe lifecycle counters for one module name.
#[derive(Debug, Default)]
struct ModuleCounters {
    loads: AtomicU64,
    patched: AtomicU64,
    skipped: AtomicU64,
    unpatched: AtomicU64,
}

impl ModuleCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ModuleMetrics {
        ModuleMetrics {
            loads: self.loads.load(Ordering::Relaxed),
            patched: self.patched.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            unpatched: self.unpatched.load(Ordering::Relaxed),
        }
    }
}

/// Patch lifecycle counters for one module name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMetrics {
    pub loads: u64,
    pub patched: u64,
    pub skipped: u64,
    pub unpatched: u64,
}

/// Thread-safe dispatch counters.
#[derive(Debug)]
struct DispatchCounters {
    count: AtomicU64,
    unmatched: AtomicU64,
    hooks_matched: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
    buckets: [AtomicU64; DISPATCH_BUCKETS.len() + 1],
}

impl DispatchCounters {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
            hooks_matched: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
            buckets: Default::default(),
        }
    }

    fn record(&self, duration: Duration, hooks_matched: usize) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        if hooks_matched == 0 {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
        }
        self.hooks_matched
            .fetch_add(hooks_matched as u64, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.buckets[bucket_index(&DISPATCH_BUCKETS, duration)].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchMetrics {
        let count = self.count.load(Ordering::Relaxed);
        DispatchMetrics {
            count,
            unmatched: self.unmatched.load(Ordering::Relaxed),
            hooks_matched: self.hooks_matched.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
            min_duration: if count == 0 {
                Duration::MAX
            } else {
                Duration::from_nanos(self.min_nanos.load(Ordering::Relaxed))
            },
            max_duration: Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed)),
            histogram: Histogram {
                buckets: DISPATCH_BUCKETS.to_vec(),
                counts: self
                    .buckets
                    .iter()
                    .map(|c| c.load(Ordering::Relaxed))
                    .collect(),
            },
        }
    }

    fn reset(&self) {
        for counter in [&self.count, &self.unmatched, &self.hooks_matched, &self.total_nanos, &self.max_nanos] {
            counter.store(0, Ordering::Relaxed);
        }
        self.min_nanos.store(u64::MAX, Ordering::Relaxed);
        for bucket in &self.buckets {
            bucket.store(0, Ordering::Relaxed);
        }
    }
}

fn bucket_index(buckets: &[u64], duration: Duration) -> usize {
    let micros = duration.as_micros() as u64;
    buckets
        .iter()
        .position(|&b| micros <= b)
        .unwrap_or(buckets.len())
}

/// Interceptor dispatch metrics with histogram.
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    /// Number of dispatched loads.
    pub count: u64,

    /// Loads that matched no hook.
    pub unmatched: u64,

    /// Sum of matched hooks over all loads.
    pub hooks_matched: u64,

    /// Total duration.
    pub total_duration: Duration,

    /// Minimum duration.
    pub min_duration: Duration,

    /// Maximum duration.
    pub max_duration: Duration,

    /// Histogram buckets for latency distribution.
    pub histogram: Histogram,
}

impl DispatchMetrics {
    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    buckets: Vec<u64>,

    /// Count per bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let idx = bucket_index(&self.buckets, duration);
        self.counts[idx] += 1;
    }

    /// Get counts for each bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Get bucket boundaries.
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Calculate approximate percentile (p50, p90, p99, etc.).
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_buckets(DISPATCH_BUCKETS.to_vec())
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Module metrics by name.
    pub modules: HashMap<String, ModuleMetrics>,

    /// Dispatch metrics.
    pub dispatch: DispatchMetrics,

    /// Uptime when snapshot was taken.
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Metrics Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Dispatch: {} loads, {} unmatched, avg {:.2?}, p99 {:.2?}\n\n",
            self.dispatch.count,
            self.dispatch.unmatched,
            self.dispatch.avg_duration(),
            self.dispatch.histogram.p99(),
        ));

        if !self.modules.is_empty() {
            report.push_str("Modules:\n");
            let mut names: Vec<_> = self.modules.keys().collect();
            names.sort();
            for name in names {
                let m = &self.modules[name];
                report.push_str(&format!(
                    "  {}: {} loads, {} patched, {} skipped, {} unpatched\n",
                    name, m.loads, m.patched, m.skipped, m.unpatched
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_counters() {
        let metrics = Metrics::new();
        metrics.record_load("demo-lib");
        metrics.record_patch("demo-lib");
        metrics.record_load("demo-lib");
        metrics.record_skip("demo-lib");
        metrics.record_unpatch("demo-lib");

        let m = metrics.module_metrics("demo-lib").unwrap();
        assert_eq!(
            m,
            ModuleMetrics {
                loads: 2,
                patched: 1,
                skipped: 1,
                unpatched: 1,
            }
        );
        assert!(metrics.module_metrics("other").is_none());
    }

    #[test]
    fn test_dispatch_metrics() {
        let metrics = Metrics::new();
        metrics.record_dispatch(Duration::from_micros(5), 0);
        metrics.record_dispatch(Duration::from_micros(15), 2);

        let d = metrics.dispatch_metrics();
        assert_eq!(d.count, 2);
        assert_eq!(d.unmatched, 1);
        assert_eq!(d.hooks_matched, 2);
        assert_eq!(d.avg_duration(), Duration::from_micros(10));
        assert_eq!(d.min_duration, Duration::from_micros(5));
        assert_eq!(d.max_duration, Duration::from_micros(15));
        assert_eq!(d.histogram.counts(), &[0, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_concurrent_recording() {
        let metrics = std::sync::Arc::new(Metrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = std::sync::Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.record_dispatch(Duration::from_micros(2), 1);
                        metrics.record_load("pg");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.dispatch_metrics().count, 1_000);
        assert_eq!(metrics.dispatch_metrics().hooks_matched, 1_000);
        assert_eq!(metrics.module_metrics("pg").unwrap().loads, 1_000);
    }

    #[test]
    fn test_empty_dispatch_snapshot() {
        let d = Metrics::new().dispatch_metrics();
        assert_eq!(d.count, 0);
        assert_eq!(d.avg_duration(), Duration::ZERO);
        assert_eq!(d.min_duration, Duration::MAX);
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = Histogram::default();
        for _ in 0..99 {
            hist.record(Duration::from_micros(5));
        }
        hist.record(Duration::from_millis(5));

        assert_eq!(hist.p50(), Duration::from_micros(10));
        assert_eq!(hist.p99(), Duration::from_micros(10));
        assert_eq!(hist.percentile(100.0), Duration::from_micros(10_000));
    }

    #[test]
    fn test_reset_and_report() {
        let metrics = Metrics::new();
        metrics.record_patch("pg");
        metrics.record_dispatch(Duration::from_micros(3), 1);

        let report = metrics.snapshot().format_report();
        assert!(report.contains("pg: 0 loads, 1 patched"));
        assert!(report.contains("Dispatch: 1 loads"));

        metrics.reset();
        assert!(metrics.module_metrics("pg").is_none());
        assert_eq!(metrics.dispatch_metrics().count, 0);
    }
}
