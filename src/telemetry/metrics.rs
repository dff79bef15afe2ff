// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process aggregation of finished query metrics.
//!
//! Lightweight and dependency-free; suitable for CLIs and tests where a full
//! metrics backend is overkill.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::interceptor::MetricRecord;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Aggregated metrics per query name.
#[derive(Debug)]
pub struct Metrics {
    queries: RwLock<HashMap<String, QueryMetrics>>,
    totals: Totals,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            queries: RwLock::new(HashMap::new()),
            totals: Totals::default(),
            start_time: Instant::now(),
        }
    }

    /// Fold one finished record into the aggregate for its query.
    pub fn record_query(&self, record: &MetricRecord) {
        let duration = record.duration().unwrap_or(Duration::ZERO);
        let success = record.is_success();
        let rows = record.rows.unwrap_or(0).max(0) as u64;

        self.totals.record(success, rows);

        let mut queries = self.queries.write().unwrap_or_else(PoisonError::into_inner);
        queries
            .entry(record.query.clone())
            .or_insert_with(QueryMetrics::new)
            .record(duration, success, rows);
    }

    /// Metrics for a single query name.
    pub fn query_metrics(&self, query: &str) -> Option<QueryMetrics> {
        self.queries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query)
            .cloned()
    }

    /// Total (operations, failures) across all queries.
    pub fn totals(&self) -> (u64, u64) {
        (self.totals.operations(), self.totals.failures())
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let queries = self.queries.read().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            queries: queries.clone(),
            operations: self.totals.operations(),
            failures: self.totals.failures(),
            rows: self.totals.rows(),
            uptime: self.uptime(),
        }
    }

    pub fn reset(&self) {
        self.queries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.totals.reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate for one query name.
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    pub count: u64,
    pub failures: u64,
    /// Sum of reported row counts.
    pub rows: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            failures: 0,
            rows: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool, rows: u64) {
        self.count += 1;
        if !success {
            self.failures += 1;
        }
        self.rows += rows;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration.div_f64(self.count as f64)
        }
    }

    pub fn avg_rows(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.rows as f64 / self.count as f64
        }
    }

    /// Fraction of executions that succeeded (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            1.0
        } else {
            (self.count - self.failures) as f64 / self.count as f64
        }
    }
}

impl Default for QueryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bucket bounds in microseconds; the last bucket is open-ended.
    bounds: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket bounds (in microseconds).
    pub fn with_bounds(bounds: Vec<u64>) -> Self {
        let counts = vec![0; bounds.len() + 1];
        Self { bounds, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let idx = self.bounds.partition_point(|&b| b < micros);
        self.counts[idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn bounds(&self) -> &[u64] {
        &self.bounds
    }

    /// Approximate percentile as the upper bound of the bucket holding it.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil().max(1.0) as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.bounds.get(i) {
                    Some(&bound) => bound,
                    // overflow bucket: report ten times the last bound
                    None => self.bounds.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_micros(micros);
            }
        }
        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p90(&self) -> Duration {
        self.percentile(90.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 100us, 1ms, 10ms, 100ms, 1s, 10s
        Self::with_bounds(vec![100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }
}

#[derive(Debug, Default)]
struct Totals {
    operations: AtomicU64,
    failures: AtomicU64,
    rows: AtomicU64,
}

impl Totals {
    fn record(&self, success: bool, rows: u64) {
        self.operations.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.rows.fetch_add(rows, Ordering::Relaxed);
    }

    fn operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.operations.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.rows.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time copy of all query metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub queries: HashMap<String, QueryMetrics>,
    pub operations: u64,
    pub failures: u64,
    pub rows: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report, slowest queries (by total time) first.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Query Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Operations: {} ({} failed), {} rows\n\n",
            self.operations, self.failures, self.rows
        ));

        let mut queries: Vec<(&String, &QueryMetrics)> = self.queries.iter().collect();
        queries.sort_by(|a, b| b.1.total_duration.cmp(&a.1.total_duration));

        for (query, metrics) in queries {
            report.push_str(&format!(
                "  {}\n    {} calls, {:.1}% success, avg {:.2?}, p99 {:.2?}, avg rows {:.1}\n",
                query,
                metrics.count,
                metrics.success_rate() * 100.0,
                metrics.avg_duration(),
                metrics.histogram.p99(),
                metrics.avg_rows(),
            ));
        }

        report
    }
}
