//! Expvar Metrics Store
//!
//! Named-variable registry for client connection metrics, exported as a
//! single JSON object on the diagnostics path.

use crate::domain::ports::ConnectionMetrics;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const NEW_CONNECTIONS: &str = "HTTPClientNewConnections";
pub const REUSED_CONNECTIONS: &str = "HTTPClientReusedConnections";
pub const CONNECTION_PREPARATION: &str = "HTTPClientConnectionPreparation";

const HISTOGRAM_BUCKETS: usize = 50;
const FIRST_BUCKET_MS: f64 = 0.25;
const BUCKET_GROWTH: f64 = 1.5;

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket histogram of millisecond observations.
///
/// Bucket `i` covers values up to `bounds[i]`; the last bucket is
/// unbounded. Quantiles report the upper bound of the bucket holding
/// the requested rank, clamped to the largest value seen.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<f64>,
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_bits: AtomicU64,
    max_bits: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        let mut bounds = Vec::with_capacity(HISTOGRAM_BUCKETS);
        bounds.push(0.0);
        let mut bound = FIRST_BUCKET_MS;
        while bounds.len() < HISTOGRAM_BUCKETS - 1 {
            bounds.push(bound);
            bound *= BUCKET_GROWTH;
        }
        bounds.push(f64::INFINITY);

        Self {
            buckets: bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            bounds,
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            max_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn observe(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let value = value.max(0.0);
        let idx = self
            .bounds
            .iter()
            .position(|&b| value <= b)
            .unwrap_or(self.bounds.len() - 1);

        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        let _ = self
            .max_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                (value > f64::from_bits(bits)).then(|| value.to_bits())
            });
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }

    /// Approximate quantile `q` in `[0, 1]`; 0.0 when empty.
    pub fn quantile(&self, q: f64) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let max = f64::from_bits(self.max_bits.load(Ordering::Relaxed));
        let rank = ((q.clamp(0.0, 1.0) * count as f64).ceil() as u64).max(1);

        let mut seen = 0;
        for (bucket, &bound) in self.buckets.iter().zip(&self.bounds) {
            seen += bucket.load(Ordering::Relaxed);
            if seen >= rank {
                return bound.min(max);
            }
        }
        max
    }

    fn export(&self) -> Value {
        json!({
            "count": self.count(),
            "sum": self.sum(),
            "p50": self.quantile(0.50),
            "p90": self.quantile(0.90),
            "p95": self.quantile(0.95),
            "p99": self.quantile(0.99),
        })
    }
}

/// Process-wide diagnostic variables.
///
/// The three client connection variables are registered on creation;
/// other components can register their own counters and histograms.
pub struct ExpvarMetricsStore {
    counters: DashMap<String, Arc<Counter>>,
    histograms: DashMap<String, Arc<Histogram>>,
}

impl ExpvarMetricsStore {
    pub fn new() -> Self {
        let store = Self {
            counters: DashMap::new(),
            histograms: DashMap::new(),
        };
        store.counter(NEW_CONNECTIONS);
        store.counter(REUSED_CONNECTIONS);
        store.histogram(CONNECTION_PREPARATION);
        store
    }

    /// Get or register a counter.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Counter::default()))
            .clone()
    }

    /// Get or register a histogram.
    pub fn histogram(&self, name: &str) -> Arc<Histogram> {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new()))
            .clone()
    }

    /// All variables as one JSON object, keys sorted.
    pub fn snapshot(&self) -> Value {
        let mut vars = BTreeMap::new();
        for entry in self.counters.iter() {
            vars.insert(entry.key().clone(), Value::from(entry.value().get()));
        }
        for entry in self.histograms.iter() {
            vars.insert(entry.key().clone(), entry.value().export());
        }
        Value::Object(vars.into_iter().collect::<Map<String, Value>>())
    }

    pub fn export_json(&self) -> String {
        self.snapshot().to_string()
    }
}

impl Default for ExpvarMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMetrics for ExpvarMetricsStore {
    fn record_new_connection(&self) {
        self.counter(NEW_CONNECTIONS).incr();
    }

    fn record_reused_connection(&self) {
        self.counter(REUSED_CONNECTIONS).incr();
    }

    fn observe_connection_preparation(&self, millis: f64) {
        self.histogram(CONNECTION_PREPARATION).observe(millis);
    }
}
