//! Histogram metrics for the background loops.
//! Ring-buffer samples, p50/p95/p99 summaries, timing spans.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// End the span, recording elapsed duration in milliseconds.
    pub fn finish(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.registry.record(self.name, elapsed_ms);
        elapsed_ms
    }
}

/// Fixed-capacity ring buffer for histogram samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

/// Stores histograms for all named metrics.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            ring_capacity: 1024,
        }
    }

    /// Record a sample (in milliseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_ms: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_ms);
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Get percentile for a metric (p value 0-100), in milliseconds.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists.get(name).map(|ring| ring.percentile(p)).unwrap_or(0.0)
    }

    /// Number of samples recorded for a metric.
    pub fn sample_count(&self, name: &str) -> usize {
        let hists = self.histograms.lock();
        hists.get(name).map(|ring| ring.count).unwrap_or(0)
    }

    /// Summary of all metrics at p50/p95/p99.
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        let mut out = HashMap::new();
        for (&name, ring) in hists.iter() {
            out.insert(
                name.to_string(),
                MetricSummary {
                    p50_ms: ring.percentile(50.0),
                    p95_ms: ring.percentile(95.0),
                    p99_ms: ring.percentile(99.0),
                    count: ring.count,
                },
            );
        }
        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub count: usize,
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    pub const POPULATE_DONE: &str = "t_populate_done";
    pub const PERSIST_FLUSH: &str = "t_persist_flush";
    pub const SWEEP_CYCLE: &str = "t_sweep_cycle";
    pub const NOTIFY_DONE: &str = "t_notify_done";
    pub const QUEUE_WAIT_POPULATE: &str = "queue_wait_populate";
}
