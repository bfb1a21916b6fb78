//! Latency histograms for the frame path and the phase loop.
//! Each metric keeps the most recent samples and reports p50/p95/p99.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Records elapsed microseconds into the registry when finished.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Bounded sample window; the oldest sample is overwritten when full.
struct SampleWindow {
    samples: Vec<f64>,
    next: usize,
    len: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            next: 0,
            len: 0,
        }
    }

    fn push(&mut self, value: f64) {
        let capacity = self.samples.len();
        self.samples[self.next] = value;
        self.next = (self.next + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let mut sorted = self.samples[..self.len].to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = ((p / 100.0) * (self.len as f64 - 1.0)).round() as usize;
        sorted[rank.min(self.len - 1)]
    }
}

pub struct MetricsRegistry {
    windows: Mutex<HashMap<&'static str, SampleWindow>>,
    window_capacity: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(window_capacity: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_capacity: window_capacity.max(1),
        }
    }

    /// Record one sample in microseconds.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut windows = self.windows.lock();
        windows
            .entry(name)
            .or_insert_with(|| SampleWindow::new(self.window_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        self.windows
            .lock()
            .get(name)
            .map(|w| w.percentile(p))
            .unwrap_or(0.0)
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.windows
            .lock()
            .iter()
            .map(|(&name, window)| {
                (
                    name.to_string(),
                    MetricSummary {
                        p50_us: window.percentile(50.0),
                        p95_us: window.percentile(95.0),
                        p99_us: window.percentile(99.0),
                        count: window.len,
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

pub mod metric_names {
    pub const ASSIGN_SLOTS: &str = "t_assign_slots";
    pub const FRAME_QUEUE_WAIT: &str = "frame_queue_wait";
    pub const ANNOUNCE: &str = "t_announce";
    pub const PHASE_CYCLE: &str = "t_phase_cycle";
}
