//! Optional timing of parser phases by label

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Timing totals for one label, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingStats {
    pub count: u64,
    pub total_ms: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

pub type PerformanceReport = BTreeMap<String, TimingStats>;

#[derive(Debug, Clone, Copy)]
struct Samples {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl Samples {
    fn first(elapsed: Duration) -> Self {
        Self {
            count: 1,
            total: elapsed,
            min: elapsed,
            max: elapsed,
        }
    }

    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }
}

/// Collects durations per label; a disabled monitor records nothing
#[derive(Debug, Clone, Default)]
pub struct PerformanceMonitor {
    enabled: bool,
    samples: BTreeMap<String, Samples>,
}

impl PerformanceMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            samples: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, label: &str, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        match self.samples.get_mut(label) {
            Some(samples) => samples.add(elapsed),
            None => {
                self.samples
                    .insert(label.to_string(), Samples::first(elapsed));
            }
        }
    }

    /// Run `f`, recording its duration under `label` when enabled
    pub fn time<T>(&mut self, label: &str, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let result = f();
        self.record(label, start.elapsed());
        result
    }

    pub fn report(&self) -> PerformanceReport {
        self.samples
            .iter()
            .map(|(label, s)| {
                let total_ms = s.total.as_secs_f64() * 1000.0;
                (
                    label.clone(),
                    TimingStats {
                        count: s.count,
                        total_ms,
                        avg_ms: total_ms / s.count as f64,
                        min_ms: s.min.as_secs_f64() * 1000.0,
                        max_ms: s.max.as_secs_f64() * 1000.0,
                    },
                )
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
