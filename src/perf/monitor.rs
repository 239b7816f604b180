//! In-memory performance sample log and aggregation.
//!
//! Every instrumented query/batch appends one sample; statistics are
//! computed on demand and nothing is persisted. Used to assert performance
//! budgets in tests and to diagnose slow paths in the field.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

// =============================================================================
// PerformanceSample
// =============================================================================

/// One recorded operation. Append-only, never mutated.
#[derive(Debug, Clone)]
pub struct PerformanceSample {
    pub operation: String,
    pub duration: Duration,
    pub document_count: usize,
    pub from_cache: bool,
    pub recorded_at: SystemTime,
}

// =============================================================================
// OperationStats
// =============================================================================

/// Aggregate statistics for one operation name.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStats {
    pub count: usize,
    pub mean_duration: Duration,
    pub p50_duration: Duration,
    pub p95_duration: Duration,
    pub total_documents: usize,
    /// Fraction of samples served from cache, 0.0 to 1.0.
    pub cache_hit_rate: f64,
    /// Documents per second across all samples of this operation.
    pub documents_per_second: f64,
}

/// Aggregate statistics across all operations.
#[derive(Debug, Clone, Default)]
pub struct PerformanceSummary {
    pub operations: HashMap<String, OperationStats>,
    pub total_samples: usize,
}

impl PerformanceSummary {
    /// Stats for one operation name, if any samples were recorded.
    pub fn operation(&self, name: &str) -> Option<&OperationStats> {
        self.operations.get(name)
    }
}

// =============================================================================
// PerformanceMonitor
// =============================================================================

/// Thread-safe append-only sample log.
pub struct PerformanceMonitor {
    samples: Mutex<Vec<PerformanceSample>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
        }
    }

    /// Record one operation.
    pub fn record_query(
        &self,
        operation: &str,
        duration: Duration,
        document_count: usize,
        from_cache: bool,
    ) {
        let mut samples = self.samples.lock().unwrap();
        samples.push(PerformanceSample {
            operation: operation.to_string(),
            duration,
            document_count,
            from_cache,
            recorded_at: SystemTime::now(),
        });
    }

    /// Number of samples recorded so far.
    pub fn sample_count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    /// Samples for one operation name, in recording order.
    pub fn samples_for(&self, operation: &str) -> Vec<PerformanceSample> {
        self.samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.operation == operation)
            .cloned()
            .collect()
    }

    /// Drop all samples.
    pub fn reset(&self) {
        self.samples.lock().unwrap().clear();
    }

    /// Compute per-operation aggregates over everything recorded so far.
    pub fn summary(&self) -> PerformanceSummary {
        let samples = self.samples.lock().unwrap();

        let mut grouped: HashMap<&str, Vec<&PerformanceSample>> = HashMap::new();
        for sample in samples.iter() {
            grouped.entry(&sample.operation).or_default().push(sample);
        }

        let operations = grouped
            .into_iter()
            .map(|(name, group)| (name.to_string(), aggregate(&group)))
            .collect();

        PerformanceSummary {
            operations,
            total_samples: samples.len(),
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn aggregate(group: &[&PerformanceSample]) -> OperationStats {
    let count = group.len();
    let mut durations: Vec<Duration> = group.iter().map(|s| s.duration).collect();
    durations.sort();

    let total_duration: Duration = durations.iter().sum();
    let total_documents: usize = group.iter().map(|s| s.document_count).sum();
    let cache_hits = group.iter().filter(|s| s.from_cache).count();

    let documents_per_second = if total_duration.is_zero() {
        0.0
    } else {
        total_documents as f64 / total_duration.as_secs_f64()
    };

    OperationStats {
        count,
        mean_duration: total_duration / count as u32,
        p50_duration: percentile(&durations, 50),
        p95_duration: percentile(&durations, 95),
        total_documents,
        cache_hit_rate: cache_hits as f64 / count as f64,
        documents_per_second,
    }
}

/// Nearest-rank percentile over sorted durations.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}
