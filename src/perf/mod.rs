//! Performance telemetry for store operations.

mod monitor;

pub use monitor::{OperationStats, PerformanceMonitor, PerformanceSample, PerformanceSummary};
