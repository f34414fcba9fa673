//! Data models module
//!
//! Benchmark reports and wipe summaries returned to callers.

pub mod summary;

// Re-export commonly used types
pub use summary::{throughput, BenchmarkReport, WipeSummary};
