//! Benchmark module
//!
//! Measures synchronized write throughput so a skip factor can be chosen
//! that finishes a wipe within a target time.

pub mod benchmark;

// Re-export commonly used types
pub use benchmark::{Benchmarker, DEFAULT_BENCHMARK_VOLUME};
