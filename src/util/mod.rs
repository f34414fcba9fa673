//! Utility functions module
//!
//! Human-readable formatting and parsing of sizes, durations and rates.

pub mod units;

// Re-export commonly used functions
pub use units::{format_bytes, format_duration, format_eta, format_throughput, parse_bytes};
