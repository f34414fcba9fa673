//! Pass result data models
//!
//! Terminal summaries handed back to the caller after a benchmark or a
//! wipe pass. Nothing here is persisted; the CLI may print it as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::io::OpenMode;

/// Result of a write-speed benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// When the benchmark finished
    pub timestamp: DateTime<Utc>,
    /// Planned benchmark volume in bytes
    pub volume: u64,
    /// Bytes actually written
    pub bytes_written: u64,
    /// Wall time including the final sync
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Sustained write throughput in bytes per second
    pub bytes_per_sec: f64,
    /// Open mode the benchmark ran under
    pub open_mode: OpenMode,
}

impl BenchmarkReport {
    pub fn new(volume: u64, bytes_written: u64, elapsed: Duration, open_mode: OpenMode) -> Self {
        Self {
            timestamp: Utc::now(),
            volume,
            bytes_written,
            elapsed,
            bytes_per_sec: throughput(bytes_written, elapsed),
            open_mode,
        }
    }
}

/// Final summary of a wipe pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeSummary {
    /// When the pass finished
    pub completed_at: DateTime<Utc>,
    /// Device length the pass covered
    pub device_size: u64,
    /// Bytes traversed, written or skipped
    pub bytes_processed: u64,
    /// Bytes overwritten with random data
    pub bytes_written: u64,
    /// Bytes stepped over without writing
    pub bytes_skipped: u64,
    pub skip_factor: u64,
    pub buffer_size: usize,
    pub open_mode: OpenMode,
    /// Time spent in the write loop
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Processed bytes per second
    pub average_throughput: f64,
    /// Written bytes per second
    pub write_throughput: f64,
    /// Set when the final sync failed; the data still reached the write path
    pub sync_warning: Option<String>,
}

impl WipeSummary {
    /// Share of the device actually overwritten, in percent
    pub fn coverage_percentage(&self) -> f64 {
        if self.device_size == 0 {
            0.0
        } else {
            self.bytes_written as f64 / self.device_size as f64 * 100.0
        }
    }

    /// Whether every byte of the device was overwritten
    pub fn is_full_coverage(&self) -> bool {
        self.bytes_written == self.device_size
    }
}

/// Bytes per second, zero when no time elapsed
pub fn throughput(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

// Durations are stored as fractional seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
