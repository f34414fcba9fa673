//! skipwipe - random-overwrite block device eraser
//!
//! Overwrites a device with cryptographically random data, optionally
//! writing only every Nth buffer, and can derive that stride from a
//! measured write speed and a target completion time.

use std::fmt;
use std::path::PathBuf;

// Public re-exports
pub mod bench;
pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod util;
pub mod wipe;

// Common error types
#[derive(Debug)]
pub enum WipeError {
    /// Device could not be opened, even in buffered-synchronized mode
    OpenFailed { path: PathBuf, source: std::io::Error },
    /// Device length could not be determined
    ProbeFailed { path: PathBuf, source: std::io::Error },
    /// Aligned buffer could not be allocated
    AllocFailed { size: usize, reason: String },
    /// A write failed or returned fewer bytes than requested
    WriteFailed { offset: u64, source: std::io::Error },
    /// Skipping forward over unwritten blocks failed
    SeekFailed { offset: u64, source: std::io::Error },
    /// Durability flush failed after the data reached the write path
    SyncFailed(std::io::Error),
    /// The random source could not fill the buffer
    EntropyFailed(String),
    /// Benchmark finished but the original write offset was not restored
    PositionRestoreFailed {
        bytes_per_sec: f64,
        offset: u64,
        source: std::io::Error,
    },
    /// Pass stopped between iterations at the caller's request
    Cancelled { bytes_processed: u64, bytes_written: u64 },
    /// Configuration validation or parsing error
    ConfigError(String),
    /// Benchmark could not be run or produced no usable measurement
    BenchmarkError(String),
    /// Summary serialization error
    ReportError(String),
    /// Other I/O failure outside the engine
    IoError(std::io::Error),
}

impl fmt::Display for WipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WipeError::OpenFailed { path, source } => {
                write!(f, "Failed to open {}: {}", path.display(), source)
            }
            WipeError::ProbeFailed { path, source } => {
                write!(f, "Failed to determine size of {}: {}", path.display(), source)
            }
            WipeError::AllocFailed { size, reason } => {
                write!(f, "Failed to allocate aligned buffer of {} bytes: {}", size, reason)
            }
            WipeError::WriteFailed { offset, source } => {
                write!(f, "Write failed at byte {}: {}", offset, source)
            }
            WipeError::SeekFailed { offset, source } => {
                write!(f, "Seek failed at byte {}: {}", offset, source)
            }
            WipeError::SyncFailed(err) => write!(f, "Sync failed: {}", err),
            WipeError::EntropyFailed(msg) => write!(f, "Random source failed: {}", msg),
            WipeError::PositionRestoreFailed { offset, source, .. } => write!(
                f,
                "Benchmark completed but failed to restore original position {}: {}",
                offset, source
            ),
            WipeError::Cancelled {
                bytes_processed,
                bytes_written,
            } => write!(
                f,
                "Cancelled after processing {} bytes ({} written)",
                bytes_processed, bytes_written
            ),
            WipeError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            WipeError::BenchmarkError(msg) => write!(f, "Benchmark error: {}", msg),
            WipeError::ReportError(msg) => write!(f, "Report error: {}", msg),
            WipeError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for WipeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WipeError::OpenFailed { source, .. }
            | WipeError::ProbeFailed { source, .. }
            | WipeError::WriteFailed { source, .. }
            | WipeError::SeekFailed { source, .. }
            | WipeError::PositionRestoreFailed { source, .. } => Some(source),
            WipeError::SyncFailed(err) | WipeError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WipeError {
    fn from(err: std::io::Error) -> Self {
        WipeError::IoError(err)
    }
}

impl From<toml::de::Error> for WipeError {
    fn from(err: toml::de::Error) -> Self {
        WipeError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_json::Error> for WipeError {
    fn from(err: serde_json::Error) -> Self {
        WipeError::ReportError(format!("JSON serialization error: {}", err))
    }
}

/// Result type alias for skipwipe operations
pub type Result<T> = std::result::Result<T, WipeError>;

/// Error classification utilities
pub mod error {
    use super::WipeError;

    /// Whether the error aborts the current pass.
    ///
    /// A failed sync is the only engine error that leaves the pass complete:
    /// the bytes already reached the device's write path.
    pub fn is_fatal(error: &WipeError) -> bool {
        !matches!(error, WipeError::SyncFailed(_))
    }

    /// Process exit code for an error surfaced by the CLI
    pub fn exit_code(error: &WipeError) -> i32 {
        match error {
            WipeError::ConfigError(_) => 2,
            WipeError::OpenFailed { .. } | WipeError::ProbeFailed { .. } => 3,
            WipeError::AllocFailed { .. } | WipeError::EntropyFailed(_) => 4,
            WipeError::WriteFailed { .. } | WipeError::SeekFailed { .. } => 5,
            WipeError::SyncFailed(_) => 6,
            WipeError::BenchmarkError(_) | WipeError::PositionRestoreFailed { .. } => 7,
            WipeError::Cancelled { .. } => 130,
            WipeError::ReportError(_) | WipeError::IoError(_) => 1,
        }
    }

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &WipeError) -> String {
        match error {
            WipeError::OpenFailed { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                "Permission denied. Raw devices usually require root privileges.".to_string()
            }
            WipeError::OpenFailed { path, .. } => format!(
                "Could not open {}. Check that the path exists and is not in use.",
                path.display()
            ),
            WipeError::WriteFailed { offset, .. } => format!(
                "The device rejected a write at byte {}. It may be failing or read-only.",
                offset
            ),
            WipeError::SyncFailed(_) => {
                "Data was written but the final flush failed; treat the wipe as unverified."
                    .to_string()
            }
            WipeError::PositionRestoreFailed { .. } => {
                "Benchmark data is valid but the write offset could not be restored.".to_string()
            }
            WipeError::Cancelled { .. } => {
                "Wipe cancelled. Regions not yet reached still hold their previous contents."
                    .to_string()
            }
            WipeError::ConfigError(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            _ => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "skipwipe";
pub const CONFIG_FILE: &str = "skipwipe.toml";
/// Required memory and length alignment for direct I/O
pub const DIRECT_IO_ALIGNMENT: usize = 4096;
