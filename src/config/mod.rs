//! Configuration management module
//!
//! Handles loading and validation of wipe and benchmark parameters.
//! Command-line flags override whatever the config file provides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bench::DEFAULT_BENCHMARK_VOLUME;
use crate::wipe::{SkipFactor, DEFAULT_SMOOTHING_FACTOR};
use crate::{Result, WipeError, APP_NAME, CONFIG_FILE};

/// Default buffer size: 4 MiB
pub const DEFAULT_BUFFER_SIZE: u64 = 4 * 1024 * 1024;

/// Default auto-skip target: 20 hours
pub const DEFAULT_TARGET_DURATION: Duration = Duration::from_secs(20 * 60 * 60);

/// Wipe and benchmark parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WipeConfig {
    /// Bytes written per iteration, rounded down to the direct I/O alignment
    pub buffer_size: u64,
    /// Write one buffer out of every `skip_factor`
    pub skip_factor: SkipFactor,
    /// Derive the skip factor from a benchmark instead of `skip_factor`
    pub auto_skip: bool,
    /// Completion time the auto skip factor aims for
    #[serde(with = "humantime_serde")]
    pub target_duration: Duration,
    /// Minimum time between progress updates
    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,
    /// Weight of the newest sample in the speed average
    pub smoothing_factor: f64,
    /// Bytes written by the benchmark on large devices
    pub benchmark_volume: u64,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            skip_factor: SkipFactor::FULL,
            auto_skip: false,
            target_duration: DEFAULT_TARGET_DURATION,
            update_interval: Duration::from_secs(1),
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            benchmark_volume: DEFAULT_BENCHMARK_VOLUME,
        }
    }
}

impl WipeConfig {
    pub fn validate(&self) -> Result<()> {
        // Engines round the size to the direct I/O alignment themselves
        if self.buffer_size == 0 {
            return Err(WipeError::ConfigError(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(WipeError::ConfigError(
                "Smoothing factor must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.target_duration.is_zero() {
            return Err(WipeError::ConfigError(
                "Target duration must be greater than 0".to_string(),
            ));
        }

        if self.update_interval.is_zero() {
            return Err(WipeError::ConfigError(
                "Update interval must be greater than 0".to_string(),
            ));
        }

        if self.benchmark_volume == 0 {
            return Err(WipeError::ConfigError(
                "Benchmark volume must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Buffer size as an allocation length
    pub fn buffer_size_bytes(&self) -> Result<usize> {
        usize::try_from(self.buffer_size).map_err(|_| {
            WipeError::ConfigError(format!(
                "Buffer size {} does not fit in memory on this platform",
                self.buffer_size
            ))
        })
    }

    pub fn with_buffer_size(mut self, size: u64) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_skip_factor(mut self, skip_factor: SkipFactor) -> Self {
        self.skip_factor = skip_factor;
        self
    }

    pub fn with_auto_skip(mut self, auto_skip: bool) -> Self {
        self.auto_skip = auto_skip;
        self
    }

    pub fn with_target_duration(mut self, target: Duration) -> Self {
        self.target_duration = target;
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_smoothing_factor(mut self, alpha: f64) -> Self {
        self.smoothing_factor = alpha;
        self
    }

    pub fn with_benchmark_volume(mut self, volume: u64) -> Self {
        self.benchmark_volume = volume;
        self
    }

    /// Load configuration from the standard config file location.
    /// Returns the default configuration if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load and validate configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WipeError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            WipeError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// `$CONFIG_HOME/skipwipe/skipwipe.toml`
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            WipeError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
