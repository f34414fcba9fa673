use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, WipeError};

/// Stride between overwritten buffers: write one, skip `k - 1`.
///
/// `1` overwrites every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SkipFactor(NonZeroU64);

impl SkipFactor {
    pub const FULL: SkipFactor = SkipFactor(NonZeroU64::MIN);

    pub fn new(k: u64) -> Result<Self> {
        NonZeroU64::new(k)
            .map(Self)
            .ok_or_else(|| WipeError::ConfigError("Skip factor must be at least 1".to_string()))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Whether every block is written
    pub fn is_full(self) -> bool {
        self.get() == 1
    }

    /// Largest useful factor for a device: one buffer written per pass
    pub fn max_for(device_size: u64, buffer_size: usize) -> Self {
        let buffer = (buffer_size as u64).max(1);
        Self::clamped(device_size.div_ceil(buffer))
    }

    /// Pick the factor that lets a pass over `device_size` bytes finish
    /// within `target` at the measured `bytes_per_sec`.
    ///
    /// The required speed divided by the measured speed is truncated, then
    /// clamped to `[1, max_for(device_size, buffer_size)]`.
    pub fn for_target(
        device_size: u64,
        bytes_per_sec: f64,
        target: Duration,
        buffer_size: usize,
    ) -> Self {
        let max = Self::max_for(device_size, buffer_size).get();
        if !(bytes_per_sec > 0.0) || device_size == 0 {
            return Self::FULL;
        }

        let target_secs = target.as_secs_f64();
        if target_secs <= 0.0 {
            return Self::clamped(max);
        }

        let required = device_size as f64 / target_secs;
        let calculated = (required / bytes_per_sec).floor() as u64;
        Self::clamped(calculated.clamp(1, max))
    }

    /// Expected pass duration when writing at `bytes_per_sec`
    pub fn estimated_completion(self, device_size: u64, bytes_per_sec: f64) -> Option<Duration> {
        if !(bytes_per_sec > 0.0) {
            return None;
        }
        let secs = device_size as f64 / (bytes_per_sec * self.get() as f64);
        Duration::try_from_secs_f64(secs).ok()
    }

    fn clamped(k: u64) -> Self {
        NonZeroU64::new(k).map(Self).unwrap_or(Self::FULL)
    }
}

impl Default for SkipFactor {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<u64> for SkipFactor {
    type Error = WipeError;

    fn try_from(k: u64) -> Result<Self> {
        Self::new(k)
    }
}

impl From<SkipFactor> for u64 {
    fn from(k: SkipFactor) -> u64 {
        k.get()
    }
}

impl fmt::Display for SkipFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
