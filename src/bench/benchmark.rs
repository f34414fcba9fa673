//! Write-speed benchmark
//!
//! Writes a bounded volume of random data at the device's current offset,
//! puts the offset back, and syncs before stopping the clock so the figure
//! reflects durable throughput rather than page-cache speed.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::WipeConfig;
use crate::io::{aligned_buffer_size, AlignedBuffer, BlockTarget, DeviceHandle};
use crate::models::{throughput, BenchmarkReport};
use crate::wipe::progress::{
    ProgressPhase, ProgressSink, ProgressTracker, DEFAULT_SMOOTHING_FACTOR,
};
use crate::{Result, WipeError};

/// Default amount of data written by a benchmark: 10 GiB
pub const DEFAULT_BENCHMARK_VOLUME: u64 = 10 * 1024 * 1024 * 1024;

/// Measures sustained synchronized write throughput
#[derive(Debug, Clone)]
pub struct Benchmarker {
    buffer_size: usize,
    volume: u64,
    update_interval: Duration,
    smoothing_factor: f64,
}

impl Benchmarker {
    /// `buffer_size` is rounded down to the direct I/O alignment (minimum one unit)
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: aligned_buffer_size(buffer_size),
            volume: DEFAULT_BENCHMARK_VOLUME,
            update_interval: Duration::from_secs(1),
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
        }
    }

    pub fn from_config(config: &WipeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.buffer_size_bytes()?)
            .with_volume(config.benchmark_volume)
            .with_update_interval(config.update_interval)
            .with_smoothing_factor(config.smoothing_factor))
    }

    /// Volume written on devices at least twice this size
    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = volume;
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

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Bytes the benchmark plans to write on a device of `device_size` bytes.
    ///
    /// Small devices (less than twice the configured volume) use a quarter of
    /// their size, but never less than two buffers.
    pub fn planned_volume(&self, device_size: u64) -> u64 {
        if device_size >= self.volume.saturating_mul(2) {
            return self.volume;
        }
        let min_volume = self.buffer_size as u64 * 2;
        (device_size / 4).max(min_volume)
    }

    /// Open `path`, probe its size and benchmark it from offset 0
    pub fn measure_path(&self, path: &Path, sink: &dyn ProgressSink) -> Result<BenchmarkReport> {
        let mut handle = DeviceHandle::open(path)?;
        let device_size = handle.probe_size()?;
        self.measure(&mut handle, device_size, sink)
    }

    /// Benchmark `target` from its current offset, leaving that offset unchanged
    pub fn measure<T: BlockTarget + ?Sized>(
        &self,
        target: &mut T,
        device_size: u64,
        sink: &dyn ProgressSink,
    ) -> Result<BenchmarkReport> {
        let start_offset = target
            .position()
            .map_err(|source| WipeError::SeekFailed { offset: 0, source })?;

        // Never write past the end of the device
        let room = device_size.saturating_sub(start_offset);
        let volume = self.planned_volume(device_size).min(room);
        if volume == 0 {
            return Err(WipeError::BenchmarkError(format!(
                "no room to benchmark at offset {} of a {} byte device",
                start_offset, device_size
            )));
        }

        let mut buffer = AlignedBuffer::allocate(self.buffer_size)?;
        let block = buffer.len() as u64;
        let mut rng = rand::thread_rng();

        info!(volume, buffer_size = block, mode = %target.open_mode(), "running write benchmark");

        let mut progress = ProgressTracker::start(
            ProgressPhase::Benchmark,
            volume,
            self.update_interval,
            self.smoothing_factor,
        );
        let mut bytes_written = 0u64;

        while bytes_written < volume {
            let step = buffer.fill_random(&mut rng).and_then(|()| {
                let write_size = block.min(volume - bytes_written);
                target
                    .write_block(&buffer.as_slice()[..write_size as usize])
                    .map(|()| write_size)
                    .map_err(|source| WipeError::WriteFailed {
                        offset: start_offset + bytes_written,
                        source,
                    })
            });

            match step {
                Ok(write_size) => bytes_written += write_size,
                Err(e) => {
                    // Best-effort restore; the original error is returned either way
                    if let Err(restore) = target.seek_to(start_offset) {
                        warn!(
                            offset = start_offset,
                            error = %restore,
                            "could not restore offset after failed benchmark"
                        );
                    }
                    return Err(e);
                }
            }

            progress.tick(bytes_written, bytes_written, sink);
        }

        if let Err(source) = target.seek_to(start_offset) {
            return Err(WipeError::PositionRestoreFailed {
                bytes_per_sec: throughput(bytes_written, progress.elapsed()),
                offset: start_offset,
                source,
            });
        }

        target.sync_all().map_err(WipeError::SyncFailed)?;

        let elapsed = progress.elapsed();
        progress.finish(bytes_written, bytes_written, sink);

        let report = BenchmarkReport::new(volume, bytes_written, elapsed, target.open_mode());
        if !(report.bytes_per_sec > 0.0 && report.bytes_per_sec.is_finite()) {
            return Err(WipeError::BenchmarkError(
                "benchmark finished too quickly to measure throughput".to_string(),
            ));
        }

        debug!(
            bytes_written,
            elapsed_ms = elapsed.as_millis() as u64,
            bytes_per_sec = report.bytes_per_sec,
            "benchmark complete"
        );
        Ok(report)
    }
}
