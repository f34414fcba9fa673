//! Sampling wipe pass
//!
//! Fills an aligned buffer with fresh random bytes every iteration, writes
//! it, and when the skip factor is above one seeks over `k - 1` buffers'
//! worth of bytes before the next write. The pass ends once the processed
//! (written + skipped) byte count reaches the device size.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::WipeConfig;
use crate::io::{aligned_buffer_size, AlignedBuffer, BlockTarget, DeviceHandle};
use crate::models::{throughput, WipeSummary};
use crate::wipe::progress::{
    ProgressPhase, ProgressSink, ProgressTracker, DEFAULT_SMOOTHING_FACTOR,
};
use crate::wipe::skip::SkipFactor;
use crate::{Result, WipeError};

/// Byte counters of a running pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassState {
    pub bytes_processed: u64,
    pub bytes_written: u64,
    pub bytes_skipped: u64,
}

impl PassState {
    fn record_write(&mut self, len: u64) {
        self.bytes_written += len;
        self.bytes_processed += len;
    }

    fn record_skip(&mut self, len: u64) {
        self.bytes_skipped += len;
        self.bytes_processed += len;
    }

    fn remaining(&self, size: u64) -> u64 {
        size.saturating_sub(self.bytes_processed)
    }
}

/// Overwrites a device with random data at a configurable stride
#[derive(Debug, Clone)]
pub struct WipeEngine {
    buffer_size: usize,
    skip_factor: SkipFactor,
    update_interval: Duration,
    smoothing_factor: f64,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl WipeEngine {
    /// `buffer_size` is rounded down to the direct I/O alignment (minimum one unit)
    pub fn new(buffer_size: usize, skip_factor: SkipFactor) -> Self {
        Self {
            buffer_size: aligned_buffer_size(buffer_size),
            skip_factor,
            update_interval: Duration::from_secs(1),
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            cancel_flag: None,
        }
    }

    pub fn from_config(config: &WipeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.buffer_size_bytes()?, config.skip_factor)
            .with_update_interval(config.update_interval)
            .with_smoothing_factor(config.smoothing_factor))
    }

    /// Minimum time between progress updates
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_smoothing_factor(mut self, alpha: f64) -> Self {
        self.smoothing_factor = alpha;
        self
    }

    pub fn with_skip_factor(mut self, skip_factor: SkipFactor) -> Self {
        self.skip_factor = skip_factor;
        self
    }

    /// Flag checked between iterations; setting it stops the pass
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Aligned buffer length used for every write
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn skip_factor(&self) -> SkipFactor {
        self.skip_factor
    }

    /// Open `path` and wipe its first `size` bytes
    pub fn run_on_path(
        &self,
        path: &Path,
        size: u64,
        sink: &dyn ProgressSink,
    ) -> Result<WipeSummary> {
        let mut handle = DeviceHandle::open(path)?;
        self.run(&mut handle, size, sink)
    }

    /// Wipe `size` bytes of `target` starting at its current position
    pub fn run<T: BlockTarget + ?Sized>(
        &self,
        target: &mut T,
        size: u64,
        sink: &dyn ProgressSink,
    ) -> Result<WipeSummary> {
        let mut buffer = AlignedBuffer::allocate(self.buffer_size)?;
        let block = buffer.len() as u64;
        let skip_stride = block.saturating_mul(self.skip_factor.get() - 1);
        let mut rng = rand::thread_rng();

        info!(
            size,
            buffer_size = block,
            skip_factor = %self.skip_factor,
            mode = %target.open_mode(),
            "starting wipe pass"
        );

        let mut state = PassState::default();
        let mut progress = ProgressTracker::start(
            ProgressPhase::Wipe,
            size,
            self.update_interval,
            self.smoothing_factor,
        );

        while state.bytes_processed < size {
            if self.is_cancelled() {
                if let Err(e) = target.sync_all() {
                    warn!(error = %e, "sync after cancellation failed");
                }
                info!(
                    bytes_processed = state.bytes_processed,
                    bytes_written = state.bytes_written,
                    "wipe pass cancelled"
                );
                return Err(WipeError::Cancelled {
                    bytes_processed: state.bytes_processed,
                    bytes_written: state.bytes_written,
                });
            }

            buffer.fill_random(&mut rng)?;

            let write_size = block.min(state.remaining(size));
            target
                .write_block(&buffer.as_slice()[..write_size as usize])
                .map_err(|source| WipeError::WriteFailed {
                    offset: state.bytes_processed,
                    source,
                })?;
            state.record_write(write_size);

            if !self.skip_factor.is_full() && state.bytes_processed < size {
                let skip_size = skip_stride.min(state.remaining(size));
                target
                    .seek_relative(skip_size)
                    .map_err(|source| WipeError::SeekFailed {
                        offset: state.bytes_processed,
                        source,
                    })?;
                state.record_skip(skip_size);
            }

            progress.tick(state.bytes_processed, state.bytes_written, sink);
        }

        let elapsed = progress.elapsed();
        progress.finish(state.bytes_processed, state.bytes_written, sink);

        let sync_warning = match target.sync_all() {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "final sync failed; data already reached the device write path");
                Some(e.to_string())
            }
        };

        debug!(
            bytes_processed = state.bytes_processed,
            bytes_written = state.bytes_written,
            bytes_skipped = state.bytes_skipped,
            elapsed_ms = elapsed.as_millis() as u64,
            "wipe pass finished"
        );

        Ok(WipeSummary {
            completed_at: Utc::now(),
            device_size: size,
            bytes_processed: state.bytes_processed,
            bytes_written: state.bytes_written,
            bytes_skipped: state.bytes_skipped,
            skip_factor: self.skip_factor.get(),
            buffer_size: buffer.len(),
            open_mode: target.open_mode(),
            elapsed,
            average_throughput: throughput(state.bytes_processed, elapsed),
            write_throughput: throughput(state.bytes_written, elapsed),
            sync_warning,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}
