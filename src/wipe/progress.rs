//! Progress sampling and speed estimation
//!
//! Passes emit [`ProgressUpdate`]s at a bounded rate through a
//! [`ProgressSink`]. Speed is derived from consecutive samples and smoothed
//! with an exponential moving average; the ETA uses the smoothed value.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;

/// Reference smoothing factor for the moving average
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.2;

/// Which pass produced an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Benchmark,
    Wipe,
}

/// Byte counters at a point in time, relative to the start of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSample {
    pub elapsed: Duration,
    /// Bytes traversed, written or skipped
    pub bytes_processed: u64,
    /// Bytes actually overwritten
    pub bytes_written: u64,
}

impl ProgressSample {
    pub fn new(elapsed: Duration, bytes_processed: u64, bytes_written: u64) -> Self {
        Self {
            elapsed,
            bytes_processed,
            bytes_written,
        }
    }
}

/// Throughput in bytes per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SpeedState {
    pub instantaneous: f64,
    pub smoothed: f64,
}

/// Turns a stream of samples into instantaneous and smoothed throughput
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    alpha: f64,
    previous: Option<ProgressSample>,
    seeded: bool,
    state: SpeedState,
}

impl SpeedEstimator {
    /// `alpha` outside `(0, 1]` falls back to [`DEFAULT_SMOOTHING_FACTOR`]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha > 0.0 && alpha <= 1.0 {
            alpha
        } else {
            DEFAULT_SMOOTHING_FACTOR
        };
        Self {
            alpha,
            previous: None,
            seeded: false,
            state: SpeedState::default(),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Feed the next sample and return the updated speeds.
    ///
    /// The first sample only establishes the baseline. A sample with no
    /// elapsed time since the previous one leaves the state untouched.
    pub fn observe(&mut self, sample: ProgressSample) -> SpeedState {
        if let Some(previous) = self.previous {
            let dt = sample.elapsed.saturating_sub(previous.elapsed).as_secs_f64();
            if dt <= 0.0 {
                return self.state;
            }

            let delta = sample
                .bytes_processed
                .saturating_sub(previous.bytes_processed) as f64;
            let instantaneous = delta / dt;

            self.state.smoothed = if self.seeded {
                self.state.smoothed * (1.0 - self.alpha) + instantaneous * self.alpha
            } else {
                instantaneous
            };
            self.state.instantaneous = instantaneous;
            self.seeded = true;
        }

        self.previous = Some(sample);
        self.state
    }

    pub fn state(&self) -> SpeedState {
        self.state
    }

    /// Time to process `remaining` bytes at the smoothed speed.
    ///
    /// `None` while the smoothed speed is zero or not yet known.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let speed = self.state.smoothed;
        if !(speed > 0.0 && speed.is_finite()) {
            return None;
        }
        Duration::try_from_secs_f64(remaining as f64 / speed).ok()
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.seeded = false;
        self.state = SpeedState::default();
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

/// Progress event delivered to the caller during a pass
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub sample: ProgressSample,
    pub speed: SpeedState,
    /// Bytes the pass will traverse in total
    pub total_bytes: u64,
    /// Estimated time remaining, from the smoothed speed
    pub eta: Option<Duration>,
    /// Last update of a completed pass
    pub is_final: bool,
}

impl ProgressUpdate {
    /// Traversed share of the pass, in percent
    pub fn percent_complete(&self) -> f64 {
        percent_of(self.sample.bytes_processed, self.total_bytes)
    }

    /// Overwritten share of the pass, in percent
    pub fn coverage_percentage(&self) -> f64 {
        percent_of(self.sample.bytes_written, self.total_bytes)
    }
}

fn percent_of(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

/// Receiver of progress updates.
///
/// Implementations must not block: the engine calls `publish` between
/// writes on its only thread.
pub trait ProgressSink {
    fn publish(&self, update: ProgressUpdate);
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn publish(&self, _update: ProgressUpdate) {}
}

impl ProgressSink for mpsc::Sender<ProgressUpdate> {
    fn publish(&self, update: ProgressUpdate) {
        // Full or closed channel: the renderer is behind or gone, drop the sample.
        let _ = self.try_send(update);
    }
}

/// Collects every update, mainly for inspection after a pass
impl ProgressSink for Mutex<Vec<ProgressUpdate>> {
    fn publish(&self, update: ProgressUpdate) {
        if let Ok(mut updates) = self.lock() {
            updates.push(update);
        }
    }
}

/// Rate-limited emitter shared by the benchmark and wipe passes
pub(crate) struct ProgressTracker {
    phase: ProgressPhase,
    total_bytes: u64,
    interval: Duration,
    started: Instant,
    last_emit: Instant,
    estimator: SpeedEstimator,
}

impl ProgressTracker {
    pub(crate) fn start(
        phase: ProgressPhase,
        total_bytes: u64,
        interval: Duration,
        smoothing_factor: f64,
    ) -> Self {
        let started = Instant::now();
        let mut estimator = SpeedEstimator::new(smoothing_factor);
        estimator.observe(ProgressSample::default());
        Self {
            phase,
            total_bytes,
            interval,
            started,
            last_emit: started,
            estimator,
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Emit if at least one interval passed since the last emission
    pub(crate) fn tick(
        &mut self,
        bytes_processed: u64,
        bytes_written: u64,
        sink: &dyn ProgressSink,
    ) {
        let now = Instant::now();
        if now.duration_since(self.last_emit) >= self.interval {
            self.emit(now, bytes_processed, bytes_written, false, sink);
        }
    }

    pub(crate) fn finish(
        &mut self,
        bytes_processed: u64,
        bytes_written: u64,
        sink: &dyn ProgressSink,
    ) {
        self.emit(Instant::now(), bytes_processed, bytes_written, true, sink);
    }

    fn emit(
        &mut self,
        now: Instant,
        bytes_processed: u64,
        bytes_written: u64,
        is_final: bool,
        sink: &dyn ProgressSink,
    ) {
        let sample = ProgressSample::new(
            now.duration_since(self.started),
            bytes_processed,
            bytes_written,
        );
        let speed = self.estimator.observe(sample);
        let eta = if is_final {
            Some(Duration::ZERO)
        } else {
            self.estimator
                .eta(self.total_bytes.saturating_sub(bytes_processed))
        };

        sink.publish(ProgressUpdate {
            phase: self.phase,
            sample,
            speed,
            total_bytes: self.total_bytes,
            eta,
            is_final,
        });
        self.last_emit = now;
    }
}
