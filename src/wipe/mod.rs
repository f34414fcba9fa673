//! Wipe engine module
//!
//! The sampling overwrite pass, its skip factor, and the progress/speed
//! estimation it reports through.

pub mod engine;
pub mod progress;
pub mod skip;

// Re-export commonly used types
pub use engine::{PassState, WipeEngine};
pub use progress::{
    NoProgress, ProgressPhase, ProgressSample, ProgressSink, ProgressUpdate, SpeedEstimator,
    SpeedState, DEFAULT_SMOOTHING_FACTOR,
};
pub use skip::SkipFactor;
