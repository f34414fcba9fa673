//! I/O operations module
//!
//! Device handles with direct/synchronized write modes and the aligned
//! buffers direct I/O requires.

pub mod buffer;
pub mod disk;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::{aligned_buffer_size, AlignedBuffer};
pub use disk::{probe_device_size, BlockTarget, DeviceHandle, OpenMode};
