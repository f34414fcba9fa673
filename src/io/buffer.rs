use rand::{CryptoRng, RngCore};

use crate::{Result, WipeError, DIRECT_IO_ALIGNMENT};

/// Round a requested buffer size down to the direct I/O alignment,
/// never going below one alignment unit.
pub fn aligned_buffer_size(requested: usize) -> usize {
    let aligned = (requested / DIRECT_IO_ALIGNMENT) * DIRECT_IO_ALIGNMENT;
    aligned.max(DIRECT_IO_ALIGNMENT)
}

/// Byte buffer whose start address is a multiple of [`DIRECT_IO_ALIGNMENT`].
///
/// The backing allocation is one alignment unit larger than the usable
/// region; the usable region starts at the first aligned address inside it.
/// The buffer is refilled in place for the lifetime of a pass and never
/// resized.
pub struct AlignedBuffer {
    storage: Vec<u8>,
    offset: usize,
    len: usize,
}

impl AlignedBuffer {
    /// Allocate a buffer of `size` rounded down to the alignment (minimum one unit)
    pub fn allocate(size: usize) -> Result<Self> {
        let len = aligned_buffer_size(size);
        let capacity = len.checked_add(DIRECT_IO_ALIGNMENT).ok_or_else(|| {
            WipeError::AllocFailed {
                size: len,
                reason: "size overflows address space".to_string(),
            }
        })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|e| WipeError::AllocFailed {
                size: len,
                reason: e.to_string(),
            })?;
        storage.resize(capacity, 0);

        let address = storage.as_ptr() as usize;
        let offset = (DIRECT_IO_ALIGNMENT - address % DIRECT_IO_ALIGNMENT) % DIRECT_IO_ALIGNMENT;

        Ok(Self {
            storage,
            offset,
            len,
        })
    }

    /// Overwrite the whole buffer with fresh bytes from a cryptographic RNG
    pub fn fill_random<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        rng.try_fill_bytes(self.as_mut_slice())
            .map_err(|e| WipeError::EntropyFailed(e.to_string()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.len]
    }

    /// Usable length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_aligned_buffer_size_rounding() {
        assert_eq!(aligned_buffer_size(0), 4096);
        assert_eq!(aligned_buffer_size(100), 4096);
        assert_eq!(aligned_buffer_size(4096), 4096);
        assert_eq!(aligned_buffer_size(8191), 4096);
        assert_eq!(aligned_buffer_size(8192), 8192);
        assert_eq!(aligned_buffer_size(4 * 1024 * 1024 + 17), 4 * 1024 * 1024);
    }

    #[test]
    fn test_allocation_is_aligned() {
        for size in [1, 4096, 5000, 12288, 65536, 1024 * 1024 + 3] {
            let buffer = AlignedBuffer::allocate(size).unwrap();
            assert_eq!(buffer.as_slice().as_ptr() as usize % DIRECT_IO_ALIGNMENT, 0);
            assert_eq!(buffer.len(), aligned_buffer_size(size));
            assert!(!buffer.is_empty());
        }
    }

    #[test]
    fn test_fill_random_changes_contents_in_place() {
        let mut buffer = AlignedBuffer::allocate(8192).unwrap();
        let base = buffer.as_slice().as_ptr();
        assert!(buffer.as_slice().iter().all(|&b| b == 0));

        buffer.fill_random(&mut OsRng).unwrap();
        let first = buffer.as_slice().to_vec();
        assert!(first.iter().any(|&b| b != 0));

        buffer.fill_random(&mut OsRng).unwrap();
        assert_ne!(first, buffer.as_slice());
        assert_eq!(buffer.as_slice().as_ptr(), base);
        assert_eq!(buffer.len(), 8192);
    }

    #[test]
    fn test_allocation_overflow_is_reported() {
        let result = AlignedBuffer::allocate(usize::MAX);
        assert!(matches!(result, Err(WipeError::AllocFailed { .. })));
    }
}
