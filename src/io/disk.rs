use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Result, WipeError, DIRECT_IO_ALIGNMENT};

/// Sequential block-write operations used by the benchmark and wipe passes
pub trait BlockTarget {
    /// Write all of `buf` at the current position, failing on a short write
    fn write_block(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Advance the position by `delta` bytes without writing
    fn seek_relative(&mut self, delta: u64) -> io::Result<u64>;

    /// Move to an absolute position
    fn seek_to(&mut self, pos: u64) -> io::Result<u64>;

    /// Current position
    fn position(&mut self) -> io::Result<u64>;

    /// Length of the target; leaves the position at 0
    fn size(&mut self) -> io::Result<u64>;

    /// Force written data to stable media
    fn sync_all(&mut self) -> io::Result<()>;

    /// How writes currently reach stable storage
    fn open_mode(&self) -> OpenMode;
}

/// How writes reach stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// Page cache bypassed and every write synchronized
    Direct,
    /// Page cache in use but every write synchronized
    BufferedSync,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Direct => write!(f, "direct+sync"),
            OpenMode::BufferedSync => write!(f, "buffered+sync"),
        }
    }
}

/// Write handle on a device or file.
///
/// The file descriptor is released when the handle is dropped, so every exit
/// path of a pass closes it.
pub struct DeviceHandle {
    file: File,
    path: PathBuf,
    mode: OpenMode,
    fallback_reason: Option<String>,
}

impl DeviceHandle {
    /// Open `path` for direct synchronized writes, falling back to buffered
    /// synchronized writes when direct I/O is refused.
    pub fn open(path: &Path) -> Result<Self> {
        match platform::open_direct_sync(path) {
            Ok(file) => {
                debug!(path = %path.display(), "opened with direct I/O");
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    mode: OpenMode::Direct,
                    fallback_reason: None,
                })
            }
            Err(direct_err) => {
                let file = platform::open_buffered_sync(path).map_err(|source| {
                    WipeError::OpenFailed {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                warn!(
                    path = %path.display(),
                    kind = ?direct_err.kind(),
                    error = %direct_err,
                    "direct I/O refused, falling back to synchronized buffered I/O"
                );
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    mode: OpenMode::BufferedSync,
                    fallback_reason: Some(direct_err.to_string()),
                })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Why direct I/O was not used, when the open fell back
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /// Device length, probed by seeking to the end and back to the start
    pub fn probe_size(&mut self) -> Result<u64> {
        self.size().map_err(|source| WipeError::ProbeFailed {
            path: self.path.clone(),
            source,
        })
    }

    /// Release the handle
    pub fn close(self) {
        drop(self);
    }

    /// Direct I/O cannot write a length that is not a multiple of the
    /// alignment. Reopen buffered+sync at the same offset for such a tail.
    fn downgrade_for_tail(&mut self) -> io::Result<()> {
        let pos = self.file.stream_position()?;
        let mut file = platform::open_buffered_sync(&self.path)?;
        file.seek(SeekFrom::Start(pos))?;
        debug!(
            path = %self.path.display(),
            offset = pos,
            "unaligned tail write, continuing in buffered+sync mode"
        );
        self.file = file;
        self.mode = OpenMode::BufferedSync;
        Ok(())
    }
}

impl BlockTarget for DeviceHandle {
    fn write_block(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.mode == OpenMode::Direct && buf.len() % DIRECT_IO_ALIGNMENT != 0 {
            self.downgrade_for_tail()?;
        }
        self.file.write_all(buf)
    }

    fn seek_relative(&mut self, delta: u64) -> io::Result<u64> {
        let delta = i64::try_from(delta).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "skip distance exceeds i64::MAX")
        })?;
        self.file.seek(SeekFrom::Current(delta))
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<u64> {
        self.file.seek(SeekFrom::Start(pos))
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&mut self) -> io::Result<u64> {
        seek_probe(&mut self.file)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn open_mode(&self) -> OpenMode {
        self.mode
    }
}

/// Probe the length of `path` without opening it for writing
pub fn probe_device_size(path: &Path) -> Result<u64> {
    let to_probe_err = |source| WipeError::ProbeFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(to_probe_err)?;
    seek_probe(&mut file).map_err(to_probe_err)
}

// Block devices report a zero metadata length, so the size comes from seeking.
fn seek_probe(file: &mut File) -> io::Result<u64> {
    let size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(size)
}

#[cfg(target_os = "linux")]
mod platform {
    use super::*;
    use std::os::unix::fs::OpenOptionsExt;

    pub fn open_direct_sync(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_DIRECT | libc::O_SYNC)
            .open(path)
    }

    pub fn open_buffered_sync(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
mod platform {
    use super::*;
    use std::os::unix::fs::OpenOptionsExt;

    pub fn open_direct_sync(_path: &Path) -> io::Result<File> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "O_DIRECT is not available on this platform",
        ))
    }

    pub fn open_buffered_sync(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
    }
}

#[cfg(windows)]
mod platform {
    use super::*;
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_FLAG_WRITE_THROUGH: u32 = 0x80000000;
    const FILE_FLAG_NO_BUFFERING: u32 = 0x20000000;

    pub fn open_direct_sync(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .custom_flags(FILE_FLAG_WRITE_THROUGH | FILE_FLAG_NO_BUFFERING)
            .open(path)
    }

    pub fn open_buffered_sync(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .custom_flags(FILE_FLAG_WRITE_THROUGH)
            .open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::AlignedBuffer;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_logs<F: FnOnce()>(f: F) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn zeroed_file(dir: &Path, len: u64) -> PathBuf {
        let path = dir.join("device.img");
        let file = File::create(&path).unwrap();
        file.set_len(len).unwrap();
        path
    }

    #[test]
    fn test_probe_device_size() {
        let temp_dir = tempdir().unwrap();
        let path = zeroed_file(temp_dir.path(), 20000);

        assert_eq!(probe_device_size(&path).unwrap(), 20000);
    }

    #[test]
    fn test_probe_missing_path() {
        let temp_dir = tempdir().unwrap();
        let result = probe_device_size(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(WipeError::ProbeFailed { .. })));
    }

    #[test]
    fn test_open_missing_path_fails() {
        let temp_dir = tempdir().unwrap();
        let result = DeviceHandle::open(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(WipeError::OpenFailed { .. })));
    }

    #[test]
    fn test_failed_open_does_not_log_fallback() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing");

        let logs = captured_logs(|| {
            assert!(DeviceHandle::open(&missing).is_err());
        });
        assert!(!logs.contains("falling back"));
    }

    #[test]
    fn test_fallback_is_logged_only_when_used() {
        let temp_dir = tempdir().unwrap();
        let path = zeroed_file(temp_dir.path(), 4096);

        let mut mode = None;
        let logs = captured_logs(|| {
            mode = Some(DeviceHandle::open(&path).unwrap().mode());
        });
        match mode.unwrap() {
            OpenMode::Direct => assert!(!logs.contains("falling back")),
            OpenMode::BufferedSync => {
                assert!(logs.contains("falling back"));
                assert!(logs.contains("kind="));
            }
        }
    }

    #[test]
    fn test_handle_size_restores_position() {
        let temp_dir = tempdir().unwrap();
        let path = zeroed_file(temp_dir.path(), 65536);

        let mut handle = DeviceHandle::open(&path).unwrap();
        handle.seek_to(8192).unwrap();
        assert_eq!(handle.probe_size().unwrap(), 65536);
        assert_eq!(handle.position().unwrap(), 0);
    }

    #[test]
    fn test_fallback_mode_is_reported() {
        let temp_dir = tempdir().unwrap();
        let path = zeroed_file(temp_dir.path(), 4096);

        let handle = DeviceHandle::open(&path).unwrap();
        match handle.mode() {
            OpenMode::Direct => assert!(handle.fallback_reason().is_none()),
            OpenMode::BufferedSync => assert!(handle.fallback_reason().is_some()),
        }
        handle.close();
    }

    #[test]
    fn test_write_skip_and_unaligned_tail() {
        let temp_dir = tempdir().unwrap();
        let path = zeroed_file(temp_dir.path(), 16384);

        let mut handle = DeviceHandle::open(&path).unwrap();
        let mut buffer = AlignedBuffer::allocate(4096).unwrap();
        buffer.as_mut_slice().fill(0xAB);

        handle.write_block(buffer.as_slice()).unwrap();
        assert_eq!(handle.seek_relative(8192).unwrap(), 12288);
        handle.write_block(&buffer.as_slice()[..1000]).unwrap();
        assert_eq!(handle.position().unwrap(), 13288);
        handle.sync_all().unwrap();
        drop(handle);

        let contents = fs::read(&path).unwrap();
        assert_eq!(contents.len(), 16384);
        assert!(contents[..4096].iter().all(|&b| b == 0xAB));
        assert!(contents[4096..12288].iter().all(|&b| b == 0));
        assert!(contents[12288..13288].iter().all(|&b| b == 0xAB));
        assert!(contents[13288..].iter().all(|&b| b == 0));
    }
}
