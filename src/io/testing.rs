//! In-memory block target for engine tests

use std::io;

use super::disk::{BlockTarget, OpenMode};

#[derive(Debug, Default)]
pub(crate) struct MemoryTarget {
    pub data: Vec<u8>,
    pub pos: u64,
    /// (offset, length) of every write
    pub writes: Vec<(u64, usize)>,
    /// Distance of every relative seek
    pub skips: Vec<u64>,
    pub syncs: usize,
    pub fail_write_at: Option<usize>,
    pub fail_skip: bool,
    pub fail_restore: bool,
    pub fail_sync: bool,
}

impl MemoryTarget {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            ..Self::default()
        }
    }

    pub fn written_bytes(&self) -> u64 {
        self.writes.iter().map(|&(_, len)| len as u64).sum()
    }
}

impl BlockTarget for MemoryTarget {
    fn write_block(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.fail_write_at == Some(self.writes.len()) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        self.writes.push((self.pos, buf.len()));
        self.pos = end as u64;
        Ok(())
    }

    fn seek_relative(&mut self, delta: u64) -> io::Result<u64> {
        if self.fail_skip {
            return Err(io::Error::new(io::ErrorKind::Other, "injected seek failure"));
        }
        self.skips.push(delta);
        self.pos += delta;
        Ok(self.pos)
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<u64> {
        if self.fail_restore {
            return Err(io::Error::new(io::ErrorKind::Other, "injected restore failure"));
        }
        self.pos = pos;
        Ok(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    fn size(&mut self) -> io::Result<u64> {
        self.pos = 0;
        Ok(self.data.len() as u64)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        self.syncs += 1;
        if self.fail_sync {
            return Err(io::Error::new(io::ErrorKind::Other, "injected sync failure"));
        }
        Ok(())
    }

    fn open_mode(&self) -> OpenMode {
        OpenMode::BufferedSync
    }
}
