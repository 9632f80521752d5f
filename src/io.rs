//! Byte sources for readers and the sequential writer used by every back-end.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Deref;
use std::path::Path;
use std::sync::Mutex;

use memmap2::Mmap;

use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::error::{ParamError, Result};

/// Read-only bytes of a whole file or buffer.
#[derive(Debug)]
pub enum Source {
    /// A memory-mapped file.
    Mapped(Mmap),
    /// Bytes already in memory (also used for empty files, which cannot be mapped).
    Memory(Vec<u8>),
}

impl Source {
    /// Memory-maps the file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Self::Memory(Vec::new()));
        }
        // Safety: the map is read-only and lives no longer than this Source;
        // a concurrent writer truncating the file is outside our control.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped(mmap))
    }
}

impl Deref for Source {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(m) => m,
            Self::Memory(v) => v,
        }
    }
}

/// A buffered writer that tracks how many bytes went through it.
#[derive(Debug)]
pub struct SeqWriter<W: Write> {
    inner: Mutex<WriterState<W>>,
}

#[derive(Debug)]
struct WriterState<W: Write> {
    writer: BufWriter<W>,
    offset: u64,
}

impl SeqWriter<File> {
    /// Creates (truncating) the file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> SeqWriter<W> {
    /// Wraps any sink.
    pub fn new(sink: W) -> Self {
        Self {
            inner: Mutex::new(WriterState {
                writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, sink),
                offset: 0,
            }),
        }
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, WriterState<W>>> {
        self.inner
            .lock()
            .map_err(|_| ParamError::poisoned("SeqWriter"))
    }

    /// Writes a complete buffer and returns the offset it started at.
    pub fn write_all(&self, buffer: &[u8]) -> Result<u64> {
        let mut state = self.state()?;
        let start = state.offset;
        state.writer.write_all(buffer)?;
        state.offset += buffer.len() as u64;
        Ok(start)
    }

    /// Flushes buffered bytes to the sink.
    pub fn flush(&self) -> Result<()> {
        self.state()?.writer.flush()?;
        Ok(())
    }

    /// Bytes written so far.
    pub fn current_offset(&self) -> Result<u64> {
        Ok(self.state()?.offset)
    }

    /// Flushes and returns the sink.
    pub fn into_inner(self) -> Result<W> {
        let state = self
            .inner
            .into_inner()
            .map_err(|_| ParamError::poisoned("SeqWriter"))?;
        state
            .writer
            .into_inner()
            .map_err(|e| ParamError::from(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate() -> Result<()> {
        let writer = SeqWriter::new(Vec::new());
        assert_eq!(writer.write_all(b"abc")?, 0);
        assert_eq!(writer.write_all(b"de")?, 3);
        assert_eq!(writer.current_offset()?, 5);
        assert_eq!(writer.into_inner()?, b"abcde");
        Ok(())
    }

    #[test]
    fn empty_file_is_an_empty_source() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty");
        File::create(&path)?;
        assert!(Source::open(&path)?.is_empty());
        Ok(())
    }
}
