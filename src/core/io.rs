//! Random-access byte sources the walkers read from.
//!
//! Walkers never assume the structure they examine is resident in memory.
//! Every access is a bounded "copy N bytes at offset" request that either
//! fills the whole buffer or fails; a source never returns a short read and
//! never panics on an out-of-range request.

use super::error::SourceError;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A source of raw bytes addressed by absolute offset.
///
/// Implementations must be `Send + Sync` so the carving driver can check
/// several candidates against the same source in parallel.
pub trait ByteSource: Send + Sync {
    /// Total readable size in bytes.
    fn len(&self) -> u64;

    /// Returns true if the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// Fails with [`SourceError::OutOfRange`] if any requested byte lies
    /// past the end of the source. On failure the buffer contents are
    /// unspecified.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError>;

    /// Returns true if `len` bytes starting at `offset` are within the source.
    fn contains(&self, offset: u64, len: u64) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.len())
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        (**self).read_exact_at(offset, buf)
    }
}

#[inline]
fn check_range(offset: u64, len: usize, size: u64) -> Result<usize, SourceError> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(offset as usize),
        _ => Err(SourceError::OutOfRange { offset, len, size }),
    }
}

/// Byte source over a borrowed in-memory buffer.
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'a> {
    data: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }
}

impl ByteSource for SliceSource<'_> {
    #[inline]
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        let start = check_range(offset, buf.len(), self.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

/// Byte source backed by positional reads on an open file.
///
/// Pages are fetched on demand, so very large images can be examined
/// without loading them.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

impl ByteSource for FileSource {
    #[inline]
    fn len(&self) -> u64 {
        self.size
    }

    #[cfg(unix)]
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        use std::os::unix::fs::FileExt;

        check_range(offset, buf.len(), self.size)?;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    #[cfg(windows)]
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        use std::os::windows::fs::FileExt;

        check_range(offset, buf.len(), self.size)?;
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self.file.seek_read(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(SourceError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            filled += n;
        }
        Ok(())
    }
}

/// Memory-mapped byte source for image files.
pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only; concurrent truncation of the
        // underlying file by another process is outside our control.
        let mmap = unsafe { Mmap::map(&file) }?;

        #[cfg(unix)]
        {
            let _ = mmap.advise(memmap2::Advice::Sequential);
        }

        Ok(Self { mmap })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl ByteSource for MmapSource {
    #[inline]
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        let start = check_range(offset, buf.len(), self.len())?;
        buf.copy_from_slice(&self.mmap[start..start + buf.len()]);
        Ok(())
    }
}

/// An offset-shifted view of another source.
///
/// Offset 0 of the window is `base` in the inner source. The window extends
/// to the end of the inner source.
#[derive(Debug, Clone, Copy)]
pub struct Window<S> {
    inner: S,
    base: u64,
}

impl<S: ByteSource> Window<S> {
    pub fn new(inner: S, base: u64) -> Self {
        Self { inner, base }
    }

    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }
}

impl<S: ByteSource> ByteSource for Window<S> {
    fn len(&self) -> u64 {
        self.inner.len().saturating_sub(self.base)
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SourceError> {
        let absolute = self
            .base
            .checked_add(offset)
            .ok_or(SourceError::OutOfRange {
                offset,
                len: buf.len(),
                size: self.len(),
            })?;
        self.inner.read_exact_at(absolute, buf)
    }
}
