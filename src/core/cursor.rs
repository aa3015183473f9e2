//! Bounds-checked sequential reader over a [`ByteSource`].

use super::error::{WalkError, WalkResult};
use super::io::ByteSource;

/// Sequential reader tracking an absolute position in a byte source.
///
/// The position only advances after the bytes it moves over were proven
/// readable, so a failed read leaves the cursor where it was.
#[derive(Debug)]
pub struct Cursor<'s, S: ?Sized> {
    source: &'s S,
    pos: u64,
}

impl<'s, S: ByteSource + ?Sized> Cursor<'s, S> {
    pub fn new(source: &'s S, pos: u64) -> Self {
        Self { source, pos }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn source(&self) -> &'s S {
        self.source
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn fill(&mut self, buf: &mut [u8]) -> WalkResult<()> {
        self.source
            .read_exact_at(self.pos, buf)
            .map_err(|_| WalkError::Truncated {
                offset: self.pos,
                len: buf.len() as u64,
            })?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> WalkResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    #[inline]
    pub fn read_u8(&mut self) -> WalkResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u32_be(&mut self) -> WalkResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads `len` bytes into a fresh buffer. Nothing is allocated unless
    /// the source holds all of them.
    pub fn read_vec(&mut self, len: usize) -> WalkResult<Vec<u8>> {
        if !self.source.contains(self.pos, len as u64) {
            return Err(WalkError::Truncated {
                offset: self.pos,
                len: len as u64,
            });
        }
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Advances over `len` bytes after checking they exist in the source.
    pub fn skip(&mut self, len: u64) -> WalkResult<()> {
        if !self.source.contains(self.pos, len) {
            return Err(WalkError::Truncated {
                offset: self.pos,
                len,
            });
        }
        self.pos += len;
        Ok(())
    }
}
