//! GIF block walker.
//!
//! Layout: 6-byte signature, 7-byte logical screen descriptor, optional
//! global color table, then a sequence of blocks selected by a one-byte
//! sentinel until the trailer.

use crate::core::{ByteSource, Cursor, WalkError, WalkResult};
use crate::domain::entities::{Finding, Format, Termination, WalkLimits};
use tracing::{debug, trace};

pub const GIF87A: [u8; 6] = *b"GIF87a";
pub const GIF89A: [u8; 6] = *b"GIF89a";

pub const TRAILER: u8 = 0x3B;
pub const EXTENSION: u8 = 0x21;
pub const IMAGE: u8 = 0x2C;

const SCREEN_DESCRIPTOR_SIZE: usize = 7;
/// Image descriptor bytes preceding the packed local flags byte
const IMAGE_DESCRIPTOR_PREFIX: u64 = 8;
const COLOR_TABLE_PRESENT: u8 = 0x80;

/// Bytes occupied by a color table described by a packed flags byte.
///
/// Only the low three bits carry the size field.
#[inline]
pub const fn color_table_size(flags: u8) -> u64 {
    3 * (1u64 << ((flags & 0x07) + 1))
}

/// Bytes to skip for the color table announced by `flags`, zero when the
/// presence bit is clear.
#[inline]
pub const fn color_table_skip(flags: u8) -> u64 {
    if flags & COLOR_TABLE_PRESENT != 0 {
        color_table_size(flags)
    } else {
        0
    }
}

/// Decoded logical screen descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub flags: u8,
    pub background_color: u8,
    pub pixel_aspect_ratio: u8,
}

impl ScreenDescriptor {
    pub fn from_bytes(data: &[u8; SCREEN_DESCRIPTOR_SIZE]) -> Self {
        Self {
            width: u16::from_le_bytes([data[0], data[1]]),
            height: u16::from_le_bytes([data[2], data[3]]),
            flags: data[4],
            background_color: data[5],
            pixel_aspect_ratio: data[6],
        }
    }

    pub fn has_global_color_table(&self) -> bool {
        self.flags & COLOR_TABLE_PRESENT != 0
    }
}

/// Block selected by a sentinel byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Trailer,
    Extension,
    Image,
    Unknown(u8),
}

impl Block {
    pub const fn from_sentinel(sentinel: u8) -> Self {
        match sentinel {
            TRAILER => Self::Trailer,
            EXTENSION => Self::Extension,
            IMAGE => Self::Image,
            other => Self::Unknown(other),
        }
    }
}

/// Walks GIF block structure to find the exact end of an image
#[derive(Debug, Clone, Copy, Default)]
pub struct GifWalker {
    limits: WalkLimits,
}

impl GifWalker {
    pub fn new(limits: WalkLimits) -> Self {
        Self { limits }
    }

    pub fn matches_signature(magic: &[u8]) -> bool {
        magic == GIF87A || magic == GIF89A
    }

    /// Checks whether a GIF begins at `offset` and returns its extent.
    pub fn check<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> WalkResult<Finding> {
        let result = self.walk(source, offset);
        if let Err(ref err) = result {
            debug!(offset, kind = %err.kind(), %err, "GIF rejected");
        }
        result
    }

    fn walk<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> WalkResult<Finding> {
        let mut cur = Cursor::new(source, offset);

        let magic: [u8; 6] = cur.read_array().map_err(|_| WalkError::NoMatch)?;
        if !Self::matches_signature(&magic) {
            return Err(WalkError::NoMatch);
        }

        let screen = ScreenDescriptor::from_bytes(&cur.read_array()?);
        if screen.width == 0 || screen.height == 0 {
            return Err(WalkError::invalid(
                offset + 6,
                format!("zero screen dimension {}x{}", screen.width, screen.height),
            ));
        }
        cur.skip(color_table_skip(screen.flags))?;

        let mut blocks = 0u64;
        loop {
            let sentinel_offset = cur.position();
            let sentinel = cur.read_u8()?;
            match Block::from_sentinel(sentinel) {
                Block::Trailer => {
                    return Ok(Finding::buffer(Format::Gif, offset, cur.position()));
                }
                Block::Extension => {
                    let label = cur.read_u8()?;
                    trace!(offset = sentinel_offset, label, "GIF extension block");
                    self.skip_sub_blocks(&mut cur)?;
                }
                Block::Image => {
                    cur.skip(IMAGE_DESCRIPTOR_PREFIX)?;
                    let local_flags = cur.read_u8()?;
                    cur.skip(color_table_skip(local_flags))?;
                    // LZW minimum code size
                    cur.skip(1)?;
                    trace!(offset = sentinel_offset, "GIF image block");
                    self.skip_sub_blocks(&mut cur)?;
                }
                Block::Unknown(tag) => {
                    debug!(
                        offset = sentinel_offset,
                        tag, "GIF walk stopped on unknown block tag"
                    );
                    return Ok(Finding::buffer(Format::Gif, offset, cur.position())
                        .with_termination(Termination::UnknownTag {
                            tag,
                            offset: sentinel_offset,
                        }));
                }
            }

            blocks += 1;
            if blocks > self.limits.max_blocks {
                return Err(WalkError::BudgetExhausted {
                    what: "blocks",
                    limit: self.limits.max_blocks,
                });
            }
        }
    }

    /// Skips a chain of size-prefixed sub-blocks, stopping right after the
    /// first zero-size marker.
    fn skip_sub_blocks<S: ByteSource + ?Sized>(&self, cur: &mut Cursor<'_, S>) -> WalkResult<()> {
        let mut count = 0u64;
        loop {
            let size = cur.read_u8()?;
            if size == 0 {
                return Ok(());
            }
            cur.skip(u64::from(size))?;

            count += 1;
            if count > self.limits.max_sub_blocks {
                return Err(WalkError::BudgetExhausted {
                    what: "sub-blocks",
                    limit: self.limits.max_sub_blocks,
                });
            }
        }
    }
}
