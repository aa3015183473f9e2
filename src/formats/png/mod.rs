//! PNG chunk container.
//!
//! An 8-byte header followed by `length | type | data | crc` chunks, with
//! the length and CRC stored big-endian. IEND closes the stream.

mod walker;

pub use walker::PngWalker;

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Range;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const HEADER_SIZE: u64 = PNG_SIGNATURE.len() as u64;
/// Length, type and CRC fields around every chunk payload
pub const CHUNK_OVERHEAD: u64 = 12;
pub const IHDR_SIZE: usize = 13;
pub const MAX_CHUNK_LENGTH: u32 = 0x7FFF_FFFF;

pub const IHDR: ChunkTag = ChunkTag(*b"IHDR");
pub const PLTE: ChunkTag = ChunkTag(*b"PLTE");
pub const IDAT: ChunkTag = ChunkTag(*b"IDAT");
pub const IEND: ChunkTag = ChunkTag(*b"IEND");
pub const TEXT: ChunkTag = ChunkTag(*b"tEXt");
pub const TIME: ChunkTag = ChunkTag(*b"tIME");
pub const PHYS: ChunkTag = ChunkTag(*b"pHYs");
pub const GAMA: ChunkTag = ChunkTag(*b"gAMA");

/// Chunks whose payload is kept and CRC-checked; all others are skipped.
const INSPECTED: [ChunkTag; 6] = [IHDR, PLTE, TEXT, TIME, PHYS, GAMA];

/// Four-byte chunk type tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    #[inline]
    pub const fn bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Critical chunks have the ancillary bit of the first byte clear
    #[inline]
    pub const fn is_critical(&self) -> bool {
        self.0[0] & 0x20 == 0
    }

    #[inline]
    pub fn is_inspected(&self) -> bool {
        INSPECTED.contains(self)
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkTag({self})")
    }
}

impl Serialize for ChunkTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Offset of the length field, relative to the PNG header
    pub offset: u64,
    pub length: u32,
    pub tag: ChunkTag,
    /// Payload, captured only for inspected tags
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub crc: u32,
    /// CRC comparison for captured payloads; `None` when the payload was skipped
    pub crc_matches: Option<bool>,
}

impl Chunk {
    #[inline]
    pub const fn total_size(&self) -> u64 {
        CHUNK_OVERHEAD + self.length as u64
    }

    #[inline]
    pub const fn end(&self) -> u64 {
        self.offset + self.total_size()
    }
}

/// Image header fields, normalized to host order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ihdr {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression_method: u8,
    pub filter_method: u8,
    pub interlace_method: u8,
}

impl Ihdr {
    pub fn from_bytes(data: &[u8; IHDR_SIZE]) -> Self {
        Self {
            width: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            height: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            bit_depth: data[8],
            color_type: data[9],
            compression_method: data[10],
            filter_method: data[11],
            interlace_method: data[12],
        }
    }

    pub fn bit_depth_description(&self) -> &'static str {
        match self.bit_depth {
            1 => "1 bit per channel (2 shades: black and white)",
            2 => "2 bits per channel (4 shades)",
            4 => "4 bits per channel (16 shades)",
            8 => "8 bits per channel (256 shades or colors)",
            16 => "16 bits per channel (65,536 shades or colors, high precision)",
            _ => "Unknown",
        }
    }

    pub fn color_type_description(&self) -> &'static str {
        match self.color_type {
            0 => "Grayscale",
            2 => "Truecolor",
            3 => "Indexed-color",
            4 => "Grayscale with alpha",
            6 => "Truecolor with alpha",
            _ => "Unknown",
        }
    }

    pub fn compression_method_description(&self) -> &'static str {
        if self.compression_method == 0 {
            "Deflate"
        } else {
            "Unknown"
        }
    }

    pub fn filter_method_description(&self) -> &'static str {
        if self.filter_method == 0 {
            "Adaptive"
        } else {
            "Unknown"
        }
    }

    pub fn interlace_method_description(&self) -> &'static str {
        match self.interlace_method {
            0 => "No interlace",
            1 => "Adam7 interlace",
            _ => "Unknown",
        }
    }
}

/// A labelled byte range for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub range: Range<u64>,
    pub label: String,
}

/// Result of a chunk walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PngImage {
    pub ihdr: Option<Ihdr>,
    pub chunks: Vec<Chunk>,
    /// Total bytes from the header through the end of IEND
    pub size: u64,
}

impl PngImage {
    pub fn chunk_count(&self, tag: ChunkTag) -> usize {
        self.chunks.iter().filter(|c| c.tag == tag).count()
    }

    /// Chunks whose captured payload did not match the stored CRC
    pub fn crc_mismatches(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.crc_matches == Some(false))
    }

    /// Keyword/text pairs from tEXt chunks
    pub fn text_entries(&self) -> Vec<(String, String)> {
        self.chunks
            .iter()
            .filter(|c| c.tag == TEXT)
            .filter_map(|c| c.data.as_deref())
            .filter_map(|data| {
                let nul = data.iter().position(|&b| b == 0)?;
                Some((
                    String::from_utf8_lossy(&data[..nul]).into_owned(),
                    String::from_utf8_lossy(&data[nul + 1..]).into_owned(),
                ))
            })
            .collect()
    }

    /// Header zone followed by one zone per chunk, relative to the header
    pub fn layout(&self) -> Vec<Zone> {
        let mut zones = Vec::with_capacity(self.chunks.len() + 1);
        zones.push(Zone {
            range: 0..HEADER_SIZE,
            label: "PNG Magic".to_string(),
        });
        zones.extend(self.chunks.iter().map(|c| Zone {
            range: c.offset..c.end(),
            label: format!("Chunk: {}", c.tag),
        }));
        zones
    }
}
