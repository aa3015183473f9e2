//! File signature entity
//!
//! Represents the magic bytes that identify a structured format and where
//! they sit relative to the start of the structure. This is the entry
//! point of carving: a signature hit only nominates a candidate offset,
//! the format walker decides whether the structure really begins there.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured formats a walker exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Block-based image container (GIF87a / GIF89a)
    Gif,
    /// Chunk-based image container (PNG)
    Png,
    /// Volume/descriptor-based filesystem image (ISO9660 / ECMA-119)
    Iso,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Gif, Format::Png, Format::Iso];

    /// Returns the typical file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Gif => "gif",
            Format::Png => "png",
            Format::Iso => "iso",
        }
    }

    /// Returns a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Format::Gif => "GIF Image",
            Format::Png => "PNG Image",
            Format::Iso => "ISO9660 Image",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Format::Gif | Format::Png => Category::Image,
            Format::Iso => Category::Archive,
        }
    }

    /// Parses a user-supplied format name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gif" => Some(Format::Gif),
            "png" => Some(Format::Png),
            "iso" | "iso9660" | "ecma119" => Some(Format::Iso),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Broad grouping used when presenting carved output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Image,
    Archive,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Image => f.pad("image"),
            Category::Archive => f.pad("archive"),
        }
    }
}

/// Magic bytes that nominate a candidate structure start
#[derive(Debug, Clone)]
pub struct FileSignature {
    /// The format this signature identifies
    format: Format,
    /// The magic bytes
    pattern: Vec<u8>,
    /// Distance from the structure start to the first magic byte
    pattern_offset: u64,
}

impl FileSignature {
    /// Creates a signature found at the very start of the structure
    pub fn new(format: Format, pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            pattern: pattern.into(),
            pattern_offset: 0,
        }
    }

    /// Places the magic bytes at a fixed distance from the structure start
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.pattern_offset = offset;
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn pattern_offset(&self) -> u64 {
        self.pattern_offset
    }

    /// Checks whether `data`, taken as the bytes of a candidate structure
    /// start, carries this signature
    pub fn matches(&self, data: &[u8]) -> bool {
        let start = self.pattern_offset as usize;
        data.get(start..start + self.pattern.len()) == Some(self.pattern.as_slice())
    }
}

/// A signature hit: a candidate offset where a structure may begin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    /// Absolute offset of the candidate structure start
    pub start: u64,
    /// Format nominated by the signature
    pub format: Format,
}

impl Candidate {
    pub fn new(start: u64, format: Format) -> Self {
        Self { start, format }
    }
}
