//! Finding entity
//!
//! The outcome of one successful walk: a validated byte range plus a
//! classification. Findings are created fresh per walk and carry no
//! references back into the byte source.

use super::file_signature::Format;
use crate::formats::iso::VolumeSummary;
use crate::formats::png::PngImage;
use serde::Serialize;
use std::ops::Range;

/// Parsed model attached to a structured finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParsedModel {
    Png(PngImage),
    Iso(VolumeSummary),
}

/// How a finding should be treated by the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FindingResult {
    /// Opaque byte range
    Buffer,
    /// Byte range with a parsed model
    StructuredObject(ParsedModel),
}

/// How the walk that produced a finding came to a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// The format's own terminator was consumed
    Clean,
    /// An unrecognized tag byte ended the walk early. The reported extent
    /// covers everything consumed up to and including that byte.
    UnknownTag { tag: u8, offset: u64 },
}

/// A validated byte range produced by a format walker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Absolute offset of the first byte
    pub start: u64,
    /// Absolute offset one past the last byte
    pub end: u64,
    pub format: Format,
    pub result: FindingResult,
    pub termination: Termination,
}

impl Finding {
    pub fn buffer(format: Format, start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            format,
            result: FindingResult::Buffer,
            termination: Termination::Clean,
        }
    }

    pub fn structured(format: Format, start: u64, end: u64, model: ParsedModel) -> Self {
        Self {
            start,
            end,
            format,
            result: FindingResult::StructuredObject(model),
            termination: Termination::Clean,
        }
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }

    /// True when the walk stopped on something other than the format's
    /// terminator, so the real structure may extend past `end`
    pub fn possibly_truncated(&self) -> bool {
        !matches!(self.termination, Termination::Clean)
    }

    pub fn model(&self) -> Option<&ParsedModel> {
        match &self.result {
            FindingResult::Buffer => None,
            FindingResult::StructuredObject(model) => Some(model),
        }
    }

    pub fn overlaps(&self, other: &Finding) -> bool {
        self.start < other.end && other.start < self.end
    }
}
