//! Walker dispatch
//!
//! The set of formats is closed, so dispatch is a plain enum over the
//! three walkers rather than a trait object.

use crate::core::{ByteSource, WalkResult};
use crate::domain::entities::{Finding, Format, WalkLimits};
use crate::formats::{GifWalker, IsoWalker, PngWalker};

/// A format walker selected by format
#[derive(Debug, Clone, Copy)]
pub enum Walker {
    Gif(GifWalker),
    Png(PngWalker),
    Iso(IsoWalker),
}

impl Walker {
    /// Creates the walker for `format` with the given budgets
    pub fn new(format: Format, limits: WalkLimits) -> Self {
        match format {
            Format::Gif => Walker::Gif(GifWalker::new(limits)),
            Format::Png => Walker::Png(PngWalker::new(limits)),
            Format::Iso => Walker::Iso(IsoWalker::new(limits)),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Walker::Gif(_) => Format::Gif,
            Walker::Png(_) => Format::Png,
            Walker::Iso(_) => Format::Iso,
        }
    }

    /// Checks whether a structure of this format begins at `offset`.
    ///
    /// An `Err` means "not this format here" and is never fatal to the
    /// caller; its variant tells why.
    pub fn check<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> WalkResult<Finding> {
        match self {
            Walker::Gif(walker) => walker.check(source, offset),
            Walker::Png(walker) => walker.check(source, offset),
            Walker::Iso(walker) => walker.check(source, offset),
        }
    }
}
