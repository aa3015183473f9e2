//! Format walkers
//!
//! One module per structured format. Each walker answers the same question
//! for its format: does a structure begin at this offset, and where does
//! it end.

pub mod gif;
pub mod iso;
pub mod png;

pub use gif::GifWalker;
pub use iso::IsoWalker;
pub use png::PngWalker;
