//! Application layer
//!
//! Use cases that drive the walkers over a whole source.

pub mod dto;
mod carve;
mod extract;

pub use carve::{carve, find_candidates};
pub use extract::{ExtractedFile, MANIFEST_FILE, Manifest, extract_findings, output_name};
