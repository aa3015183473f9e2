//! Structure-aware boundary extraction.
//!
//! Given a byte source and a candidate offset, each format walker decides
//! whether a GIF, PNG or ISO9660 structure begins there and, if so, where
//! it ends. The application layer drives the walkers over a whole source
//! to carve and extract every structure it finds.

pub mod application;
pub mod core;
pub mod domain;
pub mod formats;

pub use crate::core::{ByteSource, RejectionKind, SliceSource, WalkError, WalkResult};
pub use domain::entities::{Finding, FindingResult, Format, ParsedModel, Termination, WalkLimits};
pub use domain::services::{SignatureRegistry, Walker};
