//! Domain entities
//!
//! Core values shared by the walkers and the carving driver.

mod file_signature;
mod finding;
mod walk_limits;

pub use file_signature::{Candidate, Category, FileSignature, Format};
pub use finding::{Finding, FindingResult, ParsedModel, Termination};
pub use walk_limits::WalkLimits;
