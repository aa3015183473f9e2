//! Domain services
//!
//! Candidate detection and walker dispatch.

mod signature_registry;
mod walker;

pub use signature_registry::SignatureRegistry;
pub use walker::Walker;
