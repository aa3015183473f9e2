use std::io;
use thiserror::Error;

/// Errors that can occur when reading from a byte source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Read of {len} bytes at offset {offset} exceeds source size {size}")]
    OutOfRange { offset: u64, len: usize, size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse class of a rejected walk, used for diagnostics and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum RejectionKind {
    NoMatch,
    Truncated,
    StructurallyInvalid,
    BudgetExhausted,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoMatch => "no match",
            Self::Truncated => "truncated",
            Self::StructurallyInvalid => "structurally invalid",
            Self::BudgetExhausted => "budget exhausted",
        };
        f.write_str(name)
    }
}

/// Why a format walker declined a candidate offset.
///
/// Every variant means "not this format here". None of them is fatal to the
/// caller, and no walker hands back a partially built result alongside one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    #[error("Signature does not match")]
    NoMatch,

    #[error("Unreadable {len} bytes at offset {offset}")]
    Truncated { offset: u64, len: u64 },

    #[error("Invalid structure at offset {offset}: {reason}")]
    StructurallyInvalid { offset: u64, reason: String },

    #[error("Exceeded limit of {limit} {what}")]
    BudgetExhausted { what: &'static str, limit: u64 },
}

impl WalkError {
    pub fn invalid(offset: u64, reason: impl Into<String>) -> Self {
        Self::StructurallyInvalid {
            offset,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::NoMatch => RejectionKind::NoMatch,
            Self::Truncated { .. } => RejectionKind::Truncated,
            Self::StructurallyInvalid { .. } => RejectionKind::StructurallyInvalid,
            Self::BudgetExhausted { .. } => RejectionKind::BudgetExhausted,
        }
    }
}

/// Errors raised while lazily expanding a directory tree node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Unknown tree node {0}")]
    UnknownNode(usize),

    #[error("Node {0} is not a directory")]
    NotADirectory(usize),

    #[error("Directory extent unreadable: {0}")]
    Unreadable(#[from] WalkError),
}

pub type WalkResult<T> = std::result::Result<T, WalkError>;
