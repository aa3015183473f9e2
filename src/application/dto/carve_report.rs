//! Carve report DTO

use crate::core::RejectionKind;
use crate::domain::entities::{Finding, Format};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of carving one source
#[derive(Debug, Clone, Default, Serialize)]
pub struct CarveReport {
    /// Size of the carved source in bytes
    pub source_size: u64,
    /// Signature hits that were handed to a walker
    pub candidates: usize,
    /// Accepted, non-overlapping findings sorted by start offset
    pub findings: Vec<Finding>,
    /// Accepted findings dropped because an earlier finding covers them
    pub overlapped: usize,
    /// Rejected candidates by rejection class
    pub rejections: BTreeMap<RejectionKind, usize>,
    pub duration: Duration,
}

impl CarveReport {
    pub fn new(source_size: u64) -> Self {
        Self {
            source_size,
            ..Default::default()
        }
    }

    /// Number of kept findings per format
    pub fn per_format(&self) -> BTreeMap<Format, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.format).or_insert(0) += 1;
        }
        counts
    }

    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }

    /// Bytes covered by kept findings
    pub fn carved_bytes(&self) -> u64 {
        self.findings.iter().map(Finding::len).sum()
    }
}
