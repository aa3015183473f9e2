//! Carve use case
//!
//! Searches a source for signature candidates, hands each candidate to
//! the walker of its format and keeps the accepted, non-overlapping
//! findings.

use crate::application::dto::{CarveReport, ScanOptions};
use crate::core::{ByteSource, WalkResult};
use crate::domain::entities::{Candidate, Finding};
use crate::domain::services::{SignatureRegistry, Walker};
use anyhow::{Context, Result, ensure};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

/// Finds candidate structure starts in the whole source.
///
/// Consecutive blocks overlap by one byte less than the longest pattern so
/// a signature split across a block boundary is still seen.
pub fn find_candidates<S: ByteSource + ?Sized>(
    source: &S,
    registry: &SignatureRegistry,
    block_size: usize,
) -> Result<Vec<Candidate>> {
    ensure!(block_size > 0, "block size must be positive");

    let size = source.len();
    let overlap = registry.max_pattern_len().saturating_sub(1) as u64;
    let mut candidates = BTreeSet::new();
    let mut buffer = Vec::new();
    let mut offset = 0u64;

    while offset < size {
        let len = (block_size as u64 + overlap).min(size - offset) as usize;
        buffer.resize(len, 0);
        source
            .read_exact_at(offset, &mut buffer)
            .with_context(|| format!("reading block at 0x{offset:X}"))?;
        candidates.extend(registry.find_candidates(&buffer, offset));
        offset += block_size as u64;
    }

    Ok(candidates.into_iter().collect())
}

/// Carves every enabled format out of `source`
pub fn carve<S: ByteSource + ?Sized>(source: &S, options: &ScanOptions) -> Result<CarveReport> {
    let start_time = Instant::now();
    let formats = options.enabled_formats();

    info!(size = source.len(), ?formats, "starting carve");

    let mut registry = SignatureRegistry::with_defaults();
    registry.retain_formats(&formats);
    let candidates = find_candidates(source, &registry, options.block_size)?;

    let check = |candidate: &Candidate| -> WalkResult<Finding> {
        Walker::new(candidate.format, options.limits).check(source, candidate.start)
    };
    let outcomes: Vec<WalkResult<Finding>> = if options.parallel {
        candidates.par_iter().map(check).collect()
    } else {
        candidates.iter().map(check).collect()
    };

    let mut report = CarveReport::new(source.len());
    report.candidates = candidates.len();

    let mut accepted = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(finding) => accepted.push(finding),
            Err(err) => *report.rejections.entry(err.kind()).or_insert(0) += 1,
        }
    }

    let (findings, overlapped) = keep_non_overlapping(accepted);
    report.findings = findings;
    report.overlapped = overlapped;
    report.duration = start_time.elapsed();

    info!(
        candidates = report.candidates,
        findings = report.findings.len(),
        rejected = report.rejected(),
        overlapped = report.overlapped,
        "carve complete in {:.2}s",
        report.duration.as_secs_f64()
    );

    Ok(report)
}

/// Sorts findings by start and drops every finding that begins inside an
/// already kept one. Among findings sharing a start the longest wins.
fn keep_non_overlapping(mut findings: Vec<Finding>) -> (Vec<Finding>, usize) {
    findings.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut dropped = 0;
    for finding in findings {
        match kept.last() {
            Some(last) if finding.start < last.end => {
                debug!(
                    start = finding.start,
                    format = %finding.format,
                    covered_by = last.start,
                    "finding overlaps an earlier one"
                );
                dropped += 1;
            }
            _ => kept.push(finding),
        }
    }
    (kept, dropped)
}
