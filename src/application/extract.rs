//! Extract use case
//!
//! Copies each finding's byte range out of the source into its own file
//! and records a SHA-256 for every file in `manifest.json`.

use crate::core::ByteSource;
use crate::domain::entities::{Finding, Format};
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const EXTRACTION_BUFFER_SIZE: usize = 1024 * 1024;
pub const MANIFEST_FILE: &str = "manifest.json";

/// One extracted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFile {
    pub file_name: String,
    pub format: Format,
    pub source_offset: String,
    pub source_offset_decimal: u64,
    pub file_size: u64,
    pub sha256_hash: String,
    pub possibly_truncated: bool,
}

/// Index of an extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub files: Vec<ExtractedFile>,
    pub total_bytes: u64,
}

/// Output file name for the finding at `index`
pub fn output_name(index: usize, finding: &Finding) -> String {
    format!(
        "carved_{index:06}_{:x}.{}",
        finding.start,
        finding.format.extension()
    )
}

/// Writes every finding to `output_dir` and returns the manifest that was
/// stored next to them
pub fn extract_findings<S: ByteSource + ?Sized>(
    source: &S,
    findings: &[Finding],
    output_dir: &Path,
) -> Result<Manifest> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let mut manifest = Manifest::default();
    for (index, finding) in findings.iter().enumerate() {
        let file_name = output_name(index, finding);
        let path = output_dir.join(&file_name);
        let sha256_hash = copy_range(source, finding, &path)?;
        debug!(file = %file_name, size = finding.len(), "extracted");

        manifest.total_bytes += finding.len();
        manifest.files.push(ExtractedFile {
            file_name,
            format: finding.format,
            source_offset: format!("0x{:016X}", finding.start),
            source_offset_decimal: finding.start,
            file_size: finding.len(),
            sha256_hash,
            possibly_truncated: finding.possibly_truncated(),
        });
    }

    let manifest_path: PathBuf = output_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(&manifest_path, json)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    info!(
        files = manifest.files.len(),
        bytes = manifest.total_bytes,
        dir = %output_dir.display(),
        "extraction complete"
    );
    Ok(manifest)
}

/// Streams `finding`'s range into `path`, returning the hex SHA-256
fn copy_range<S: ByteSource + ?Sized>(
    source: &S,
    finding: &Finding,
    path: &Path,
) -> Result<String> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::with_capacity(131_072, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; EXTRACTION_BUFFER_SIZE];

    let mut offset = finding.start;
    while offset < finding.end {
        let len = (finding.end - offset).min(EXTRACTION_BUFFER_SIZE as u64) as usize;
        let chunk = &mut buffer[..len];
        source
            .read_exact_at(offset, chunk)
            .with_context(|| format!("reading 0x{offset:X}"))?;
        hasher.update(&*chunk);
        writer.write_all(chunk)?;
        offset += len as u64;
    }
    writer.flush()?;

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SliceSource;
    use crate::domain::entities::Termination;

    #[test]
    fn test_output_name() {
        let finding = Finding::buffer(Format::Gif, 0x1A2B, 0x1B00);
        assert_eq!(output_name(3, &finding), "carved_000003_1a2b.gif");
    }

    #[test]
    fn test_extract_writes_files_and_manifest() {
        let data: Vec<u8> = (0..=255).collect();
        let findings = vec![
            Finding::buffer(Format::Gif, 16, 48),
            Finding::buffer(Format::Gif, 100, 101)
                .with_termination(Termination::UnknownTag { tag: 0x99, offset: 100 }),
        ];
        let dir = tempfile::tempdir().unwrap();

        let manifest = extract_findings(&SliceSource::new(&data), &findings, dir.path()).unwrap();

        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.total_bytes, 33);
        let first = fs::read(dir.path().join("carved_000000_10.gif")).unwrap();
        assert_eq!(first, &data[16..48]);
        assert_eq!(
            manifest.files[0].sha256_hash,
            hex::encode(Sha256::digest(&data[16..48]))
        );
        assert!(manifest.files[1].possibly_truncated);

        let stored: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(stored["files"][1]["file_name"], "carved_000001_64.gif");
    }

    #[test]
    fn test_extract_fails_on_short_source() {
        let data = [0u8; 10];
        let findings = vec![Finding::buffer(Format::Png, 0, 20)];
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_findings(&SliceSource::new(&data), &findings, dir.path()).is_err());
    }
}
