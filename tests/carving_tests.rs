//! End-to-end carving over file-backed sources

mod common;

use boundwalk::application::dto::ScanOptions;
use boundwalk::application::{MANIFEST_FILE, carve, extract_findings};
use boundwalk::core::{FileSource, MmapSource};
use boundwalk::{ByteSource, Format, RejectionKind, SignatureRegistry, SliceSource, WalkLimits};
use common::{GifBuilder, IsoBuilder, sample_png};
use rstest::*;
use sha2::{Digest, Sha256};
use std::io::Write;
use tempfile::NamedTempFile;

struct Disk {
    data: Vec<u8>,
    gif_at: usize,
    png_at: usize,
    iso_at: usize,
    gif_len: usize,
    png_len: usize,
    iso_len: usize,
}

/// Filler, a GIF, a PNG, a broken PNG header, then an ISO that itself
/// contains a PNG file
#[fixture]
fn disk() -> Disk {
    let gif = GifBuilder::new()
        .size(8, 8)
        .global_color_table(2)
        .image(None, &[&[0x10; 40]])
        .build();
    let png = sample_png();
    let iso = IsoBuilder::new().file("/PICS/INNER.PNG", &png).dir("/PICS").build();

    let mut data = vec![0xEEu8; 1000];
    let gif_at = data.len();
    data.extend_from_slice(&gif);
    data.extend(vec![0u8; 517]);
    let png_at = data.len();
    data.extend_from_slice(&png);
    data.extend(vec![0u8; 100]);
    data.extend_from_slice(&common::PNG_SIGNATURE);
    data.extend(vec![0xFFu8; 12]);
    data.extend(vec![0u8; 3000]);
    let iso_at = data.len();
    data.extend_from_slice(&iso);
    data.extend(vec![0u8; 64]);

    Disk {
        data,
        gif_at,
        png_at,
        iso_at,
        gif_len: gif.len(),
        png_len: png.len(),
        iso_len: iso.len(),
    }
}

fn to_file(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

fn assert_report(disk: &Disk, source: &dyn ByteSource, options: &ScanOptions) {
    let report = carve(source, options).unwrap();

    let found: Vec<_> = report
        .findings
        .iter()
        .map(|f| (f.format, f.start, f.len()))
        .collect();
    assert_eq!(
        found,
        vec![
            (Format::Gif, disk.gif_at as u64, disk.gif_len as u64),
            (Format::Png, disk.png_at as u64, disk.png_len as u64),
            (Format::Iso, disk.iso_at as u64, disk.iso_len as u64),
        ]
    );
    // The PNG stored inside the ISO is covered by the ISO finding
    assert_eq!(report.overlapped, 1);
    // The broken PNG header, and the terminator sector whose "CD001"
    // nominates an image without a primary descriptor
    assert_eq!(report.rejections.get(&RejectionKind::StructurallyInvalid), Some(&2));
    assert_eq!(report.candidates, 6);
}

#[rstest]
fn test_carve_slice(disk: Disk) {
    let options = ScanOptions::default().with_block_size(4096);
    assert_report(&disk, &SliceSource::new(&disk.data), &options);
}

#[rstest]
fn test_carve_file_source(disk: Disk) {
    let file = to_file(&disk.data);
    let source = FileSource::open(file.path()).unwrap();
    assert_eq!(source.len(), disk.data.len() as u64);
    assert_report(&disk, &source, &ScanOptions::default().with_block_size(1000).sequential());
}

#[rstest]
fn test_carve_mmap_source(disk: Disk) {
    let file = to_file(&disk.data);
    let source = MmapSource::open(file.path()).unwrap();
    assert_report(&disk, &source, &ScanOptions::default().with_block_size(777));
}

#[rstest]
fn test_format_filter(disk: Disk) {
    let options = ScanOptions::default().with_formats(vec![Format::Png]);
    let report = carve(&SliceSource::new(&disk.data), &options).unwrap();
    let formats: Vec<_> = report.findings.iter().map(|f| f.format).collect();
    // With no ISO finding the embedded PNG is kept as well
    assert_eq!(formats, vec![Format::Png, Format::Png]);
    assert_eq!(report.overlapped, 0);
}

#[rstest]
fn test_strict_limits_still_carve_small_structures(disk: Disk) {
    let options = ScanOptions::default().with_limits(WalkLimits::strict());
    let report = carve(&SliceSource::new(&disk.data), &options).unwrap();
    assert_eq!(report.findings.len(), 3);
}

#[rstest]
fn test_extract_and_manifest(disk: Disk) {
    let source = SliceSource::new(&disk.data);
    let report = carve(&source, &ScanOptions::default()).unwrap();
    let out = tempfile::tempdir().unwrap();

    let manifest = extract_findings(&source, &report.findings, out.path()).unwrap();
    assert_eq!(manifest.files.len(), 3);

    let png_file = &manifest.files[1];
    assert_eq!(png_file.file_name, format!("carved_000001_{:x}.png", disk.png_at));
    let written = std::fs::read(out.path().join(&png_file.file_name)).unwrap();
    assert_eq!(written, sample_png());
    assert_eq!(png_file.sha256_hash, hex::encode(Sha256::digest(&written)));

    let manifest_text = std::fs::read_to_string(out.path().join(MANIFEST_FILE)).unwrap();
    assert!(manifest_text.contains(&png_file.sha256_hash));
}

#[rstest]
fn test_registry_identifies_each_structure(disk: Disk) {
    let registry = SignatureRegistry::with_defaults();
    let source = SliceSource::new(&disk.data);
    assert_eq!(registry.identify(&source, disk.gif_at as u64), vec![Format::Gif]);
    assert_eq!(registry.identify(&source, disk.png_at as u64), vec![Format::Png]);
    assert_eq!(registry.identify(&source, disk.iso_at as u64), vec![Format::Iso]);
    assert!(registry.identify(&source, 0).is_empty());
}

#[test]
fn test_report_serializes() {
    let data = GifBuilder::new().build();
    let report = carve(&SliceSource::new(&data), &ScanOptions::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["findings"][0]["format"], "gif");
    assert_eq!(json["findings"][0]["end"], 14);
}
