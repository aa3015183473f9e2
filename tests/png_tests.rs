//! Chunk walker tests

mod common;

use boundwalk::core::Window;
use boundwalk::formats::png::{HEADER_SIZE, IEND, IHDR, PngImage, PngWalker, TEXT};
use boundwalk::{Finding, Format, ParsedModel, RejectionKind, SliceSource, WalkError, WalkLimits};
use common::{embed, ihdr_payload, png_chunk, png_from_chunks, sample_png};
use proptest::prelude::*;
use rstest::*;

fn check(data: &[u8], offset: u64) -> Result<Finding, WalkError> {
    PngWalker::default().check(&SliceSource::new(data), offset)
}

fn image(finding: &Finding) -> &PngImage {
    match finding.model() {
        Some(ParsedModel::Png(image)) => image,
        other => panic!("expected a PNG model, got {other:?}"),
    }
}

#[fixture]
fn png() -> Vec<u8> {
    sample_png()
}

// ============================================================================
// Accepted streams
// ============================================================================

#[test]
fn test_header_plus_terminal_chunk() {
    let data = png_from_chunks(&[png_chunk(b"IEND", &[])]);
    let finding = check(&data, 0).unwrap();

    let image = image(&finding);
    assert_eq!(image.chunks.len(), 1);
    assert_eq!(image.chunks[0].tag, IEND);
    assert_eq!(finding.len(), HEADER_SIZE + 12);
}

#[rstest]
fn test_sample_png_model(png: Vec<u8>) {
    let finding = check(&png, 0).unwrap();
    assert_eq!(finding.format, Format::Png);
    assert_eq!(finding.len(), png.len() as u64);

    let image = image(&finding);
    let ihdr = image.ihdr.unwrap();
    assert_eq!((ihdr.width, ihdr.height), (16, 16));
    assert_eq!(ihdr.color_type_description(), "Truecolor");
    assert_eq!(image.chunk_count(IHDR), 1);
    assert_eq!(image.chunk_count(TEXT), 1);
    assert_eq!(
        image.text_entries(),
        vec![("Title".to_string(), "boundary".to_string())]
    );
    assert_eq!(image.crc_mismatches().count(), 0);
}

#[rstest]
fn test_layout_zones(png: Vec<u8>) {
    let finding = check(&png, 0).unwrap();
    let zones = image(&finding).layout();
    let labels: Vec<_> = zones.iter().map(|z| z.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["PNG Magic", "Chunk: IHDR", "Chunk: tEXt", "Chunk: IDAT", "Chunk: IEND"]
    );
    assert_eq!(zones[0].range, 0..8);
    assert_eq!(zones[1].range, 8..8 + 12 + 13);
    assert_eq!(zones.last().unwrap().range.end, png.len() as u64);
}

#[rstest]
fn test_embedded_png_offsets(png: Vec<u8>) {
    let data = embed(&png, 333, 2000);
    let finding = check(&data, 333).unwrap();
    assert_eq!(finding.range(), 333..333 + png.len() as u64);
    // Chunk offsets stay relative to the PNG header
    assert_eq!(image(&finding).chunks[0].offset, 8);
}

#[test]
fn test_walk_on_window_equals_check() {
    let png = sample_png();
    let data = embed(&png, 40, 200);
    let source = SliceSource::new(&data);
    let walked = PngWalker::default()
        .walk(&Window::new(&source, 40))
        .unwrap();
    let checked = check(&data, 40).unwrap();
    assert_eq!(Some(&ParsedModel::Png(walked)), checked.model());
}

#[test]
fn test_unknown_ancillary_chunks_are_skipped() {
    let data = png_from_chunks(&[
        png_chunk(b"IHDR", &ihdr_payload(1, 1, 1, 0)),
        png_chunk(b"zzZz", &[7; 33]),
        png_chunk(b"IEND", &[]),
    ]);
    let finding = check(&data, 0).unwrap();
    let image = image(&finding);
    assert_eq!(image.chunks.len(), 3);
    assert_eq!(image.chunks[1].crc_matches, None);
    assert_eq!(image.chunks[1].data, None);
}

#[test]
fn test_crc_mismatch_is_reported_not_rejected() {
    let mut text = png_chunk(b"tEXt", b"k\0v");
    let last = text.len() - 1;
    text[last] ^= 0x01;
    let data = png_from_chunks(&[text, png_chunk(b"IEND", &[])]);

    let finding = check(&data, 0).unwrap();
    let mismatched: Vec<_> = image(&finding).crc_mismatches().map(|c| c.tag).collect();
    assert_eq!(mismatched, vec![TEXT]);
}

#[rstest]
#[case::one_short(12)]
#[case::dimensions_only(8)]
#[case::empty(0)]
fn test_short_ihdr_is_accepted(#[case] len: usize) {
    let payload = ihdr_payload(3, 4, 8, 6);
    let data = png_from_chunks(&[png_chunk(b"IHDR", &payload[..len]), png_chunk(b"IEND", &[])]);
    let finding = check(&data, 0).unwrap();
    assert_eq!(finding.len(), data.len() as u64);

    let mut expected = [0u8; 13];
    expected[..len].copy_from_slice(&payload[..len]);
    let ihdr = image(&finding).ihdr.unwrap();
    assert_eq!(ihdr.width, u32::from_be_bytes(expected[0..4].try_into().unwrap()));
    assert_eq!(ihdr.height, u32::from_be_bytes(expected[4..8].try_into().unwrap()));
    assert_eq!(ihdr.bit_depth, expected[8]);
    assert_eq!(ihdr.interlace_method, 0);
}

// ============================================================================
// Rejections
// ============================================================================

#[rstest]
#[case::one_over(14)]
#[case::much_longer(64)]
fn test_oversized_ihdr_is_invalid(#[case] len: usize) {
    let data = png_from_chunks(&[png_chunk(b"IHDR", &vec![1; len]), png_chunk(b"IEND", &[])]);
    assert!(matches!(
        check(&data, 0),
        Err(WalkError::StructurallyInvalid { offset: 8, .. })
    ));
}

#[test]
fn test_huge_declared_payload_is_truncated_without_reading_it() {
    let mut data = png_from_chunks(&[]);
    data.extend_from_slice(&0x7FFF_FFF0u32.to_be_bytes());
    data.extend_from_slice(b"tEXt");
    assert_eq!(data.len(), 16);
    assert_eq!(
        check(&data, 0).unwrap_err(),
        WalkError::Truncated {
            offset: 16,
            len: 0x7FFF_FFF0
        }
    );
}

#[test]
fn test_oversized_length_is_invalid() {
    let mut data = png_from_chunks(&[]);
    data.extend_from_slice(&0x8000_0000u32.to_be_bytes());
    data.extend_from_slice(b"IDAT");
    assert!(matches!(
        check(&data, 0),
        Err(WalkError::StructurallyInvalid { offset: 8, .. })
    ));
}

#[test]
fn test_chunk_length_limit() {
    let data = png_from_chunks(&[png_chunk(b"IDAT", &[0; 64]), png_chunk(b"IEND", &[])]);
    let limits = WalkLimits {
        max_chunk_length: 32,
        ..WalkLimits::default()
    };
    let err = PngWalker::new(limits)
        .check(&SliceSource::new(&data), 0)
        .unwrap_err();
    assert_eq!(err.kind(), RejectionKind::StructurallyInvalid);
}

#[test]
fn test_chunk_budget() {
    let idat = png_chunk(b"IDAT", &[1]);
    let mut chunks = vec![idat; 20];
    chunks.push(png_chunk(b"IEND", &[]));
    let data = png_from_chunks(&chunks);
    let limits = WalkLimits {
        max_chunks: 10,
        ..WalkLimits::default()
    };
    assert!(matches!(
        PngWalker::new(limits).check(&SliceSource::new(&data), 0),
        Err(WalkError::BudgetExhausted { what: "chunks", limit: 10 })
    ));
}

#[test]
fn test_missing_iend_is_truncated() {
    let data = png_from_chunks(&[png_chunk(b"IHDR", &ihdr_payload(2, 2, 8, 6))]);
    assert_eq!(check(&data, 0).unwrap_err().kind(), RejectionKind::Truncated);
}

#[rstest]
#[case(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x00])]
#[case(&[0x89, 0x50, 0x4E, 0x47])]
fn test_bad_signature_is_no_match(#[case] data: &[u8]) {
    assert_eq!(check(data, 0).unwrap_err(), WalkError::NoMatch);
}

// ============================================================================
// Properties
// ============================================================================

fn arb_png() -> impl Strategy<Value = Vec<u8>> {
    (
        1u32..10_000,
        1u32..10_000,
        proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..5),
    )
        .prop_map(|(w, h, idats)| {
            let mut chunks = vec![png_chunk(b"IHDR", &ihdr_payload(w, h, 8, 2))];
            chunks.extend(idats.iter().map(|d| png_chunk(b"IDAT", d)));
            chunks.push(png_chunk(b"IEND", &[]));
            png_from_chunks(&chunks)
        })
}

proptest! {
    #[test]
    fn prop_end_matches_construction(data in arb_png()) {
        let finding = check(&data, 0).unwrap();
        prop_assert_eq!(finding.end, data.len() as u64);
        prop_assert_eq!(image(&finding).chunks.last().map(|c| c.tag), Some(IEND));
    }

    #[test]
    fn prop_truncation_is_rejected(data in arb_png(), cut in any::<prop::sample::Index>()) {
        let cut = cut.index(data.len());
        prop_assert!(check(&data[..cut], 0).is_err());
    }

    #[test]
    fn prop_walk_is_deterministic(tail in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut input = common::PNG_SIGNATURE.to_vec();
        input.extend(tail);
        prop_assert_eq!(check(&input, 0), check(&input, 0));
    }
}
