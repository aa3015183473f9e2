#![no_main]

use boundwalk::formats::PngWalker;
use boundwalk::formats::png::PNG_SIGNATURE;
use boundwalk::{SliceSource, WalkLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Skip the signature so the fuzzer spends its time on chunks
    let mut input = PNG_SIGNATURE.to_vec();
    input.extend_from_slice(data);

    let walker = PngWalker::new(WalkLimits::strict());
    if let Ok(finding) = walker.check(&SliceSource::new(&input), 0) {
        assert_eq!(finding.start, 0);
        assert!(finding.end <= input.len() as u64);
    }
});
