#![no_main]

use boundwalk::formats::GifWalker;
use boundwalk::{SliceSource, WalkLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let walker = GifWalker::new(WalkLimits::strict());
    if let Ok(finding) = walker.check(&SliceSource::new(data), 0) {
        assert!(finding.end <= data.len() as u64);
        assert!(finding.start < finding.end);
    }
});
