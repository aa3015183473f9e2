#![no_main]

use boundwalk::application::carve;
use boundwalk::application::dto::ScanOptions;
use boundwalk::{SliceSource, WalkLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let options = ScanOptions::default()
        .with_block_size(512)
        .with_limits(WalkLimits::strict())
        .sequential();
    if let Ok(report) = carve(&SliceSource::new(data), &options) {
        for pair in report.findings.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }
});
