#![no_main]

use boundwalk::formats::iso::{IsoImage, SYSTEM_AREA_SIZE};
use boundwalk::{SliceSource, WalkLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut image = vec![0u8; SYSTEM_AREA_SIZE as usize];
    image.extend_from_slice(data);

    let source = SliceSource::new(&image);
    let limits = WalkLimits::strict();
    let Ok(iso) = IsoImage::open(&source, 0, &limits) else {
        return;
    };
    let mut tree = iso.tree(source, limits);
    let items = tree.walk_all();
    assert!(items.iter().all(|item| item.depth < limits.max_path_depth));
});
