//! Work budgets for walkers
//!
//! Every loop whose trip count is decided by the data being walked is
//! capped by one of these limits. A corrupt stream that never reaches its
//! terminator is rejected once its budget runs out.

use serde::{Deserialize, Serialize};

/// Step and byte budgets applied to a single walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkLimits {
    /// Top-level blocks (extensions + images) in a block-format walk
    pub max_blocks: u64,
    /// Size-prefixed sub-blocks in a single chain
    pub max_sub_blocks: u64,
    /// Chunks in a chunk-format walk
    pub max_chunks: u64,
    /// Declared payload length of a single chunk
    pub max_chunk_length: u32,
    /// Volume descriptors enumerated before giving up on a terminator
    pub max_descriptors: u64,
    /// Directory records parsed from a single directory extent
    pub max_directory_records: u64,
    /// Bytes read from a single directory extent
    pub max_directory_bytes: u64,
    /// Path components followed when resolving a tree path
    pub max_path_depth: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_blocks: 1 << 20,
            max_sub_blocks: 1 << 24,
            max_chunks: 1 << 20,
            max_chunk_length: 0x7FFF_FFFF,
            max_descriptors: 256,
            max_directory_records: 1 << 16,
            max_directory_bytes: 64 * 1024 * 1024,
            max_path_depth: 64,
        }
    }
}

impl WalkLimits {
    /// Limits for small synthetic inputs and fuzzing
    pub fn strict() -> Self {
        Self {
            max_blocks: 1024,
            max_sub_blocks: 4096,
            max_chunks: 1024,
            max_chunk_length: 16 * 1024 * 1024,
            max_descriptors: 32,
            max_directory_records: 1024,
            max_directory_bytes: 1024 * 1024,
            max_path_depth: 16,
        }
    }
}
