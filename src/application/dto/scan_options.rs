//! Scan options DTO

use crate::domain::entities::{Format, WalkLimits};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for carving a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Formats to carve (empty = all)
    pub formats: Vec<Format>,
    /// Bytes read per signature-search block
    pub block_size: usize,
    /// Whether candidate checks run on the rayon pool
    pub parallel: bool,
    /// Budgets handed to every walker
    pub limits: WalkLimits,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            formats: Vec::new(),
            block_size: 4 * 1024 * 1024, // 4MB blocks
            parallel: true,
            limits: WalkLimits::default(),
        }
    }
}

impl ScanOptions {
    /// Loads options from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Sets the formats to carve
    pub fn with_formats(mut self, formats: Vec<Format>) -> Self {
        self.formats = formats;
        self
    }

    /// Sets the block size
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_limits(mut self, limits: WalkLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Disables parallel candidate checks
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Formats selected by these options
    pub fn enabled_formats(&self) -> Vec<Format> {
        if self.formats.is_empty() {
            Format::ALL.to_vec()
        } else {
            self.formats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"formats": ["png"], "limits": {{"max_chunks": 5}}}}"#).unwrap();

        let options = ScanOptions::from_json_file(file.path()).unwrap();
        assert_eq!(options.formats, vec![Format::Png]);
        assert_eq!(options.limits.max_chunks, 5);
        assert_eq!(options.limits.max_blocks, WalkLimits::default().max_blocks);
        assert!(options.parallel);
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ScanOptions::from_json_file(file.path()).is_err());
    }

    #[test]
    fn test_enabled_formats() {
        assert_eq!(ScanOptions::default().enabled_formats(), Format::ALL.to_vec());
        let options = ScanOptions::default().with_formats(vec![Format::Iso]);
        assert_eq!(options.enabled_formats(), vec![Format::Iso]);
    }
}
