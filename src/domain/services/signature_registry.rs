//! Signature registry service
//!
//! Maps magic bytes to the format they nominate. Uses the Aho-Corasick
//! algorithm so a block is searched for every pattern in a single pass.

use crate::core::ByteSource;
use crate::domain::entities::{Candidate, FileSignature, Format};
use crate::formats::iso::IDENTIFIER_OFFSET;
use crate::formats::{gif, png};
use aho_corasick::AhoCorasick;
use tracing::warn;

/// Registry of signatures for candidate detection
///
/// # Example
///
/// ```
/// use boundwalk::domain::entities::Format;
/// use boundwalk::domain::services::SignatureRegistry;
///
/// let registry = SignatureRegistry::with_defaults();
/// let candidates = registry.find_candidates(b"....GIF89a....", 100);
/// assert_eq!(candidates.len(), 1);
/// assert_eq!(candidates[0].start, 104);
/// assert_eq!(candidates[0].format, Format::Gif);
/// ```
#[derive(Debug)]
pub struct SignatureRegistry {
    signatures: Vec<FileSignature>,
    /// Automaton over the patterns of `signatures`, in the same order
    matcher: Option<AhoCorasick>,
}

impl SignatureRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            signatures: Vec::new(),
            matcher: None,
        }
    }

    /// Creates a registry with the GIF, PNG and ISO signatures
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(FileSignature::new(Format::Gif, gif::GIF89A));
        registry.register(FileSignature::new(Format::Gif, gif::GIF87A));
        registry.register(FileSignature::new(Format::Png, png::PNG_SIGNATURE));
        // The standard identifier sits behind the system area and the
        // descriptor type byte
        registry.register(
            FileSignature::new(Format::Iso, *b"CD001").with_offset(IDENTIFIER_OFFSET),
        );
        registry
    }

    /// Registers a signature and rebuilds the automaton
    pub fn register(&mut self, signature: FileSignature) {
        self.signatures.push(signature);
        self.build_matcher();
    }

    /// Keeps only the signatures of `formats`
    pub fn retain_formats(&mut self, formats: &[Format]) {
        self.signatures.retain(|sig| formats.contains(&sig.format()));
        self.build_matcher();
    }

    fn build_matcher(&mut self) {
        if self.signatures.is_empty() {
            self.matcher = None;
            return;
        }
        self.matcher = match AhoCorasick::new(self.signatures.iter().map(|s| s.pattern())) {
            Ok(matcher) => Some(matcher),
            Err(err) => {
                warn!(%err, "failed to build signature automaton");
                None
            }
        };
    }

    pub fn signatures(&self) -> &[FileSignature] {
        &self.signatures
    }

    /// Formats with at least one registered signature, in registration order
    pub fn formats(&self) -> Vec<Format> {
        let mut formats = Vec::new();
        for sig in &self.signatures {
            if !formats.contains(&sig.format()) {
                formats.push(sig.format());
            }
        }
        formats
    }

    /// Longest pattern, the overlap needed between consecutive blocks
    pub fn max_pattern_len(&self) -> usize {
        self.signatures
            .iter()
            .map(|s| s.pattern().len())
            .max()
            .unwrap_or(0)
    }

    /// Finds candidate structure starts in `block`, which begins at
    /// absolute offset `block_offset`.
    ///
    /// Hits whose structure would start before offset zero are dropped.
    /// The result is sorted by start offset.
    pub fn find_candidates(&self, block: &[u8], block_offset: u64) -> Vec<Candidate> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };

        let mut candidates: Vec<Candidate> = matcher
            .find_overlapping_iter(block)
            .filter_map(|mat| {
                let sig = &self.signatures[mat.pattern().as_usize()];
                let hit = block_offset + mat.start() as u64;
                hit.checked_sub(sig.pattern_offset())
                    .map(|start| Candidate::new(start, sig.format()))
            })
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }

    /// Formats whose signature is present for a structure starting at
    /// `offset`
    pub fn identify<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> Vec<Format> {
        let mut formats = Vec::new();
        for sig in &self.signatures {
            if formats.contains(&sig.format()) {
                continue;
            }
            let mut buf = vec![0u8; sig.pattern().len()];
            let at = offset + sig.pattern_offset();
            if source.read_exact_at(at, &mut buf).is_ok() && buf == sig.pattern() {
                formats.push(sig.format());
            }
        }
        formats
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
