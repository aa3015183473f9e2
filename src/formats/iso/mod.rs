//! ISO9660 / ECMA-119 filesystem images.
//!
//! The walker locates the volume descriptor set behind the 32 KiB system
//! area, anchors on the first Primary Volume Descriptor and reports the
//! volume extent it declares. Directory contents are only read when a tree
//! node is expanded, see [`tree`].

pub mod descriptor;
pub mod record;
pub mod tree;

pub use descriptor::{
    BootRecord, DecDateTime, DescriptorEntry, DescriptorKind, PartitionDescriptor,
    VolumeDescriptor, VolumeDescriptorData, VolumeDescriptorHeader,
    enumerate_volume_descriptors,
};
pub use record::{DirectoryRecord, FileFlags, RecordingDateTime, fingerprint};
pub use tree::{DataExtent, DirectoryTree, NodeId, OpenItemHandler, SharedTree, TreeItem};

use crate::core::{ByteSource, WalkError, WalkResult};
use crate::domain::entities::{Finding, Format, ParsedModel, WalkLimits};
use serde::Serialize;
use tracing::debug;

pub const SECTOR_SIZE: u64 = 2048;
pub const DESCRIPTOR_SIZE: usize = 2048;
/// Sixteen unused sectors precede the first volume descriptor
pub const SYSTEM_AREA_SIZE: u64 = 16 * SECTOR_SIZE;
pub const STANDARD_IDENTIFIER: [u8; 5] = *b"CD001";
/// Position of the standard identifier relative to the image start
pub const IDENTIFIER_OFFSET: u64 = SYSTEM_AREA_SIZE + 1;

/// Summary attached to an ISO finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeSummary {
    pub system_identifier: String,
    pub volume_identifier: String,
    pub volume_space_size: u32,
    pub logical_block_size: u16,
    pub volume_set_size: u16,
    pub volume_sequence_number: u16,
    pub creation_date: DecDateTime,
    pub descriptors: Vec<DescriptorKind>,
    pub root_extent: u32,
    pub root_size: u32,
}

/// A mounted view of an image: its descriptors and anchoring Primary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoImage {
    /// Absolute offset of the image start
    pub base: u64,
    pub descriptors: Vec<DescriptorEntry>,
    pub primary: VolumeDescriptorData,
}

impl IsoImage {
    /// Enumerates descriptors at `base` and anchors on the first Primary.
    pub fn open<S: ByteSource + ?Sized>(
        source: &S,
        base: u64,
        limits: &WalkLimits,
    ) -> WalkResult<Self> {
        let first = base.checked_add(SYSTEM_AREA_SIZE).ok_or(WalkError::NoMatch)?;
        let mut header = [0u8; 7];
        source
            .read_exact_at(first, &mut header)
            .map_err(|_| WalkError::NoMatch)?;
        if header[1..6] != STANDARD_IDENTIFIER {
            return Err(WalkError::NoMatch);
        }

        let descriptors = enumerate_volume_descriptors(source, base, limits);
        if descriptors.is_empty() {
            return Err(WalkError::Truncated {
                offset: first,
                len: DESCRIPTOR_SIZE as u64,
            });
        }

        let primary = descriptors
            .iter()
            .find_map(|entry| match &entry.descriptor {
                VolumeDescriptor::Primary(data) => Some(data.as_ref().clone()),
                _ => None,
            })
            .ok_or_else(|| WalkError::invalid(first, "no primary volume descriptor"))?;

        if primary.logical_block_size == 0 || primary.volume_space_size == 0 {
            return Err(WalkError::invalid(
                first,
                format!(
                    "empty volume: {} blocks of {} bytes",
                    primary.volume_space_size, primary.logical_block_size
                ),
            ));
        }

        Ok(Self {
            base,
            descriptors,
            primary,
        })
    }

    /// Image size in bytes declared by the Primary descriptor
    pub fn size(&self) -> u64 {
        self.primary.volume_bytes()
    }

    pub fn summary(&self) -> VolumeSummary {
        let root = &self.primary.root_directory_record;
        VolumeSummary {
            system_identifier: self.primary.system_identifier.clone(),
            volume_identifier: self.primary.volume_identifier.clone(),
            volume_space_size: self.primary.volume_space_size,
            logical_block_size: self.primary.logical_block_size,
            volume_set_size: self.primary.volume_set_size,
            volume_sequence_number: self.primary.volume_sequence_number,
            creation_date: self.primary.creation_date,
            descriptors: self.descriptors.iter().map(|d| d.header.kind).collect(),
            root_extent: root.extent_location,
            root_size: root.data_length,
        }
    }

    /// Builds the lazily expanded directory tree of this image
    pub fn tree<S: ByteSource>(&self, source: S, limits: WalkLimits) -> DirectoryTree<S> {
        DirectoryTree::new(
            source,
            self.base,
            u32::from(self.primary.logical_block_size),
            self.primary.root_directory_record.clone(),
            limits,
        )
    }
}

/// Recognizes ISO9660 images and reports their extent
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoWalker {
    limits: WalkLimits,
}

impl IsoWalker {
    pub fn new(limits: WalkLimits) -> Self {
        Self { limits }
    }

    pub fn check<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> WalkResult<Finding> {
        let result = self.walk(source, offset);
        if let Err(ref err) = result {
            debug!(offset, kind = %err.kind(), %err, "ISO rejected");
        }
        result
    }

    fn walk<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> WalkResult<Finding> {
        let image = IsoImage::open(source, offset, &self.limits)?;
        let size = image.size();
        if !source.contains(offset, size) {
            return Err(WalkError::Truncated {
                offset,
                len: size,
            });
        }

        Ok(Finding::structured(
            Format::Iso,
            offset,
            offset + size,
            ParsedModel::Iso(image.summary()),
        ))
    }
}
