//! Volume descriptor decoding
//!
//! Descriptors occupy consecutive 2048-byte sectors starting at sector 16
//! and end with a Set Terminator. See ECMA-119 section 8.

use super::record::DirectoryRecord;
use super::{DESCRIPTOR_SIZE, STANDARD_IDENTIFIER, SYSTEM_AREA_SIZE};
use crate::core::ByteSource;
use crate::domain::entities::WalkLimits;
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace, warn};

/// Reads a both-endian 32-bit field (little-endian half first).
///
/// The little-endian half is authoritative everywhere; the big-endian copy
/// is never consulted.
#[inline]
pub fn both_endian_u32(field: &[u8]) -> u32 {
    u32::from_le_bytes([field[0], field[1], field[2], field[3]])
}

/// Reads a both-endian 16-bit field (little-endian half first).
#[inline]
pub fn both_endian_u16(field: &[u8]) -> u16 {
    u16::from_le_bytes([field[0], field[1]])
}

/// Decodes a space-padded a/d-character identifier
pub fn identifier(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_end_matches([' ', '\0'])
        .to_string()
}

/// 17-byte decimal date and time (ECMA-119 8.4.26.1)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DecDateTime {
    digits: [u8; 16],
    gmt_offset: i8,
}

impl DecDateTime {
    pub fn from_bytes(data: &[u8; 17]) -> Self {
        let mut digits = [0u8; 16];
        digits.copy_from_slice(&data[..16]);
        Self {
            digits,
            gmt_offset: data[16] as i8,
        }
    }

    fn field(&self, range: std::ops::Range<usize>) -> &str {
        std::str::from_utf8(&self.digits[range]).unwrap_or("??")
    }

    fn number(&self, range: std::ops::Range<usize>) -> Option<u16> {
        self.field(range).parse().ok()
    }

    pub fn year(&self) -> Option<u16> {
        self.number(0..4)
    }

    pub fn month(&self) -> Option<u16> {
        self.number(4..6)
    }

    pub fn day(&self) -> Option<u16> {
        self.number(6..8)
    }

    pub fn hour(&self) -> Option<u16> {
        self.number(8..10)
    }

    pub fn minute(&self) -> Option<u16> {
        self.number(10..12)
    }

    pub fn second(&self) -> Option<u16> {
        self.number(12..14)
    }

    pub fn hundredths(&self) -> Option<u16> {
        self.number(14..16)
    }

    /// Offset from GMT in 15-minute units
    pub fn gmt_offset(&self) -> i8 {
        self.gmt_offset
    }

    /// All digits zero and no offset means "not specified"
    pub fn is_unset(&self) -> bool {
        self.digits.iter().all(|&d| d == b'0' || d == 0) && self.gmt_offset == 0
    }
}

impl fmt::Display for DecDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{} {}:{}:{}:{} ",
            self.field(0..4),
            self.field(4..6),
            self.field(6..8),
            self.field(8..10),
            self.field(10..12),
            self.field(12..14),
            self.field(14..16),
        )?;
        write_gmt_offset(f, self.gmt_offset)
    }
}

impl fmt::Debug for DecDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecDateTime({self})")
    }
}

impl Serialize for DecDateTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Formats a 15-minute-unit GMT offset as `+HH:MM` / `-HH:MM`.
pub(crate) fn write_gmt_offset(f: &mut fmt::Formatter<'_>, units: i8) -> fmt::Result {
    let minutes = i16::from(units) * 15;
    let sign = if minutes < 0 { '-' } else { '+' };
    let minutes = minutes.unsigned_abs();
    write!(f, "{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Volume descriptor type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DescriptorKind {
    BootRecord,
    Primary,
    Supplementary,
    Partition,
    Terminator,
    Reserved(u8),
}

impl DescriptorKind {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::BootRecord,
            1 => Self::Primary,
            2 => Self::Supplementary,
            3 => Self::Partition,
            255 => Self::Terminator,
            other => Self::Reserved(other),
        }
    }

    pub const fn code(&self) -> u8 {
        match self {
            Self::BootRecord => 0,
            Self::Primary => 1,
            Self::Supplementary => 2,
            Self::Partition => 3,
            Self::Terminator => 255,
            Self::Reserved(code) => *code,
        }
    }
}

/// First seven bytes of every volume descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VolumeDescriptorHeader {
    pub kind: DescriptorKind,
    pub identifier: [u8; 5],
    pub version: u8,
}

impl VolumeDescriptorHeader {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            kind: DescriptorKind::from_code(data[0]),
            identifier: [data[1], data[2], data[3], data[4], data[5]],
            version: data[6],
        }
    }

    pub fn is_standard(&self) -> bool {
        self.identifier == STANDARD_IDENTIFIER
    }
}

/// Boot Record descriptor (type 0)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootRecord {
    pub boot_system_identifier: String,
    pub boot_identifier: String,
}

/// Primary (type 1) or Supplementary (type 2) volume descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeDescriptorData {
    /// Volume flags, meaningful for Supplementary descriptors only
    pub volume_flags: u8,
    pub system_identifier: String,
    pub volume_identifier: String,
    pub volume_space_size: u32,
    /// Escape sequences, meaningful for Supplementary descriptors only
    pub escape_sequences: [u8; 32],
    pub volume_set_size: u16,
    pub volume_sequence_number: u16,
    pub logical_block_size: u16,
    pub path_table_size: u32,
    pub type_l_path_table: u32,
    pub optional_type_l_path_table: u32,
    pub type_m_path_table: u32,
    pub optional_type_m_path_table: u32,
    pub root_directory_record: DirectoryRecord,
    pub volume_set_identifier: String,
    pub publisher_identifier: String,
    pub data_preparer_identifier: String,
    pub application_identifier: String,
    pub copyright_file_identifier: String,
    pub abstract_file_identifier: String,
    pub bibliographic_file_identifier: String,
    pub creation_date: DecDateTime,
    pub modification_date: DecDateTime,
    pub expiration_date: DecDateTime,
    pub effective_date: DecDateTime,
    pub file_structure_version: u8,
}

impl VolumeDescriptorData {
    /// Decodes the body of a Primary or Supplementary descriptor sector.
    ///
    /// Returns `None` if the embedded root directory record is malformed.
    pub fn from_sector(data: &[u8; DESCRIPTOR_SIZE]) -> Option<Self> {
        let date = |at: usize| {
            let mut raw = [0u8; 17];
            raw.copy_from_slice(&data[at..at + 17]);
            DecDateTime::from_bytes(&raw)
        };
        let mut escape_sequences = [0u8; 32];
        escape_sequences.copy_from_slice(&data[88..120]);

        Some(Self {
            volume_flags: data[7],
            system_identifier: identifier(&data[8..40]),
            volume_identifier: identifier(&data[40..72]),
            volume_space_size: both_endian_u32(&data[80..88]),
            escape_sequences,
            volume_set_size: both_endian_u16(&data[120..124]),
            volume_sequence_number: both_endian_u16(&data[124..128]),
            logical_block_size: both_endian_u16(&data[128..132]),
            path_table_size: both_endian_u32(&data[132..140]),
            type_l_path_table: u32::from_le_bytes([data[140], data[141], data[142], data[143]]),
            optional_type_l_path_table: u32::from_le_bytes([
                data[144], data[145], data[146], data[147],
            ]),
            type_m_path_table: u32::from_be_bytes([data[148], data[149], data[150], data[151]]),
            optional_type_m_path_table: u32::from_be_bytes([
                data[152], data[153], data[154], data[155],
            ]),
            root_directory_record: DirectoryRecord::parse(&data[156..190])?,
            volume_set_identifier: identifier(&data[190..318]),
            publisher_identifier: identifier(&data[318..446]),
            data_preparer_identifier: identifier(&data[446..574]),
            application_identifier: identifier(&data[574..702]),
            copyright_file_identifier: identifier(&data[702..739]),
            abstract_file_identifier: identifier(&data[739..776]),
            bibliographic_file_identifier: identifier(&data[776..813]),
            creation_date: date(813),
            modification_date: date(830),
            expiration_date: date(847),
            effective_date: date(864),
            file_structure_version: data[881],
        })
    }

    /// Total image size in bytes claimed by this descriptor
    pub fn volume_bytes(&self) -> u64 {
        u64::from(self.volume_space_size) * u64::from(self.logical_block_size)
    }
}

/// Volume Partition descriptor (type 3)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionDescriptor {
    pub system_identifier: String,
    pub partition_identifier: String,
    pub partition_location: u32,
    pub partition_size: u32,
}

/// Decoded body of a volume descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VolumeDescriptor {
    BootRecord(BootRecord),
    Primary(Box<VolumeDescriptorData>),
    Supplementary(Box<VolumeDescriptorData>),
    Partition(PartitionDescriptor),
    Terminator,
    /// Reserved type code, or a Primary/Supplementary body that failed to decode
    Opaque,
}

impl VolumeDescriptor {
    pub fn from_sector(header: &VolumeDescriptorHeader, data: &[u8; DESCRIPTOR_SIZE]) -> Self {
        match header.kind {
            DescriptorKind::BootRecord => Self::BootRecord(BootRecord {
                boot_system_identifier: identifier(&data[7..39]),
                boot_identifier: identifier(&data[39..71]),
            }),
            DescriptorKind::Primary => VolumeDescriptorData::from_sector(data)
                .map(|d| Self::Primary(Box::new(d)))
                .unwrap_or(Self::Opaque),
            DescriptorKind::Supplementary => VolumeDescriptorData::from_sector(data)
                .map(|d| Self::Supplementary(Box::new(d)))
                .unwrap_or(Self::Opaque),
            DescriptorKind::Partition => Self::Partition(PartitionDescriptor {
                system_identifier: identifier(&data[8..40]),
                partition_identifier: identifier(&data[40..72]),
                partition_location: both_endian_u32(&data[72..80]),
                partition_size: both_endian_u32(&data[80..88]),
            }),
            DescriptorKind::Terminator => Self::Terminator,
            DescriptorKind::Reserved(_) => Self::Opaque,
        }
    }
}

/// A descriptor together with its absolute position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorEntry {
    pub header: VolumeDescriptorHeader,
    pub offset: u64,
    pub descriptor: VolumeDescriptor,
}

/// Enumerates volume descriptors of an image starting at `base`.
///
/// Stops after the Set Terminator, at the first unreadable sector, at the
/// first sector without the standard identifier, or when the descriptor
/// budget runs out. Descriptors gathered before the stop are kept.
pub fn enumerate_volume_descriptors<S: ByteSource + ?Sized>(
    source: &S,
    base: u64,
    limits: &WalkLimits,
) -> Vec<DescriptorEntry> {
    let mut entries = Vec::new();
    let Some(mut offset) = base.checked_add(SYSTEM_AREA_SIZE) else {
        return entries;
    };
    let mut sector = [0u8; DESCRIPTOR_SIZE];

    loop {
        if entries.len() as u64 >= limits.max_descriptors {
            warn!(
                limit = limits.max_descriptors,
                "volume descriptor budget exhausted before terminator"
            );
            break;
        }
        if source.read_exact_at(offset, &mut sector).is_err() {
            debug!(offset, "volume descriptor unreadable, enumeration stops");
            break;
        }

        let header = VolumeDescriptorHeader::from_bytes(&sector);
        if !header.is_standard() {
            debug!(offset, "missing standard identifier, enumeration stops");
            break;
        }
        trace!(offset, kind = ?header.kind, "volume descriptor");

        let descriptor = VolumeDescriptor::from_sector(&header, &sector);
        let done = header.kind == DescriptorKind::Terminator;
        entries.push(DescriptorEntry {
            header,
            offset,
            descriptor,
        });
        if done {
            break;
        }
        match offset.checked_add(DESCRIPTOR_SIZE as u64) {
            Some(next) => offset = next,
            None => break,
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_endian_uses_little_half() {
        let field = [0x00, 0x08, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(both_endian_u32(&field), 2048);
        assert_eq!(both_endian_u16(&[0x00, 0x08, 0x08, 0x00]), 2048);
    }

    #[test]
    fn test_dec_datetime_fields() {
        let raw = *b"2024031512304599\x08";
        let dt = DecDateTime::from_bytes(&raw);
        assert_eq!(dt.year(), Some(2024));
        assert_eq!(dt.month(), Some(3));
        assert_eq!(dt.day(), Some(15));
        assert_eq!(dt.hour(), Some(12));
        assert_eq!(dt.minute(), Some(30));
        assert_eq!(dt.second(), Some(45));
        assert_eq!(dt.hundredths(), Some(99));
        assert_eq!(dt.to_string(), "2024-03-15 12:30:45:99 +02:00");
    }

    #[test]
    fn test_dec_datetime_negative_offset() {
        let mut raw = *b"1999123123595900\x00";
        raw[16] = (-20i8) as u8;
        let dt = DecDateTime::from_bytes(&raw);
        assert_eq!(dt.gmt_offset(), -20);
        assert!(dt.to_string().ends_with("-05:00"));
    }

    #[test]
    fn test_unset_date() {
        let dt = DecDateTime::from_bytes(b"0000000000000000\x00");
        assert!(dt.is_unset());
    }

    #[test]
    fn test_identifier_trims_padding() {
        assert_eq!(identifier(b"CDROM   \0\0"), "CDROM");
    }

    #[test]
    fn test_kind_codes_roundtrip() {
        for code in [0u8, 1, 2, 3, 255, 42] {
            assert_eq!(DescriptorKind::from_code(code).code(), code);
        }
    }
}
