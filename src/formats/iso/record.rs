//! Directory records (ECMA-119 9.1)

use super::descriptor::{both_endian_u16, both_endian_u32, write_gmt_offset};
use serde::Serialize;
use std::fmt::{self, Write};

/// Fixed part of a directory record, before the file identifier
pub const FIXED_SIZE: usize = 33;
/// Smallest legal record: fixed part plus a one-byte identifier
pub const MIN_RECORD_SIZE: usize = FIXED_SIZE + 1;

const FINGERPRINT_CRC: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_ECMA_182);

/// 64-bit content fingerprint of a directory record.
///
/// Covers the fixed fields and the file identifier. The padding byte and
/// the system use area are excluded.
pub fn fingerprint(fixed: &[u8; FIXED_SIZE], name: &[u8]) -> u64 {
    let mut digest = FINGERPRINT_CRC.digest();
    digest.update(fixed);
    digest.update(name);
    digest.finalize()
}

/// 7-byte recording date and time (ECMA-119 9.1.5)
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingDateTime {
    /// Years since 1900
    pub years_since_1900: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Offset from GMT in 15-minute units
    pub gmt_offset: i8,
}

impl RecordingDateTime {
    pub fn from_bytes(data: &[u8; 7]) -> Self {
        Self {
            years_since_1900: data[0],
            month: data[1],
            day: data[2],
            hour: data[3],
            minute: data[4],
            second: data[5],
            gmt_offset: data[6] as i8,
        }
    }

    pub fn year(&self) -> u16 {
        1900 + u16::from(self.years_since_1900)
    }
}

impl fmt::Display for RecordingDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} ",
            self.year(),
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        )?;
        write_gmt_offset(f, self.gmt_offset)
    }
}

impl fmt::Debug for RecordingDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordingDateTime({self})")
    }
}

impl Serialize for RecordingDateTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// File flags byte of a directory record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileFlags(pub u8);

impl FileFlags {
    pub const HIDDEN: u8 = 0x01;
    pub const DIRECTORY: u8 = 0x02;
    pub const ASSOCIATED: u8 = 0x04;
    pub const RECORD: u8 = 0x08;
    pub const PROTECTION: u8 = 0x10;
    pub const MULTI_EXTENT: u8 = 0x80;

    #[inline]
    pub const fn is_hidden(&self) -> bool {
        self.0 & Self::HIDDEN != 0
    }

    #[inline]
    pub const fn is_directory(&self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    #[inline]
    pub const fn is_associated(&self) -> bool {
        self.0 & Self::ASSOCIATED != 0
    }

    #[inline]
    pub const fn has_record_format(&self) -> bool {
        self.0 & Self::RECORD != 0
    }

    #[inline]
    pub const fn has_protection(&self) -> bool {
        self.0 & Self::PROTECTION != 0
    }

    #[inline]
    pub const fn is_multi_extent(&self) -> bool {
        self.0 & Self::MULTI_EXTENT != 0
    }
}

/// `dharpm` listing column, `-` for a clear flag
impl fmt::Display for FileFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marks = [
            (self.is_directory(), 'd'),
            (self.is_hidden(), 'h'),
            (self.is_associated(), 'a'),
            (self.has_record_format(), 'r'),
            (self.has_protection(), 'p'),
            (self.is_multi_extent(), 'm'),
        ];
        for (set, mark) in marks {
            f.write_char(if set { mark } else { '-' })?;
        }
        Ok(())
    }
}

/// A decoded directory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRecord {
    /// Declared record length, including padding and system use
    pub length: u8,
    pub extended_attribute_length: u8,
    /// First logical block of the data extent
    pub extent_location: u32,
    pub data_length: u32,
    pub recorded_at: RecordingDateTime,
    pub flags: FileFlags,
    pub file_unit_size: u8,
    pub interleave_gap_size: u8,
    pub volume_sequence_number: u16,
    /// Raw file identifier
    pub identifier: Vec<u8>,
    pub fingerprint: u64,
}

impl DirectoryRecord {
    /// Decodes the record at the start of `data`.
    ///
    /// Returns `None` when the declared length is below the minimum, runs
    /// past `data`, or cannot hold the declared identifier.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let length = *data.first()?;
        let len = usize::from(length);
        if len < MIN_RECORD_SIZE || len > data.len() {
            return None;
        }
        let name_len = usize::from(data[32]);
        if FIXED_SIZE + name_len > len {
            return None;
        }

        let fixed: &[u8; FIXED_SIZE] = data[..FIXED_SIZE].try_into().ok()?;
        let name = &data[FIXED_SIZE..FIXED_SIZE + name_len];
        let mut date = [0u8; 7];
        date.copy_from_slice(&data[18..25]);

        Some(Self {
            length,
            extended_attribute_length: data[1],
            extent_location: both_endian_u32(&data[2..10]),
            data_length: both_endian_u32(&data[10..18]),
            recorded_at: RecordingDateTime::from_bytes(&date),
            flags: FileFlags(data[25]),
            file_unit_size: data[26],
            interleave_gap_size: data[27],
            volume_sequence_number: both_endian_u16(&data[28..32]),
            identifier: name.to_vec(),
            fingerprint: fingerprint(fixed, name),
        })
    }

    /// The "." record describing the directory itself
    pub fn is_self(&self) -> bool {
        self.identifier.as_slice() == [0x00]
    }

    /// The ".." record describing the parent directory
    pub fn is_parent(&self) -> bool {
        self.identifier.as_slice() == [0x01]
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.flags.is_directory()
    }

    /// File identifier without the `;version` suffix and a trailing dot
    pub fn name(&self) -> String {
        if self.is_self() {
            return ".".to_string();
        }
        if self.is_parent() {
            return "..".to_string();
        }
        let raw = String::from_utf8_lossy(&self.identifier);
        let base = match raw.rfind(';') {
            Some(pos) if !self.is_directory() => &raw[..pos],
            _ => &raw[..],
        };
        let base = base.strip_suffix('.').unwrap_or(base);
        base.to_string()
    }

    /// Bytes occupied by the identifier plus its padding byte
    pub fn padded_identifier_len(&self) -> usize {
        let len = self.identifier.len();
        len + usize::from(len % 2 == 0)
    }
}
