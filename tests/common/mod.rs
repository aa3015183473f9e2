//! Synthetic image builders shared by the integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;

pub const SECTOR: usize = 2048;
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

// ============================================================================
// GIF
// ============================================================================

pub struct GifBuilder {
    magic: [u8; 6],
    width: u16,
    height: u16,
    flags: u8,
    body: Vec<u8>,
    trailer: bool,
}

impl GifBuilder {
    pub fn new() -> Self {
        Self {
            magic: *b"GIF89a",
            width: 1,
            height: 1,
            flags: 0,
            body: Vec::new(),
            trailer: true,
        }
    }

    pub fn gif87a(mut self) -> Self {
        self.magic = *b"GIF87a";
        self
    }

    pub fn size(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Adds a global color table with `2^(bits+1)` entries
    pub fn global_color_table(mut self, bits: u8) -> Self {
        self.flags = 0x80 | (bits & 0x07);
        self
    }

    pub fn extension(mut self, label: u8, sub_blocks: &[&[u8]]) -> Self {
        self.body.push(0x21);
        self.body.push(label);
        push_sub_blocks(&mut self.body, sub_blocks);
        self
    }

    pub fn image(mut self, local_table_bits: Option<u8>, sub_blocks: &[&[u8]]) -> Self {
        self.body.push(0x2C);
        self.body.extend_from_slice(&[0, 0, 0, 0]);
        self.body.extend_from_slice(&self.width.to_le_bytes());
        self.body.extend_from_slice(&self.height.to_le_bytes());
        match local_table_bits {
            Some(bits) => {
                self.body.push(0x80 | (bits & 0x07));
                self.body.extend(vec![0x11; color_table_len(bits)]);
            }
            None => self.body.push(0),
        }
        self.body.push(2); // LZW minimum code size
        push_sub_blocks(&mut self.body, sub_blocks);
        self
    }

    /// Ends the block sequence with an unrecognized sentinel instead of the trailer
    pub fn unknown_tag(mut self, tag: u8) -> Self {
        self.body.push(tag);
        self.trailer = false;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = self.magic.to_vec();
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&[self.flags, 0, 0]);
        if self.flags & 0x80 != 0 {
            out.extend(vec![0x22; color_table_len(self.flags & 0x07)]);
        }
        out.extend(self.body);
        if self.trailer {
            out.push(0x3B);
        }
        out
    }
}

pub fn color_table_len(bits: u8) -> usize {
    3 * (1 << ((bits & 0x07) + 1))
}

fn push_sub_blocks(out: &mut Vec<u8>, sub_blocks: &[&[u8]]) {
    for block in sub_blocks {
        out.push(block.len() as u8);
        out.extend_from_slice(block);
    }
    out.push(0);
}

// ============================================================================
// PNG
// ============================================================================

pub fn png_chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::new();
    chunk.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    chunk.extend_from_slice(tag);
    chunk.extend_from_slice(payload);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(tag);
    hasher.update(payload);
    chunk.extend_from_slice(&hasher.finalize().to_be_bytes());
    chunk
}

pub fn ihdr_payload(width: u32, height: u32, bit_depth: u8, color_type: u8) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&width.to_be_bytes());
    payload.extend_from_slice(&height.to_be_bytes());
    payload.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);
    payload
}

/// Signature followed by the given chunks, in order
pub fn png_from_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut data = PNG_SIGNATURE.to_vec();
    for chunk in chunks {
        data.extend_from_slice(chunk);
    }
    data
}

/// A small but complete PNG: IHDR, tEXt, IDAT, IEND
pub fn sample_png() -> Vec<u8> {
    png_from_chunks(&[
        png_chunk(b"IHDR", &ihdr_payload(16, 16, 8, 2)),
        png_chunk(b"tEXt", b"Title\0boundary"),
        png_chunk(b"IDAT", &[0xAA; 100]),
        png_chunk(b"IEND", &[]),
    ])
}

// ============================================================================
// ISO9660
// ============================================================================

enum Entry {
    Dir,
    File(Vec<u8>),
}

/// Builds small ISO9660 images: descriptors at sector 16, one sector per
/// directory, files after the directories.
pub struct IsoBuilder {
    volume_id: String,
    boot_record: bool,
    entries: BTreeMap<String, Entry>,
}

impl IsoBuilder {
    pub fn new() -> Self {
        Self {
            volume_id: "TEST_VOLUME".to_string(),
            boot_record: false,
            entries: BTreeMap::new(),
        }
    }

    pub fn volume_id(mut self, id: &str) -> Self {
        self.volume_id = id.to_string();
        self
    }

    /// Places a Boot Record descriptor in front of the Primary
    pub fn with_boot_record(mut self) -> Self {
        self.boot_record = true;
        self
    }

    /// Adds a directory; `path` is absolute, e.g. `/DOCS`
    pub fn dir(mut self, path: &str) -> Self {
        self.entries.insert(path.to_string(), Entry::Dir);
        self
    }

    /// Adds a file; the on-disk identifier gets a `;1` version suffix
    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.entries
            .insert(path.to_string(), Entry::File(content.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let descriptors = if self.boot_record { 3 } else { 2 };
        let mut lba = 16 + descriptors;

        let mut dir_lba: BTreeMap<String, u32> = BTreeMap::new();
        dir_lba.insert(String::new(), lba);
        lba += 1;
        for (path, entry) in &self.entries {
            if let Entry::Dir = entry {
                dir_lba.insert(path.clone(), lba);
                lba += 1;
            }
        }
        let mut file_lba: BTreeMap<String, u32> = BTreeMap::new();
        for (path, entry) in &self.entries {
            if let Entry::File(content) = entry {
                file_lba.insert(path.clone(), lba);
                lba += content.len().div_ceil(SECTOR).max(1) as u32;
            }
        }

        let total = lba;
        let mut data = vec![0u8; total as usize * SECTOR];

        let mut sector = 16;
        if self.boot_record {
            let at = sector * SECTOR;
            data[at] = 0;
            data[at + 1..at + 6].copy_from_slice(b"CD001");
            data[at + 6] = 1;
            write_padded(&mut data[at + 7..at + 39], "EL TORITO SPECIFICATION");
            sector += 1;
        }

        let pvd = sector * SECTOR;
        data[pvd] = 1;
        data[pvd + 1..pvd + 6].copy_from_slice(b"CD001");
        data[pvd + 6] = 1;
        write_padded(&mut data[pvd + 8..pvd + 40], "LINUX");
        write_padded(&mut data[pvd + 40..pvd + 72], &self.volume_id);
        write_both_endian_u32(&mut data[pvd + 80..pvd + 88], total);
        write_both_endian_u16(&mut data[pvd + 120..pvd + 124], 1);
        write_both_endian_u16(&mut data[pvd + 124..pvd + 128], 1);
        write_both_endian_u16(&mut data[pvd + 128..pvd + 132], SECTOR as u16);
        let root = dir_record(dir_lba[""], SECTOR as u32, 0x02, &[0]);
        data[pvd + 156..pvd + 156 + root.len()].copy_from_slice(&root);
        data[pvd + 813..pvd + 830].copy_from_slice(b"2024031512304599\x08");
        data[pvd + 881] = 1;
        sector += 1;

        let term = sector * SECTOR;
        data[term] = 255;
        data[term + 1..term + 6].copy_from_slice(b"CD001");
        data[term + 6] = 1;

        for (dir, &dir_at) in &dir_lba {
            let parent = parent_of(dir);
            let mut records = vec![
                dir_record(dir_at, SECTOR as u32, 0x02, &[0]),
                dir_record(dir_lba[parent], SECTOR as u32, 0x02, &[1]),
            ];
            for (path, entry) in &self.entries {
                if parent_of(path) != dir.as_str() {
                    continue;
                }
                let name = leaf_of(path);
                records.push(match entry {
                    Entry::Dir => dir_record(dir_lba[path], SECTOR as u32, 0x02, name.as_bytes()),
                    Entry::File(content) => dir_record(
                        file_lba[path],
                        content.len() as u32,
                        0x00,
                        format!("{name};1").as_bytes(),
                    ),
                });
            }

            let mut at = dir_at as usize * SECTOR;
            for record in records {
                data[at..at + record.len()].copy_from_slice(&record);
                at += record.len();
            }
        }

        for (path, entry) in &self.entries {
            if let Entry::File(content) = entry {
                let at = file_lba[path] as usize * SECTOR;
                data[at..at + content.len()].copy_from_slice(content);
            }
        }

        data
    }
}

/// Encodes a directory record; the identifier is padded to an even length
pub fn dir_record(lba: u32, size: u32, flags: u8, name: &[u8]) -> Vec<u8> {
    let mut len = 33 + name.len();
    if len % 2 != 0 {
        len += 1;
    }
    let mut record = vec![0u8; len];
    record[0] = len as u8;
    write_both_endian_u32(&mut record[2..10], lba);
    write_both_endian_u32(&mut record[10..18], size);
    record[18..25].copy_from_slice(&[124, 3, 15, 12, 30, 45, 8]);
    record[25] = flags;
    write_both_endian_u16(&mut record[28..32], 1);
    record[32] = name.len() as u8;
    record[33..33 + name.len()].copy_from_slice(name);
    record
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

fn leaf_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

fn write_padded(dst: &mut [u8], text: &str) {
    dst.fill(b' ');
    dst[..text.len()].copy_from_slice(text.as_bytes());
}

pub fn write_both_endian_u32(dst: &mut [u8], value: u32) {
    dst[0..4].copy_from_slice(&value.to_le_bytes());
    dst[4..8].copy_from_slice(&value.to_be_bytes());
}

pub fn write_both_endian_u16(dst: &mut [u8], value: u16) {
    dst[0..2].copy_from_slice(&value.to_le_bytes());
    dst[2..4].copy_from_slice(&value.to_be_bytes());
}

/// `payload` embedded at `at` inside `total` bytes of filler
pub fn embed(payload: &[u8], at: usize, total: usize) -> Vec<u8> {
    let mut data = vec![0x5Au8; total.max(at + payload.len())];
    data[at..at + payload.len()].copy_from_slice(payload);
    data
}
