use super::{
    Chunk, ChunkTag, HEADER_SIZE, IEND, IHDR, IHDR_SIZE, Ihdr, MAX_CHUNK_LENGTH, PNG_SIGNATURE,
    PngImage,
};
use crate::core::{ByteSource, Cursor, WalkError, WalkResult, Window};
use crate::domain::entities::{Finding, Format, ParsedModel, WalkLimits};
use tracing::{debug, trace};

/// Walks the chunk sequence of a PNG stream
#[derive(Debug, Clone, Copy, Default)]
pub struct PngWalker {
    limits: WalkLimits,
}

impl PngWalker {
    pub fn new(limits: WalkLimits) -> Self {
        Self { limits }
    }

    /// Checks whether a PNG begins at `offset` and returns its extent with
    /// the walked chunk model attached.
    pub fn check<S: ByteSource + ?Sized>(&self, source: &S, offset: u64) -> WalkResult<Finding> {
        let mut magic = [0u8; 8];
        if source.read_exact_at(offset, &mut magic).is_err() || magic != PNG_SIGNATURE {
            debug!(offset, "PNG rejected: signature mismatch");
            return Err(WalkError::NoMatch);
        }

        let image = self
            .walk(&Window::new(source, offset))
            .map_err(|err| shift_error(err, offset))
            .inspect_err(|err| debug!(offset, kind = %err.kind(), %err, "PNG rejected"))?;

        let end = offset + image.size;
        Ok(Finding::structured(
            Format::Png,
            offset,
            end,
            ParsedModel::Png(image),
        ))
    }

    /// Walks a region that starts with the PNG header.
    ///
    /// The header bytes are not compared against the signature; callers
    /// establish that before walking. Offsets in the result are relative
    /// to the start of `source`.
    pub fn walk<S: ByteSource + ?Sized>(&self, source: &S) -> WalkResult<PngImage> {
        let mut cur = Cursor::new(source, 0);
        cur.skip(HEADER_SIZE)?;

        let max_length = self.limits.max_chunk_length.min(MAX_CHUNK_LENGTH);
        let mut ihdr = None;
        let mut chunks = Vec::new();

        loop {
            let chunk = self.read_chunk(&mut cur, max_length)?;
            trace!(offset = chunk.offset, tag = %chunk.tag, length = chunk.length, "PNG chunk");

            if chunk.tag == IHDR {
                ihdr = Some(decode_ihdr(&chunk)?);
            }

            let is_end = chunk.tag == IEND;
            chunks.push(chunk);
            if is_end {
                return Ok(PngImage {
                    ihdr,
                    chunks,
                    size: cur.position(),
                });
            }

            if chunks.len() as u64 >= self.limits.max_chunks {
                return Err(WalkError::BudgetExhausted {
                    what: "chunks",
                    limit: self.limits.max_chunks,
                });
            }
        }
    }

    fn read_chunk<S: ByteSource + ?Sized>(
        &self,
        cur: &mut Cursor<'_, S>,
        max_length: u32,
    ) -> WalkResult<Chunk> {
        let offset = cur.position();
        let length = cur.read_u32_be()?;
        let tag = ChunkTag(cur.read_array()?);

        if length > max_length {
            return Err(WalkError::invalid(
                offset,
                format!("chunk {tag} declares {length} bytes (limit {max_length})"),
            ));
        }

        let data = if tag.is_inspected() {
            Some(cur.read_vec(length as usize)?)
        } else {
            cur.skip(u64::from(length))?;
            None
        };

        let crc = cur.read_u32_be()?;
        let crc_matches = data.as_deref().map(|payload| {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(tag.bytes());
            hasher.update(payload);
            hasher.finalize() == crc
        });

        Ok(Chunk {
            offset,
            length,
            tag,
            data,
            crc,
            crc_matches,
        })
    }
}

/// Decodes IHDR. Payloads shorter than the fixed structure leave the
/// missing trailing fields zeroed; longer ones are rejected.
fn decode_ihdr(chunk: &Chunk) -> WalkResult<Ihdr> {
    let payload = chunk.data.as_deref().unwrap_or_default();
    if payload.len() > IHDR_SIZE {
        return Err(WalkError::invalid(
            chunk.offset,
            format!("IHDR payload is {} bytes, at most {IHDR_SIZE} allowed", payload.len()),
        ));
    }
    let mut fixed = [0u8; IHDR_SIZE];
    fixed[..payload.len()].copy_from_slice(payload);
    Ok(Ihdr::from_bytes(&fixed))
}

/// Rebases offsets reported by a windowed walk onto the outer source.
fn shift_error(err: WalkError, base: u64) -> WalkError {
    match err {
        WalkError::Truncated { offset, len } => WalkError::Truncated {
            offset: offset + base,
            len,
        },
        WalkError::StructurallyInvalid { offset, reason } => WalkError::StructurallyInvalid {
            offset: offset + base,
            reason,
        },
        other => other,
    }
}
