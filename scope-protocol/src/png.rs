//! Walking and repairing the chunk table of a PNG image.
//!
//! Some instrument firmware emits PNG screenshots whose chunk checksums do not
//! match their contents, which standard decoders reject. [`repair`] rewrites
//! every checksum so the image decodes, leaving everything else untouched.
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FormatError;

/// The fixed 8-byte signature every PNG image starts with.
pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Type of the chunk that ends a PNG image.
pub const IEND: [u8; 4] = *b"IEND";

const LENGTH_LEN: usize = 4;
const TYPE_LEN: usize = 4;
const CRC_LEN: usize = 4;

/// A single chunk, borrowed from the image it was read from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Chunk<'a> {
    chunk_type: [u8; 4],
    data: &'a [u8],
    crc: u32,
}

impl<'a> Chunk<'a> {
    pub fn chunk_type(&self) -> [u8; 4] {
        self.chunk_type
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The checksum stored in the image.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// CRC-32/IEEE over chunk type and data.
    pub fn computed_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.chunk_type);
        hasher.update(self.data);
        hasher.finalize()
    }

    pub fn is_valid(&self) -> bool {
        self.crc == self.computed_crc()
    }

    pub fn is_end(&self) -> bool {
        self.chunk_type == IEND
    }

    /// Number of bytes the chunk occupies in the image.
    pub fn encoded_len(&self) -> usize {
        LENGTH_LEN + TYPE_LEN + self.data.len() + CRC_LEN
    }

    fn type_name(chunk_type: &[u8]) -> String {
        String::from_utf8_lossy(chunk_type).to_string()
    }
}

/// Iterator over the chunks of a PNG image.
///
/// Iteration stops after the `IEND` chunk, at the end of the data, or after
/// the first error.
pub struct Chunks<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    /// Checks the signature and returns an iterator over the chunks following it.
    pub fn new(data: &'a [u8]) -> Result<Chunks<'a>, FormatError> {
        if !data.starts_with(&SIGNATURE) {
            return Err(FormatError::InvalidSignature);
        }
        Ok(Chunks {
            data,
            offset: SIGNATURE.len(),
            done: false,
        })
    }

    /// Offset of the first byte not consumed by the chunks read so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_chunk(&self) -> Result<Chunk<'a>, FormatError> {
        let rest = &self.data[self.offset..];
        if rest.len() < LENGTH_LEN + TYPE_LEN {
            return Err(FormatError::UnexpectedEnd {
                offset: self.offset,
            });
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let chunk_type = [rest[4], rest[5], rest[6], rest[7]];
        let needed = (LENGTH_LEN + TYPE_LEN + CRC_LEN)
            .checked_add(len)
            .ok_or_else(|| FormatError::ChunkTooLong {
                chunk_type: Chunk::type_name(&chunk_type),
                offset: self.offset,
                len,
                available: rest.len(),
            })?;
        if rest.len() < needed {
            return Err(FormatError::ChunkTooLong {
                chunk_type: Chunk::type_name(&chunk_type),
                offset: self.offset,
                len,
                available: rest.len(),
            });
        }
        let data_start = LENGTH_LEN + TYPE_LEN;
        let crc_start = data_start + len;
        let crc = u32::from_be_bytes([
            rest[crc_start],
            rest[crc_start + 1],
            rest[crc_start + 2],
            rest[crc_start + 3],
        ]);
        Ok(Chunk {
            chunk_type,
            data: &rest[data_start..crc_start],
            crc,
        })
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            return None;
        }
        match self.read_chunk() {
            Ok(chunk) => {
                self.offset += chunk.encoded_len();
                self.done = chunk.is_end();
                Some(Ok(chunk))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// A PNG image whose chunk checksums have been recomputed.
#[derive(Clone, Debug)]
pub struct Repaired {
    data: Bytes,
    chunks: usize,
    corrected: usize,
    discarded: usize,
}

impl Repaired {
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Number of chunks written.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Number of chunks whose stored checksum was wrong.
    pub fn corrected(&self) -> usize {
        self.corrected
    }

    /// Bytes following the `IEND` chunk that were dropped.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

/// Rewrites the checksum of every chunk in `data`.
///
/// The signature and each chunk's length, type and data are copied verbatim and
/// followed by the CRC-32 of type and data. Anything after the `IEND` chunk is
/// dropped. Fails if `data` is not a PNG image or a chunk runs past the end of
/// the data.
pub fn repair(data: &[u8]) -> Result<Repaired, FormatError> {
    let mut chunks = Chunks::new(data)?;
    let mut out = BytesMut::with_capacity(data.len());
    out.put_slice(&SIGNATURE);

    let mut count = 0;
    let mut corrected = 0;
    for chunk in chunks.by_ref() {
        let chunk = chunk?;
        let crc = chunk.computed_crc();
        if crc != chunk.crc() {
            corrected += 1;
        }
        out.put_u32(chunk.data().len() as u32);
        out.put_slice(&chunk.chunk_type());
        out.put_slice(chunk.data());
        out.put_u32(crc);
        count += 1;
    }

    Ok(Repaired {
        data: out.freeze(),
        chunks: count,
        corrected,
        discarded: data.len() - chunks.offset(),
    })
}
