//! Compressed assembly (`XALZ`) decoder.
//!
//! A 12-byte header (magic, descriptor index, uncompressed length) followed by a
//! raw LZ4 block, no frame header.

use bytes::Bytes;

use super::cursor::{self, FieldReader, FixedLayout};
use super::error::{Error, Result};

pub const COMPRESSED_MAGIC: &[u8; 4] = b"XALZ";
pub const COMPRESSED_HEADER_SIZE: usize = 0xC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    pub magic: [u8; 4],
    /// Index of the descriptor this payload was packed from. Informational only.
    pub descriptor_index: u32,
    pub uncompressed_size: u32,
}

impl FixedLayout for CompressedHeader {
    const NAME: &'static str = "compressed assembly header";
    const SIZE: usize = COMPRESSED_HEADER_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            magic: fields.tag()?,
            descriptor_index: fields.u32()?,
            uncompressed_size: fields.u32()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompressedAssembly {
    header: CompressedHeader,
    compressed: Bytes,
    data: Vec<u8>,
}

impl CompressedAssembly {
    /// Parse and decompress.
    ///
    /// A missing `XALZ` signature is reported as [`Error::InvalidSignature`], which
    /// callers are expected to treat as "not compressed". A damaged block or a
    /// length that disagrees with the header is [`Error::Decompression`].
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();

        if !cursor::has_signature(&data, COMPRESSED_MAGIC) {
            return Err(Error::InvalidSignature {
                structure: "compressed assembly",
                expected: "XALZ",
                found: data[..data.len().min(4)].to_vec(),
            });
        }

        let header = cursor::decode::<CompressedHeader>(&data)?;
        log::debug!(
            "parsed compressed assembly header: descriptor_index={}, uncompressed_size={}",
            header.descriptor_index,
            header.uncompressed_size
        );

        let compressed = data.slice(COMPRESSED_HEADER_SIZE..);
        let data = decompress_block(&compressed, header.uncompressed_size)?;

        Ok(Self {
            header,
            compressed,
            data,
        })
    }

    #[inline]
    pub fn header(&self) -> &CompressedHeader {
        &self.header
    }

    #[inline]
    pub fn descriptor_index(&self) -> u32 {
        self.header.descriptor_index
    }

    #[inline]
    pub fn uncompressed_size(&self) -> u32 {
        self.header.uncompressed_size
    }

    /// The LZ4 block, without the header.
    pub fn compressed(&self) -> &Bytes {
        &self.compressed
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// True when `bytes` carries the `XALZ` signature.
pub fn is_compressed(bytes: &[u8]) -> bool {
    cursor::has_signature(bytes, COMPRESSED_MAGIC)
}

fn decompress_block(src: &[u8], declared: u32) -> Result<Vec<u8>> {
    // empty assemblies may be stored without any block bytes
    if declared == 0 && src.is_empty() {
        return Ok(Vec::new());
    }

    let size = i32::try_from(declared).map_err(|_| Error::Decompression {
        declared,
        reason: "declared size exceeds the LZ4 block limit".to_string(),
    })?;

    let out = lz4::block::decompress(src, Some(size)).map_err(|e| Error::Decompression {
        declared,
        reason: e.to_string(),
    })?;

    if out.len() != declared as usize {
        return Err(Error::Decompression {
            declared,
            reason: format!("block produced {} bytes", out.len()),
        });
    }

    Ok(out)
}
