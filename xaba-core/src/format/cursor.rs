//! Fixed-layout little-endian record decoding.
//!
//! Every on-disk structure in an assembly store has a fixed size and is made of
//! 4-byte tags and little-endian `u32`/`u64` fields. A structure implements
//! [`FixedLayout`] and is decoded from offset 0 of a slice with [`decode`], or
//! as a run of consecutive records with [`decode_table`].

use byteorder::{ByteOrder, LittleEndian};

use super::error::{Error, Result};

/// A record with a fixed on-disk size.
pub trait FixedLayout: Sized {
    /// Human readable name, used in error messages.
    const NAME: &'static str;
    /// Size of one record in bytes.
    const SIZE: usize;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>;
}

/// Sequential reader over the bytes of one record.
pub struct FieldReader<'a> {
    structure: &'static str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(structure: &'static str, bytes: &'a [u8]) -> Self {
        Self {
            structure,
            bytes,
            pos: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return Err(Error::TruncatedInput {
                structure: self.structure,
                needed: end,
                available: self.bytes.len(),
            });
        }
        let field = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(field)
    }

    /// Read a 4-byte signature verbatim.
    pub fn tag(&mut self) -> Result<[u8; 4]> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }
}

/// Decode one `T` from the start of `bytes`.
///
/// Only the length is checked; field values are returned as stored.
pub fn decode<T: FixedLayout>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < T::SIZE {
        return Err(Error::TruncatedInput {
            structure: T::NAME,
            needed: T::SIZE,
            available: bytes.len(),
        });
    }

    let mut fields = FieldReader::new(T::NAME, &bytes[..T::SIZE]);
    T::read_fields(&mut fields)
}

/// Decode `count` consecutive `T` records starting at `offset`.
pub fn decode_table<T: FixedLayout>(bytes: &[u8], offset: usize, count: usize) -> Result<Vec<T>> {
    // a bogus count must not turn into a huge allocation before the first short slot is hit
    let mut records = Vec::with_capacity(count.min(bytes.len() / T::SIZE));

    for i in 0..count {
        let start = offset.saturating_add(i.saturating_mul(T::SIZE));
        let slot = bytes.get(start..).unwrap_or_default();
        records.push(decode::<T>(slot)?);
    }

    Ok(records)
}

/// True when `bytes` starts with `magic`.
#[inline]
pub fn has_signature(bytes: &[u8], magic: &[u8; 4]) -> bool {
    bytes.get(..4) == Some(&magic[..])
}
