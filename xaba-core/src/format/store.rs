//! Assembly store (`XABA`) reader.
//!
//! Layout (little-endian):
//! - header (0x14 bytes)
//! - descriptor table, `local_entry_count` x 0x18 bytes
//! - 32-bit hash table, `global_entry_count` x 0x14 bytes (populated only in store 0)
//! - 64-bit hash table, `global_entry_count` x 0x14 bytes (populated only in store 0)
//! - data region, addressed by absolute file offsets from the descriptors

use std::fmt;
use std::path::Path;

use bytes::Bytes;

use super::cursor::{self, FieldReader, FixedLayout};
use super::error::{Error, Result};

pub const STORE_MAGIC: &[u8; 4] = b"XABA";
pub const HEADER_SIZE: usize = 0x14;
pub const DESCRIPTOR_SIZE: usize = 0x18;
pub const HASH_ENTRY_SIZE: usize = 0x14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// Number of descriptors in this file.
    pub local_entry_count: u32,
    /// Number of hash entries; the tables are only meaningful in store 0.
    pub global_entry_count: u32,
    pub store_id: u32,
}

impl FixedLayout for StoreHeader {
    const NAME: &'static str = "assembly store header";
    const SIZE: usize = HEADER_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            magic: fields.tag()?,
            version: fields.u32()?,
            local_entry_count: fields.u32()?,
            global_entry_count: fields.u32()?,
            store_id: fields.u32()?,
        })
    }
}

/// The three payloads a descriptor can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Data,
    Debug,
    Config,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 3] = [PayloadKind::Data, PayloadKind::Debug, PayloadKind::Config];

    /// File name suffix used when the payload is written out.
    pub fn suffix(self) -> &'static str {
        match self {
            PayloadKind::Data => ".so",
            PayloadKind::Debug => ".dbg",
            PayloadKind::Config => ".xml",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadKind::Data => "data",
            PayloadKind::Debug => "debug",
            PayloadKind::Config => "config",
        })
    }
}

/// Offsets and sizes of one assembly's payloads. Offsets are absolute file offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyDescriptor {
    pub data_offset: u32,
    pub data_size: u32,
    pub debug_data_offset: u32,
    pub debug_data_size: u32,
    pub config_data_offset: u32,
    pub config_data_size: u32,
}

impl AssemblyDescriptor {
    /// `(offset, size)` of one payload kind. A size of 0 means the payload is absent.
    pub fn range(&self, kind: PayloadKind) -> (u32, u32) {
        match kind {
            PayloadKind::Data => (self.data_offset, self.data_size),
            PayloadKind::Debug => (self.debug_data_offset, self.debug_data_size),
            PayloadKind::Config => (self.config_data_offset, self.config_data_size),
        }
    }

    #[inline]
    pub fn has(&self, kind: PayloadKind) -> bool {
        self.range(kind).1 != 0
    }
}

impl FixedLayout for AssemblyDescriptor {
    const NAME: &'static str = "assembly descriptor";
    const SIZE: usize = DESCRIPTOR_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            data_offset: fields.u32()?,
            data_size: fields.u32()?,
            debug_data_offset: fields.u32()?,
            debug_data_size: fields.u32()?,
            config_data_offset: fields.u32()?,
            config_data_size: fields.u32()?,
        })
    }
}

/// Width of the hash stored in a hash table slot.
///
/// Both tables share the same 0x14-byte slot; the 32-bit table keeps its hash in
/// the low four bytes and leaves the upper four unused.
pub trait HashWidth: Copy + fmt::Debug + PartialEq {
    const TABLE_NAME: &'static str;

    fn read_hash(fields: &mut FieldReader<'_>) -> Result<Self>;
}

impl HashWidth for u32 {
    const TABLE_NAME: &'static str = "hash32 entry";

    fn read_hash(fields: &mut FieldReader<'_>) -> Result<Self> {
        let hash = fields.u32()?;
        fields.skip(4)?;
        Ok(hash)
    }
}

impl HashWidth for u64 {
    const TABLE_NAME: &'static str = "hash64 entry";

    fn read_hash(fields: &mut FieldReader<'_>) -> Result<Self> {
        fields.u64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEntry<H> {
    pub hash: H,
    pub mapping_index: u32,
    /// Index into the descriptor table of the store named by `store_id`.
    pub local_store_index: u32,
    pub store_id: u32,
}

pub type HashEntry32 = HashEntry<u32>;
pub type HashEntry64 = HashEntry<u64>;

impl<H: HashWidth> FixedLayout for HashEntry<H> {
    const NAME: &'static str = H::TABLE_NAME;
    const SIZE: usize = HASH_ENTRY_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            hash: H::read_hash(fields)?,
            mapping_index: fields.u32()?,
            local_store_index: fields.u32()?,
            store_id: fields.u32()?,
        })
    }
}

/// Absolute offsets of the tables following the header.
///
/// Depends only on the two entry counts. Arithmetic saturates, so an absurd
/// count produces a data start past any real buffer and parsing reports truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub descriptors: usize,
    pub hashes32: usize,
    pub hashes64: usize,
    pub data_start: usize,
}

impl TableLayout {
    pub fn new(local_entry_count: u32, global_entry_count: u32) -> Self {
        let hash_table_size = (global_entry_count as usize).saturating_mul(HASH_ENTRY_SIZE);

        let descriptors = HEADER_SIZE;
        let hashes32 =
            descriptors.saturating_add((local_entry_count as usize).saturating_mul(DESCRIPTOR_SIZE));
        let hashes64 = hashes32.saturating_add(hash_table_size);
        let data_start = hashes64.saturating_add(hash_table_size);

        Self {
            descriptors,
            hashes32,
            hashes64,
            data_start,
        }
    }

    pub fn for_header(header: &StoreHeader) -> Self {
        Self::new(header.local_entry_count, header.global_entry_count)
    }
}

/// A parsed assembly store. Immutable once built.
#[derive(Debug, Clone)]
pub struct AssemblyStore {
    header: StoreHeader,
    layout: TableLayout,
    descriptors: Vec<AssemblyDescriptor>,
    hashes32: Vec<HashEntry32>,
    hashes64: Vec<HashEntry64>,
    /// Everything after the tables; shares the input buffer.
    data: Bytes,
}

impl AssemblyStore {
    /// Parse a complete store file held in memory.
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();

        let header = cursor::decode::<StoreHeader>(&data)?;
        log::debug!(
            "parsed store header: magic={:?}, version={}, local_entry_count={}, global_entry_count={}, store_id={:x}",
            String::from_utf8_lossy(&header.magic),
            header.version,
            header.local_entry_count,
            header.global_entry_count,
            header.store_id
        );

        if &header.magic != STORE_MAGIC {
            return Err(Error::InvalidSignature {
                structure: "assembly store",
                expected: "XABA",
                found: header.magic.to_vec(),
            });
        }

        let layout = TableLayout::for_header(&header);
        log::debug!(
            "descriptor_table_offset={}, hash32_table_offset={}, hash64_table_offset={}, data_start={}",
            layout.descriptors,
            layout.hashes32,
            layout.hashes64,
            layout.data_start
        );

        let descriptors = cursor::decode_table::<AssemblyDescriptor>(
            &data,
            layout.descriptors,
            header.local_entry_count as usize,
        )?;
        for (i, d) in descriptors.iter().enumerate() {
            log::debug!("descriptor[{}]: {:?}", i, d);
        }

        let (hashes32, hashes64) = if header.store_id == 0 {
            let count = header.global_entry_count as usize;
            let hashes32 = cursor::decode_table::<HashEntry32>(&data, layout.hashes32, count)?;
            let hashes64 = cursor::decode_table::<HashEntry64>(&data, layout.hashes64, count)?;
            for e in &hashes64 {
                log::debug!(
                    "hash64 entry: hash={:016x}, mapping_index={}, local_store_index={}, store_id={}",
                    e.hash,
                    e.mapping_index,
                    e.local_store_index,
                    e.store_id
                );
            }
            (hashes32, hashes64)
        } else {
            (Vec::new(), Vec::new())
        };

        if layout.data_start > data.len() {
            return Err(Error::TruncatedInput {
                structure: "data region",
                needed: layout.data_start,
                available: data.len(),
            });
        }

        Ok(Self {
            header,
            layout,
            descriptors,
            hashes32,
            hashes64,
            data: data.slice(layout.data_start..),
        })
    }

    /// Read a whole store file and parse it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        log::debug!("read {} bytes from {:?}", data.len(), path.as_ref());
        Self::parse(data)
    }

    #[inline]
    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    #[inline]
    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    #[inline]
    pub fn store_id(&self) -> u32 {
        self.header.store_id
    }

    /// Store 0 is the only one carrying the global hash tables.
    #[inline]
    pub fn is_index_store(&self) -> bool {
        self.header.store_id == 0
    }

    pub fn descriptors(&self) -> &[AssemblyDescriptor] {
        &self.descriptors
    }

    pub fn hashes32(&self) -> &[HashEntry32] {
        &self.hashes32
    }

    pub fn hashes64(&self) -> &[HashEntry64] {
        &self.hashes64
    }

    /// The data region, i.e. the file contents after the last table.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Absolute file offset at which the data region starts.
    #[inline]
    pub fn data_start(&self) -> usize {
        self.layout.data_start
    }

    pub fn descriptor(&self, index: u32) -> Result<&AssemblyDescriptor> {
        self.descriptors
            .get(index as usize)
            .ok_or(Error::DescriptorOutOfRange {
                index,
                count: self.descriptors.len(),
            })
    }

    pub fn find_hash32(&self, hash: u32) -> Option<&HashEntry32> {
        self.hashes32.iter().find(|e| e.hash == hash)
    }

    pub fn find_hash64(&self, hash: u64) -> Option<&HashEntry64> {
        self.hashes64.iter().find(|e| e.hash == hash)
    }

    /// Slice one payload out of the data region without copying.
    ///
    /// Returns `Ok(None)` when the descriptor's size for `kind` is 0.
    pub fn payload(&self, descriptor: &AssemblyDescriptor, kind: PayloadKind) -> Result<Option<Bytes>> {
        let (offset, size) = descriptor.range(kind);
        if size == 0 {
            return Ok(None);
        }

        let out_of_bounds = || Error::PayloadOutOfBounds {
            kind,
            offset,
            size,
            data_start: self.layout.data_start,
            data_len: self.data.len(),
        };

        let start = (offset as usize)
            .checked_sub(self.layout.data_start)
            .ok_or_else(out_of_bounds)?;
        let end = start
            .checked_add(size as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(out_of_bounds)?;

        log::debug!("sliced {} payload: start={}, end={}", kind, start, end);
        Ok(Some(self.data.slice(start..end)))
    }
}
