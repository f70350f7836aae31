//! Builders for synthetic store files used by the unit tests.

use crate::format::compressed::COMPRESSED_MAGIC;
use crate::format::store::{AssemblyDescriptor, TableLayout, STORE_MAGIC};

/// Wrap an LZ4 block in an `XALZ` header.
pub(crate) fn xalz(descriptor_index: u32, uncompressed_size: u32, block: &[u8]) -> Vec<u8> {
    let mut out = COMPRESSED_MAGIC.to_vec();
    out.extend_from_slice(&descriptor_index.to_le_bytes());
    out.extend_from_slice(&uncompressed_size.to_le_bytes());
    out.extend_from_slice(block);
    out
}

/// Compress `raw` into a complete `XALZ` payload.
pub(crate) fn compress_assembly(raw: &[u8], descriptor_index: u32) -> Vec<u8> {
    let block = lz4::block::compress(raw, None, false).unwrap();
    xalz(descriptor_index, raw.len() as u32, &block)
}

/// The payload bytes behind one descriptor. Empty means absent.
#[derive(Debug, Clone, Default)]
pub(crate) struct Payloads {
    pub data: Vec<u8>,
    pub debug: Vec<u8>,
    pub config: Vec<u8>,
}

impl Payloads {
    pub fn data(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn with_debug(mut self, debug: Vec<u8>) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_config(mut self, config: Vec<u8>) -> Self {
        self.config = config;
        self
    }
}

enum Slot {
    Packed(Payloads),
    Raw(AssemblyDescriptor),
}

struct Hash {
    hash: u64,
    local_store_index: u32,
    store_id: u32,
}

/// Lays out header, tables and data region the way the packer does: payloads
/// are appended to the data region in descriptor order (data, debug, config).
pub(crate) struct StoreBuilder {
    magic: [u8; 4],
    version: u32,
    store_id: u32,
    slots: Vec<Slot>,
    hashes: Vec<Hash>,
}

impl StoreBuilder {
    pub fn new(store_id: u32) -> Self {
        Self {
            magic: *STORE_MAGIC,
            version: 1,
            store_id,
            slots: Vec::new(),
            hashes: Vec::new(),
        }
    }

    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn descriptor(mut self, payloads: Payloads) -> Self {
        self.slots.push(Slot::Packed(payloads));
        self
    }

    /// A descriptor written verbatim, offsets included.
    pub fn raw_descriptor(mut self, descriptor: AssemblyDescriptor) -> Self {
        self.slots.push(Slot::Raw(descriptor));
        self
    }

    pub fn hash(self, hash: u64, local_store_index: u32) -> Self {
        self.hash_in(hash, local_store_index, 0)
    }

    pub fn hash_in(mut self, hash: u64, local_store_index: u32, store_id: u32) -> Self {
        self.hashes.push(Hash {
            hash,
            local_store_index,
            store_id,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let layout = TableLayout::new(self.slots.len() as u32, self.hashes.len() as u32);

        let mut data = Vec::new();
        let mut descriptors = Vec::new();
        for slot in &self.slots {
            match slot {
                Slot::Raw(d) => descriptors.push(*d),
                Slot::Packed(p) => {
                    let mut place = |bytes: &[u8]| -> (u32, u32) {
                        if bytes.is_empty() {
                            return (0, 0);
                        }
                        let offset = (layout.data_start + data.len()) as u32;
                        data.extend_from_slice(bytes);
                        (offset, bytes.len() as u32)
                    };
                    let (data_offset, data_size) = place(&p.data);
                    let (debug_data_offset, debug_data_size) = place(&p.debug);
                    let (config_data_offset, config_data_size) = place(&p.config);
                    descriptors.push(AssemblyDescriptor {
                        data_offset,
                        data_size,
                        debug_data_offset,
                        debug_data_size,
                        config_data_offset,
                        config_data_size,
                    });
                }
            }
        }

        let mut out = self.magic.to_vec();
        for v in [
            self.version,
            self.slots.len() as u32,
            self.hashes.len() as u32,
            self.store_id,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }

        for d in &descriptors {
            for v in [
                d.data_offset,
                d.data_size,
                d.debug_data_offset,
                d.debug_data_size,
                d.config_data_offset,
                d.config_data_size,
            ] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }

        // hash32 table: low half of the hash, four padding bytes
        for h in &self.hashes {
            out.extend_from_slice(&(h.hash as u32).to_le_bytes());
            out.extend_from_slice(&[0; 4]);
            write_hash_tail(&mut out, h);
        }
        for h in &self.hashes {
            out.extend_from_slice(&h.hash.to_le_bytes());
            write_hash_tail(&mut out, h);
        }

        assert_eq!(out.len(), layout.data_start);
        out.extend_from_slice(&data);
        out
    }
}

fn write_hash_tail(out: &mut Vec<u8>, h: &Hash) {
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&h.local_store_index.to_le_bytes());
    out.extend_from_slice(&h.store_id.to_le_bytes());
}
