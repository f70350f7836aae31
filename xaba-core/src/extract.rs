//! Turning a parsed store into named output payloads.
//!
//! Every entry of the 64-bit hash table names one descriptor. Its payloads are
//! written as `<hash>.so` (decompressed main data), `<hash>.bin` (main data that
//! is not `XALZ`), `<hash>.dbg` and `<hash>.xml`.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::format::compressed::CompressedAssembly;
use crate::format::error::{Error, Result};
use crate::format::store::{AssemblyDescriptor, AssemblyStore};

pub use crate::format::store::PayloadKind;

/// Suffix for main data that did not carry the `XALZ` signature.
pub const PASSTHROUGH_SUFFIX: &str = ".bin";

/// What became of a main-data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainPayload {
    /// Was an `XALZ` payload; holds the decompressed bytes.
    Decoded(Vec<u8>),
    /// Not compressed (or not in a format we know); holds the bytes unchanged.
    Passthrough(Vec<u8>),
}

impl MainPayload {
    /// Try `XALZ` decoding. Only a signature mismatch falls back to passthrough.
    pub fn decode(raw: &Bytes) -> Result<Self> {
        match CompressedAssembly::parse(raw.clone()) {
            Ok(asm) => Ok(MainPayload::Decoded(asm.into_data())),
            Err(e) if e.is_signature_mismatch() => {
                log::debug!("main payload is not XALZ, passing {} bytes through", raw.len());
                Ok(MainPayload::Passthrough(raw.to_vec()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            MainPayload::Decoded(_) => PayloadKind::Data.suffix(),
            MainPayload::Passthrough(_) => PASSTHROUGH_SUFFIX,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, MainPayload::Decoded(_))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            MainPayload::Decoded(b) | MainPayload::Passthrough(b) => b,
        }
    }
}

/// One output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPayload {
    pub kind: PayloadKind,
    pub name: String,
    /// The 64-bit hash the name was derived from.
    pub hash: u64,
    /// Whether `bytes` came out of an `XALZ` wrapper.
    pub compressed: bool,
    pub bytes: Vec<u8>,
}

/// File name stem for a hash: the big-endian bytes as lowercase hex.
pub fn name_stem(hash: u64) -> String {
    format!("{:016x}", hash)
}

/// Extract every payload referenced by the store's 64-bit hash table.
///
/// `local_store_index` is used as a 0-based index into this store's descriptor
/// table. Output follows hash table order; within one entry the order is data,
/// debug, config.
pub fn extract(store: &AssemblyStore) -> Result<Vec<NamedPayload>> {
    let mut out = Vec::new();

    for entry in store.hashes64() {
        let descriptor = store.descriptor(entry.local_store_index)?;
        log::debug!(
            "assigned {:016x} to descriptor[{}] at offset {}",
            entry.hash,
            entry.local_store_index,
            descriptor.data_offset
        );
        extract_entry(store, entry.hash, descriptor, &mut out)?;
    }

    Ok(out)
}

fn extract_entry(
    store: &AssemblyStore,
    hash: u64,
    descriptor: &AssemblyDescriptor,
    out: &mut Vec<NamedPayload>,
) -> Result<()> {
    let stem = name_stem(hash);

    for kind in PayloadKind::ALL {
        let Some(raw) = store.payload(descriptor, kind)? else {
            continue;
        };

        let payload = match kind {
            PayloadKind::Data => {
                let main = MainPayload::decode(&raw)?;
                NamedPayload {
                    kind,
                    name: format!("{}{}", stem, main.suffix()),
                    hash,
                    compressed: main.is_decoded(),
                    bytes: main.into_bytes(),
                }
            }
            PayloadKind::Debug | PayloadKind::Config => NamedPayload {
                kind,
                name: format!("{}{}", stem, kind.suffix()),
                hash,
                compressed: false,
                bytes: raw.to_vec(),
            },
        };

        log::debug!("extracted {}: {} bytes", payload.name, payload.bytes.len());
        out.push(payload);
    }

    Ok(())
}

/// The store files of one application, keyed by store id.
///
/// Store 0 carries the hash tables; its entries may point into any store of the
/// set through their `store_id`.
#[derive(Debug, Clone)]
pub struct StoreSet {
    stores: BTreeMap<u32, AssemblyStore>,
}

impl StoreSet {
    pub fn new(stores: impl IntoIterator<Item = AssemblyStore>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for store in stores {
            let store_id = store.store_id();
            if map.insert(store_id, store).is_some() {
                return Err(Error::DuplicateStoreId { store_id });
            }
        }

        if !map.contains_key(&0) {
            return Err(Error::MissingIndexStore);
        }

        Ok(Self { stores: map })
    }

    /// Store 0.
    pub fn index(&self) -> &AssemblyStore {
        // checked in `new`
        &self.stores[&0]
    }

    pub fn get(&self, store_id: u32) -> Option<&AssemblyStore> {
        self.stores.get(&store_id)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssemblyStore> {
        self.stores.values()
    }

    /// Like [`extract`], but each hash entry is resolved in the store named by its `store_id`.
    pub fn extract(&self) -> Result<Vec<NamedPayload>> {
        let mut out = Vec::new();

        for entry in self.index().hashes64() {
            let store = self.get(entry.store_id).ok_or(Error::UnknownStore {
                store_id: entry.store_id,
            })?;
            let descriptor = store.descriptor(entry.local_store_index)?;
            log::debug!(
                "assigned {:016x} to store {} descriptor[{}] at offset {}",
                entry.hash,
                entry.store_id,
                entry.local_store_index,
                descriptor.data_offset
            );
            extract_entry(store, entry.hash, descriptor, &mut out)?;
        }

        Ok(out)
    }
}
