//! This crate implements reading of Xamarin assembly stores.
//!
//! An assembly store (`XABA`) bundles the managed assemblies of an application,
//! optionally with their debug symbols and config files. Main assembly data is
//! usually wrapped in a compressed assembly (`XALZ`, an LZ4 block with a small
//! header). [`format`] holds the binary readers, [`extract`] maps a parsed store
//! to named output files.

#![allow(clippy::uninlined_format_args)]

pub mod extract;
pub mod format;

pub use extract::{extract, MainPayload, NamedPayload, StoreSet};
pub use format::{AssemblyStore, CompressedAssembly, Error, PayloadKind, Result};

#[cfg(test)]
mod test_util;
