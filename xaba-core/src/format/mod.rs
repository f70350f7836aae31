pub mod compressed;
pub mod cursor;
pub mod error;
pub mod store;

pub use compressed::{is_compressed, CompressedAssembly, CompressedHeader};
pub use error::{Error, Result};
pub use store::{
    AssemblyDescriptor, AssemblyStore, HashEntry, HashEntry32, HashEntry64, PayloadKind,
    StoreHeader, TableLayout,
};
