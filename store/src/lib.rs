mod memory;
mod object;
mod reference;
mod rocksdb_cache;
mod store;

pub use memory::MemoryCache;
pub use object::{Object, ParsedObject};
pub use reference::{
    HashScheme, Reference, ReferenceFormat, ReferenceParseError, OBJECT_MAXIMUM_DEGREE,
    OBJECT_MAXIMUM_SIZE_BYTES, OBJECT_MINIMUM_SIZE_BYTES,
};
pub use rocksdb_cache::{Cache, RocksDbCache};
pub use store::{ObjectStore, StoreError};
