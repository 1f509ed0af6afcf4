use std::collections::HashMap;
use std::sync::Mutex;

use crate::reference::Reference;
use crate::rocksdb_cache::Cache;

/// An in-memory [`Cache`], used by tests and by short-lived CLI
/// invocations that don't want to pay for a RocksDB handle.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<Reference, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn put(&self, reference: &Reference, value: &[u8]) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(*reference, value.to_vec());
        Ok(())
    }

    fn get(&self, reference: &Reference) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(reference).cloned())
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceFormat;

    #[test]
    fn put_then_get_round_trips() {
        let cache = MemoryCache::new();
        let reference = Reference::of_contents(ReferenceFormat::default(), b"x", 0);
        cache.put(&reference, b"x").unwrap();
        assert_eq!(cache.get(&reference).unwrap().unwrap(), b"x".to_vec());
    }
}
