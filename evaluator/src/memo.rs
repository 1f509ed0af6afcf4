use std::time::Instant;

use serde::Serialize;
use skybuild_store::{Cache, Reference, ReferenceFormat};

use crate::caching::TtlCache;

/// Persists completed key→value pairs across evaluator runs. The key is
/// serialized and hashed into a synthetic [`Reference`] used purely as a
/// lookup address — unlike the object store's own references, this one
/// does not certify that the stored bytes hash to it, since the bytes
/// here are the *value* for the *key*, not the key's own content.
///
/// An in-memory [`TtlCache`] sits in front of the backing [`Cache`] so a
/// key revisited within one run never round-trips through the disk.
pub struct PersistentMemo<C> {
    cache: C,
    l1: TtlCache<Vec<u8>, Vec<u8>>,
}

impl<C: Cache> PersistentMemo<C> {
    pub fn new(cache: C) -> Self {
        Self::with_l1_ttl(cache, None)
    }

    pub fn with_l1_ttl(cache: C, l1_ttl: Option<std::time::Duration>) -> Self {
        Self {
            cache,
            l1: TtlCache::new(l1_ttl),
        }
    }

    fn key_reference(key_bytes: &[u8]) -> Reference {
        Reference::of_contents(ReferenceFormat::default(), key_bytes, 0)
    }

    pub fn get<K: Serialize>(&self, key: &K) -> anyhow::Result<Option<Vec<u8>>> {
        let key_bytes = serialize(key)?;
        if let Some(value) = self.l1.get(&key_bytes, Instant::now()) {
            return Ok(Some(value));
        }
        let reference = Self::key_reference(&key_bytes);
        match self.cache.get(&reference)? {
            Some(value) => {
                self.l1.insert(key_bytes, value.clone(), Instant::now());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn put<K: Serialize>(&self, key: &K, value: Vec<u8>) -> anyhow::Result<()> {
        let key_bytes = serialize(key)?;
        let reference = Self::key_reference(&key_bytes);
        self.cache.put(&reference, &value)?;
        self.l1.insert(key_bytes, value, Instant::now());
        Ok(())
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        self.cache.clear()
    }
}

fn serialize<K: Serialize>(key: &K) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(key, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use skybuild_store::MemoryCache;

    #[derive(Serialize, Deserialize, Clone)]
    enum DemoKey {
        FileProperties { repo: String, path: String },
    }

    #[test]
    fn absent_key_returns_none() {
        let memo = PersistentMemo::new(MemoryCache::new());
        let key = DemoKey::FileProperties {
            repo: "r".into(),
            path: "p".into(),
        };
        assert_eq!(memo.get(&key).unwrap(), None);
    }

    #[test]
    fn put_then_get_round_trips_through_the_backing_cache() {
        let memo = PersistentMemo::new(MemoryCache::new());
        let key = DemoKey::FileProperties {
            repo: "r".into(),
            path: "p".into(),
        };
        memo.put(&key, b"value".to_vec()).unwrap();
        assert_eq!(memo.get(&key).unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let memo = PersistentMemo::new(MemoryCache::new());
        let a = DemoKey::FileProperties {
            repo: "r".into(),
            path: "a".into(),
        };
        let b = DemoKey::FileProperties {
            repo: "r".into(),
            path: "b".into(),
        };
        memo.put(&a, b"a-value".to_vec()).unwrap();
        memo.put(&b, b"b-value".to_vec()).unwrap();
        assert_eq!(memo.get(&a).unwrap(), Some(b"a-value".to_vec()));
        assert_eq!(memo.get(&b).unwrap(), Some(b"b-value".to_vec()));
    }
}
