use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_utils::sync::ShardedLock;
use tracing::debug;

/// An in-memory, sharded-lock-guarded TTL cache. Used as the fast L1 in
/// front of a [`crate::memo::PersistentMemo`]'s on-disk store, so that a
/// key re-evaluated within one run doesn't round-trip through RocksDB.
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    entries: ShardedLock<HashMap<K, (V, Instant)>>,
    ttl: Option<Duration>,
    last_scavenge: Mutex<Instant>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: ShardedLock::new(HashMap::new()),
            ttl,
            last_scavenge: Mutex::new(Instant::now()),
        }
    }

    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        let mut evict = false;
        if let Ok(reader) = self.entries.read() {
            if let Some((val, expiry)) = reader.get(key) {
                if self.ttl.is_none() || *expiry > now {
                    return Some(val.clone());
                }
                evict = true;
            }
        }
        if evict {
            if let Ok(mut writer) = self.entries.write() {
                writer.remove(key);
            }
        }
        None
    }

    pub fn insert(&self, key: K, value: V, now: Instant) {
        let expiry = now
            .checked_add(self.ttl.unwrap_or(Duration::from_nanos(0)))
            .expect("calculating TTL overflowed");
        self.scavenge(now);
        if let Ok(mut writer) = self.entries.write() {
            writer.insert(key, (value, expiry));
        }
    }

    fn scavenge(&self, now: Instant) {
        let Some(ttl) = self.ttl else {
            return;
        };
        let Ok(mut scavenge_lock) = self.last_scavenge.try_lock() else {
            return;
        };
        if now
            .checked_duration_since(*scavenge_lock)
            .map(|dur| dur < ttl)
            .unwrap_or(false)
        {
            return;
        }

        let mut marked = Vec::new();
        if let Ok(reader) = self.entries.read() {
            marked.extend(
                reader
                    .iter()
                    .filter(|(_, (_, expiry))| *expiry < now)
                    .map(|(k, _)| k.clone()),
            );
        }

        if let Ok(mut writer) = self.entries.write() {
            let mut removed = 0;
            for key in &marked {
                if writer.get(key).is_some_and(|(_, expiry)| *expiry < now) {
                    writer.remove(key);
                    removed += 1;
                }
            }
            debug!(removed, marked = marked.len(), "scavenged expired cache entries");
        }

        *scavenge_lock = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_for_absent_key() {
        let cache: TtlCache<&str, i32> = TtlCache::new(None);
        assert_eq!(cache.get(&"missing", Instant::now()), None);
    }

    #[test]
    fn insert_then_get_round_trips_without_ttl() {
        let cache = TtlCache::new(None);
        let now = Instant::now();
        cache.insert("a", 1, now);
        assert_eq!(cache.get(&"a", now), Some(1));
    }

    #[test]
    fn entries_expire_after_their_ttl() {
        let cache = TtlCache::new(Some(Duration::from_millis(10)));
        let now = Instant::now();
        cache.insert("a", 1, now);
        let later = now + Duration::from_millis(20);
        assert_eq!(cache.get(&"a", later), None);
    }
}
