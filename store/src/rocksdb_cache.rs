use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rocksdb::{DBCompressionType, Options, DB};

use crate::reference::Reference;

/// A content-addressed byte store: `put`/`get` keyed by [`Reference`].
/// Implementations never need to verify the digest on write — the caller
/// minted the reference from the same bytes — but `get` callers should
/// treat a present-but-wrong-length value as store corruption.
pub trait Cache {
    fn put(&self, reference: &Reference, value: &[u8]) -> anyhow::Result<()>;
    fn get(&self, reference: &Reference) -> anyhow::Result<Option<Vec<u8>>>;
    fn clear(&self) -> anyhow::Result<()>;
}

fn open_database(path: &Path, ttl: Duration) -> anyhow::Result<DB> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.increase_parallelism(num_cpus());
    opts.set_max_open_files(512);
    opts.set_compression_type(DBCompressionType::Lz4);
    opts.set_bottommost_compression_type(DBCompressionType::Zstd);
    DB::open_with_ttl(&opts, path, ttl).with_context(|| format!("opening rocksdb at {}", path.display()))
}

fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(1)
}

/// A RocksDB-backed [`Cache`]. Entries are given a TTL so that a long-lived
/// daemon's store does not grow without bound; a `ttl` of zero disables
/// expiry.
pub struct RocksDbCache {
    db: RefCell<Option<DB>>,
    ttl: Duration,
}

impl RocksDbCache {
    pub fn open_with_ttl(path: impl AsRef<Path>, ttl: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            db: RefCell::new(Some(open_database(path.as_ref(), ttl)?)),
            ttl,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::open_with_ttl(path, Duration::from_secs(0))
    }
}

impl Cache for RocksDbCache {
    fn put(&self, reference: &Reference, value: &[u8]) -> anyhow::Result<()> {
        let key = reference.to_key_bytes();
        self.db
            .borrow()
            .as_ref()
            .expect("database handle is only taken during clear()")
            .put(&key, value)
            .with_context(|| format!("putting object {} failed", reference))
    }

    fn get(&self, reference: &Reference) -> anyhow::Result<Option<Vec<u8>>> {
        let key = reference.to_key_bytes();
        self.db
            .borrow()
            .as_ref()
            .expect("database handle is only taken during clear()")
            .get(&key)
            .with_context(|| format!("getting object {} failed", reference))
    }

    fn clear(&self) -> anyhow::Result<()> {
        let path: PathBuf = self
            .db
            .borrow()
            .as_ref()
            .expect("database handle is only taken during clear()")
            .path()
            .to_path_buf();
        {
            let db = self.db.borrow_mut().take().unwrap();
            drop(db);
        }
        DB::destroy(&Options::default(), &path)?;
        *self.db.borrow_mut() = Some(open_database(&path, self.ttl)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceFormat;
    use tempfile::tempdir;

    fn ref_for(body: &[u8]) -> Reference {
        Reference::of_contents(ReferenceFormat::default(), body, 0)
    }

    #[test]
    fn put_then_get_round_trips() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let cache = RocksDbCache::open(dir.path().join("db"))?;
        let reference = ref_for(b"hello");
        cache.put(&reference, b"hello")?;
        assert_eq!(cache.get(&reference)?.unwrap(), b"hello".to_vec());
        Ok(())
    }

    #[test]
    fn missing_key_returns_none() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let cache = RocksDbCache::open(dir.path().join("db"))?;
        assert_eq!(cache.get(&ref_for(b"absent"))?, None);
        Ok(())
    }

    #[test]
    fn clear_empties_the_store() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let cache = RocksDbCache::open(dir.path().join("db"))?;
        let reference = ref_for(b"hello");
        cache.put(&reference, b"hello")?;
        cache.clear()?;
        assert_eq!(cache.get(&reference)?, None);
        Ok(())
    }

    #[test]
    fn entries_expire_after_ttl() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let cache = RocksDbCache::open_with_ttl(dir.path().join("db"), Duration::from_secs(1))?;
        let reference = ref_for(b"hello");
        cache.put(&reference, b"hello")?;
        std::thread::sleep(Duration::from_secs(2));
        // RocksDB's TTL compaction is lazy; force it before asserting absence.
        if let Some(db) = cache.db.borrow().as_ref() {
            db.compact_range(None::<&[u8]>, None::<&[u8]>);
        }
        assert_eq!(cache.get(&reference)?, None);
        Ok(())
    }
}
