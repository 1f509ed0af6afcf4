use crate::object::Object;
use crate::reference::{Reference, ReferenceFormat, OBJECT_MAXIMUM_SIZE_BYTES};
use crate::rocksdb_cache::Cache;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object {0} not found in store")]
    NotFound(Reference),
    #[error("object {0} exceeds the maximum object size")]
    TooLarge(Reference),
    #[error("failed to decode stored object {0}: {1}")]
    Decode(Reference, String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// On-disk framing for an [`Object`]: a reference count followed by that
/// many fixed-width reference encodings, followed by the raw body.
fn encode_object(object: &Object) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(object.degree() as u32).to_be_bytes());
    for reference in object.outgoing_references() {
        let bytes = reference.to_key_bytes();
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&bytes);
    }
    out.extend_from_slice(object.body());
    out
}

fn decode_object(bytes: &[u8]) -> Result<Object, String> {
    if bytes.len() < 4 {
        return Err("truncated object header".to_owned());
    }
    let degree = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let mut offset = 4;
    let mut references = Vec::with_capacity(degree);
    for _ in 0..degree {
        if bytes.len() < offset + 4 {
            return Err("truncated reference length".to_owned());
        }
        let len = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        if bytes.len() < offset + len {
            return Err("truncated reference bytes".to_owned());
        }
        let reference = Reference::from_key_bytes(&bytes[offset..offset + len])
            .map_err(|e| format!("{e}"))?;
        references.push(reference);
        offset += len;
    }
    Ok(Object::new(bytes[offset..].to_vec(), references))
}

/// The object-store client: `download`/`upload` keyed by content address,
/// backed by any [`Cache`] implementation (RocksDB in production, an
/// in-memory map in tests).
pub struct ObjectStore<C> {
    cache: C,
    format: ReferenceFormat,
}

impl<C: Cache> ObjectStore<C> {
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            format: ReferenceFormat::default(),
        }
    }

    pub fn download(&self, reference: &Reference) -> Result<Object, StoreError> {
        let bytes = self
            .cache
            .get(reference)
            .map_err(StoreError::Transport)?
            .ok_or_else(|| StoreError::NotFound(*reference))?;
        decode_object(&bytes).map_err(|e| StoreError::Decode(*reference, e))
    }

    /// Uploads an object, returning the reference it was minted under.
    pub fn upload(&self, object: Object) -> Result<Reference, StoreError> {
        let encoded = encode_object(&object);
        if encoded.len() > OBJECT_MAXIMUM_SIZE_BYTES {
            let reference = Reference::of_contents(self.format, object.body(), object.degree());
            return Err(StoreError::TooLarge(reference));
        }
        let reference = Reference::of_contents(self.format, object.body(), object.degree());
        self.cache
            .put(&reference, &encoded)
            .map_err(StoreError::Transport)?;
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCache;

    #[test]
    fn upload_then_download_round_trips() {
        let store = ObjectStore::new(MemoryCache::new());
        let object = Object::new(b"payload".to_vec(), vec![]);
        let reference = store.upload(object.clone()).unwrap();
        let downloaded = store.download(&reference).unwrap();
        assert_eq!(downloaded, object);
    }

    #[test]
    fn download_of_unknown_reference_is_not_found() {
        let store = ObjectStore::new(MemoryCache::new());
        let bogus = Reference::of_contents(ReferenceFormat::default(), b"nope", 0);
        assert!(matches!(store.download(&bogus), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn outgoing_references_survive_the_round_trip() {
        let store = ObjectStore::new(MemoryCache::new());
        let child = store.upload(Object::new(b"child".to_vec(), vec![])).unwrap();
        let parent = Object::new(b"parent".to_vec(), vec![child]);
        let reference = store.upload(parent).unwrap();
        let downloaded = store.download(&reference).unwrap();
        assert_eq!(downloaded.outgoing_references(), &[child]);
    }
}
