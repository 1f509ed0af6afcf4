use skybuild_store::{Cache, Object, ObjectStore, Reference};

/// A reference not yet materialized: either bytes this process produced
/// (with its own nested, not-yet-committed references) or a reference to
/// an object that already exists in the store.
enum PendingChild {
    Bytes {
        body: Vec<u8>,
        children: ReferencePatcher,
    },
    Existing(Reference),
}

/// Records every outgoing reference a [`PatchedMessage`] emits while under
/// construction, together with a walker able to materialize it at commit
/// time. Merging two patched messages concatenates their patchers; the
/// caller is responsible for shifting any embedded `OutOfLine` index by
/// the length this patcher had before the merge (see
/// [`PatchedMessage::merge`]).
#[derive(Default)]
pub struct ReferencePatcher {
    pending: Vec<PendingChild>,
}

impl ReferencePatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Registers a not-yet-stored child, returning the index it will
    /// receive in the committed object's outgoing-reference list.
    pub fn push_bytes(&mut self, body: Vec<u8>, children: ReferencePatcher) -> u32 {
        self.pending.push(PendingChild::Bytes { body, children });
        (self.pending.len() - 1) as u32
    }

    /// Registers a reference to an object that is already present in the
    /// store (forwarding an existing-object placeholder).
    pub fn push_existing(&mut self, reference: Reference) -> u32 {
        self.pending.push(PendingChild::Existing(reference));
        (self.pending.len() - 1) as u32
    }

    pub(crate) fn append(&mut self, other: ReferencePatcher) {
        self.pending.extend(other.pending);
    }

    /// Materializes every pending child (recursively committing nested
    /// patchers first) and returns the flat, ordered reference list the
    /// enclosing object should be stored with.
    pub fn commit<C: Cache>(self, store: &ObjectStore<C>) -> anyhow::Result<Vec<Reference>> {
        let mut references = Vec::with_capacity(self.pending.len());
        for child in self.pending {
            let reference = match child {
                PendingChild::Existing(reference) => reference,
                PendingChild::Bytes { body, children } => {
                    let child_references = children.commit(store)?;
                    store
                        .upload(Object::new(body, child_references))
                        .map_err(|e| anyhow::anyhow!(e.to_string()))?
                }
            };
            references.push(reference);
        }
        Ok(references)
    }
}

/// A message under construction, paired with the [`ReferencePatcher`]
/// that records every reference it emits.
pub struct PatchedMessage<M> {
    pub message: M,
    pub patcher: ReferencePatcher,
}

impl<M> PatchedMessage<M> {
    pub fn new(message: M) -> Self {
        Self {
            message,
            patcher: ReferencePatcher::new(),
        }
    }

    pub fn new_with_patcher(message: M, patcher: ReferencePatcher) -> Self {
        Self { message, patcher }
    }

    /// Merges `other` into `self`. `reindex` is applied to `other`'s
    /// message with the offset `self`'s patcher occupied before the
    /// merge, so that any `OutOfLine` indices it carries keep pointing at
    /// the right entry once the two reference tables are concatenated.
    /// `combine` then produces the merged message.
    pub fn merge(
        mut self,
        mut other: PatchedMessage<M>,
        reindex: impl FnOnce(&mut M, u32),
        combine: impl FnOnce(M, M) -> M,
    ) -> Self {
        let offset = self.patcher.len() as u32;
        reindex(&mut other.message, offset);
        self.patcher.append(other.patcher);
        PatchedMessage {
            message: combine(self.message, other.message),
            patcher: self.patcher,
        }
    }
}
