use crate::reference::Reference;

/// An immutable blob: a body plus its ordered list of outgoing references.
/// The body may be an encoded message, raw bytes, or a file-tree node;
/// this crate treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    body: Vec<u8>,
    outgoing_references: Vec<Reference>,
}

impl Object {
    pub fn new(body: Vec<u8>, outgoing_references: Vec<Reference>) -> Self {
        Self {
            body,
            outgoing_references,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn outgoing_references(&self) -> &[Reference] {
        &self.outgoing_references
    }

    /// The degree of this object: the number of outgoing references.
    pub fn degree(&self) -> usize {
        self.outgoing_references.len()
    }
}

/// An object that has been decoded into a typed message `M`, together with
/// its outgoing-reference list preserved in order. Reference indices
/// embedded in `M`'s fields are resolved against this list, never inlined.
#[derive(Debug, Clone)]
pub struct ParsedObject<M> {
    pub message: M,
    pub outgoing_references: Vec<Reference>,
}

impl<M> ParsedObject<M> {
    pub fn new(message: M, outgoing_references: Vec<Reference>) -> Self {
        Self {
            message,
            outgoing_references,
        }
    }

    /// Look up an outgoing reference by the index a message field stored.
    /// Returns `None` when the index is out of `[0, degree)`, the
    /// `InvalidInput` condition spec.md calls out for reference indices.
    pub fn get_outgoing_reference(&self, index: usize) -> Option<&Reference> {
        self.outgoing_references.get(index)
    }

    pub fn map<N>(self, f: impl FnOnce(M) -> N) -> ParsedObject<N> {
        ParsedObject {
            message: f(self.message),
            outgoing_references: self.outgoing_references,
        }
    }
}
