use std::collections::HashSet;

use skybuild_store::{OBJECT_MAXIMUM_SIZE_BYTES, OBJECT_MINIMUM_SIZE_BYTES};

use crate::patcher::{PatchedMessage, ReferencePatcher};
use crate::value::{EncodedChild, EncodedValue, Value};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("cycle detected while encoding a value")]
    Cycle,
    #[error("value of {0} bytes exceeds the maximum object size")]
    TooLarge(usize),
    #[error("failed to serialize an intermediate value: {0}")]
    Serialize(String),
}

pub struct EncodeResult {
    pub patched: PatchedMessage<EncodedValue>,
    /// Set when the tree contains a function, rule, or provider instance
    /// that can only be reconstructed with the originating compiled
    /// program.
    pub needs_code: bool,
}

/// Encodes a live [`Value`] into its wire form, applying the inlined-tree
/// size policy at every container boundary and rejecting reference
/// cycles.
pub fn encode(value: &Value) -> Result<EncodeResult, EncodeError> {
    let mut path = HashSet::new();
    encode_inner(value, &mut path)
}

fn encode_inner(value: &Value, path: &mut HashSet<usize>) -> Result<EncodeResult, EncodeError> {
    match value {
        Value::None => Ok(leaf(EncodedValue::None)),
        Value::Bool(b) => Ok(leaf(EncodedValue::Bool(*b))),
        Value::Int(i) => Ok(leaf(EncodedValue::Int(*i))),
        Value::Str(s) => Ok(leaf(EncodedValue::Str(s.to_string()))),
        Value::Label(s) => Ok(leaf(EncodedValue::Label(s.to_string()))),
        Value::Function { name } => Ok(EncodeResult {
            patched: PatchedMessage::new(EncodedValue::NeedsCode {
                name: name.to_string(),
            }),
            needs_code: true,
        }),
        Value::List(items) => {
            with_cycle_guard(value, path, |path| {
                let mut patcher = ReferencePatcher::new();
                let mut needs_code = false;
                let mut children = Vec::new();
                for item in items.borrow().iter() {
                    let encoded = encode_inner(item, path)?;
                    needs_code |= encoded.needs_code;
                    children.push(embed_child(&mut patcher, encoded.patched)?);
                }
                Ok(EncodeResult {
                    patched: PatchedMessage::new_with_patcher(
                        EncodedValue::List(children),
                        patcher,
                    ),
                    needs_code,
                })
            })
        }
        Value::Dict(items) => {
            with_cycle_guard(value, path, |path| {
                let mut patcher = ReferencePatcher::new();
                let mut needs_code = false;
                let mut children = Vec::new();
                for (k, v) in items.borrow().iter() {
                    let encoded_key = encode_inner(k, path)?;
                    needs_code |= encoded_key.needs_code;
                    let key_child = embed_child(&mut patcher, encoded_key.patched)?;
                    let encoded_value = encode_inner(v, path)?;
                    needs_code |= encoded_value.needs_code;
                    let value_child = embed_child(&mut patcher, encoded_value.patched)?;
                    children.push((key_child, value_child));
                }
                Ok(EncodeResult {
                    patched: PatchedMessage::new_with_patcher(
                        EncodedValue::Dict(children),
                        patcher,
                    ),
                    needs_code,
                })
            })
        }
        Value::Struct(fields) => {
            let mut patcher = ReferencePatcher::new();
            let mut needs_code = false;
            let mut children = Vec::new();
            for (name, v) in fields.iter() {
                let encoded = encode_inner(v, path)?;
                needs_code |= encoded.needs_code;
                children.push((name.clone(), embed_child(&mut patcher, encoded.patched)?));
            }
            Ok(EncodeResult {
                patched: PatchedMessage::new_with_patcher(
                    EncodedValue::Struct(children),
                    patcher,
                ),
                needs_code,
            })
        }
    }
}

fn leaf(value: EncodedValue) -> EncodeResult {
    EncodeResult {
        patched: PatchedMessage::new(value),
        needs_code: false,
    }
}

fn with_cycle_guard<T>(
    value: &Value,
    path: &mut HashSet<usize>,
    f: impl FnOnce(&mut HashSet<usize>) -> Result<T, EncodeError>,
) -> Result<T, EncodeError> {
    match value.identity() {
        Some(id) => {
            if !path.insert(id) {
                return Err(EncodeError::Cycle);
            }
            let result = f(path);
            path.remove(&id);
            result
        }
        None => f(path),
    }
}

/// Decides, at this container boundary, whether the already-encoded
/// `child` should be inlined or pushed out to its own object. Either way
/// any reference table the child accumulated is folded into `patcher`,
/// with embedded `OutOfLine` indices shifted to account for entries
/// `patcher` already holds.
fn embed_child(
    patcher: &mut ReferencePatcher,
    child: PatchedMessage<EncodedValue>,
) -> Result<EncodedChild, EncodeError> {
    let serialized = serialize(&child.message)?;
    if serialized.len() > OBJECT_MINIMUM_SIZE_BYTES {
        if serialized.len() > OBJECT_MAXIMUM_SIZE_BYTES {
            return Err(EncodeError::TooLarge(serialized.len()));
        }
        let index = patcher.push_bytes(serialized, child.patcher);
        return Ok(EncodedChild::OutOfLine(index));
    }

    let offset = patcher.len() as u32;
    let mut message = child.message;
    reindex(&mut message, offset);
    patcher.append(child.patcher);
    Ok(EncodedChild::Inline(Box::new(message)))
}

fn serialize(value: &EncodedValue) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|e| EncodeError::Serialize(e.to_string()))?;
    Ok(out)
}

fn reindex(value: &mut EncodedValue, offset: u32) {
    match value {
        EncodedValue::List(children) => {
            for child in children {
                reindex_child(child, offset);
            }
        }
        EncodedValue::Dict(children) => {
            for (k, v) in children {
                reindex_child(k, offset);
                reindex_child(v, offset);
            }
        }
        EncodedValue::Struct(fields) => {
            for (_, v) in fields {
                reindex_child(v, offset);
            }
        }
        EncodedValue::None
        | EncodedValue::Bool(_)
        | EncodedValue::Int(_)
        | EncodedValue::Str(_)
        | EncodedValue::Label(_)
        | EncodedValue::NeedsCode { .. } => {}
    }
}

fn reindex_child(child: &mut EncodedChild, offset: u32) {
    match child {
        EncodedChild::OutOfLine(index) => *index += offset,
        EncodedChild::Inline(value) => reindex(value, offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_stay_inline() {
        let value = Value::list(vec![Value::Int(1), Value::str("hi")]);
        let result = encode(&value).unwrap();
        assert!(result.patched.patcher.is_empty());
        assert!(!result.needs_code);
    }

    #[test]
    fn self_referential_list_is_a_cycle() {
        let list = Value::list(vec![]);
        if let Value::List(rc) = &list {
            rc.borrow_mut().push(list.clone());
        }
        assert!(matches!(encode(&list), Err(EncodeError::Cycle)));
    }

    #[test]
    fn large_child_is_pushed_out_of_line() {
        let big_string = "x".repeat(OBJECT_MINIMUM_SIZE_BYTES + 1);
        let value = Value::list(vec![Value::str(big_string)]);
        let result = encode(&value).unwrap();
        assert_eq!(result.patched.patcher.len(), 1);
        match &result.patched.message {
            EncodedValue::List(children) => {
                assert!(matches!(children[0], EncodedChild::OutOfLine(0)));
            }
            _ => panic!("expected a list"),
        }
    }

    #[test]
    fn function_values_require_code() {
        let value = Value::Function {
            name: "my_rule".into(),
        };
        let result = encode(&value).unwrap();
        assert!(result.needs_code);
    }
}
