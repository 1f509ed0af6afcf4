use skybuild_store::{Cache, ObjectStore, Reference};

use crate::value::{EncodedChild, EncodedValue, Value};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("reference index {0} is out of range for this object's outgoing references")]
    InvalidReferenceIndex(u32),
    #[error("failed to decode a referenced object: {0}")]
    Store(#[from] skybuild_store::StoreError),
    #[error("failed to deserialize an out-of-line value: {0}")]
    Deserialize(String),
}

/// Materializes a live [`Value`] from its wire form. Labels are
/// reconstructed through `make_label` rather than built in here, since
/// label syntax and canonicalization belong to the labels crate, not the
/// codec.
pub fn decode<C: Cache>(
    encoded: &EncodedValue,
    outgoing_references: &[Reference],
    store: &ObjectStore<C>,
    make_label: &impl Fn(&str) -> Value,
) -> Result<Value, DecodeError> {
    match encoded {
        EncodedValue::None => Ok(Value::None),
        EncodedValue::Bool(b) => Ok(Value::Bool(*b)),
        EncodedValue::Int(i) => Ok(Value::Int(*i)),
        EncodedValue::Str(s) => Ok(Value::str(s.clone())),
        EncodedValue::Label(s) => Ok(make_label(s)),
        EncodedValue::NeedsCode { name } => Ok(Value::Function { name: name.as_str().into() }),
        EncodedValue::List(children) => {
            let mut items = Vec::with_capacity(children.len());
            for child in children {
                items.push(decode_child(child, outgoing_references, store, make_label)?);
            }
            Ok(Value::list(items))
        }
        EncodedValue::Dict(children) => {
            let mut items = Vec::with_capacity(children.len());
            for (k, v) in children {
                let key = decode_child(k, outgoing_references, store, make_label)?;
                let value = decode_child(v, outgoing_references, store, make_label)?;
                items.push((key, value));
            }
            Ok(Value::dict(items))
        }
        EncodedValue::Struct(fields) => {
            let mut items = Vec::with_capacity(fields.len());
            for (name, v) in fields {
                items.push((
                    name.clone(),
                    decode_child(v, outgoing_references, store, make_label)?,
                ));
            }
            Ok(Value::strukt(items))
        }
    }
}

fn decode_child<C: Cache>(
    child: &EncodedChild,
    outgoing_references: &[Reference],
    store: &ObjectStore<C>,
    make_label: &impl Fn(&str) -> Value,
) -> Result<Value, DecodeError> {
    match child {
        EncodedChild::Inline(value) => decode(value, outgoing_references, store, make_label),
        EncodedChild::OutOfLine(index) => {
            let reference = outgoing_references
                .get(*index as usize)
                .ok_or(DecodeError::InvalidReferenceIndex(*index))?;
            let object = store.download(reference)?;
            let encoded: EncodedValue = ciborium::de::from_reader(object.body())
                .map_err(|e| DecodeError::Deserialize(e.to_string()))?;
            decode(&encoded, object.outgoing_references(), store, make_label)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use skybuild_store::MemoryCache;

    fn label_factory(s: &str) -> Value {
        Value::label(s.to_owned())
    }

    #[test]
    fn round_trips_a_small_struct() {
        let store = ObjectStore::new(MemoryCache::new());
        let value = Value::strukt(vec![
            ("name".to_owned(), Value::str("widget")),
            ("count".to_owned(), Value::Int(3)),
        ]);
        let encoded = encode(&value).unwrap();
        let references = encoded.patched.patcher.commit(&store).unwrap();
        let decoded = decode(&encoded.patched.message, &references, &store, &label_factory).unwrap();
        match decoded {
            Value::Struct(fields) => assert_eq!(fields.len(), 2),
            _ => panic!("expected a struct"),
        }
    }

    #[test]
    fn round_trips_an_out_of_line_child() {
        let store = ObjectStore::new(MemoryCache::new());
        let big_string = "y".repeat(skybuild_store::OBJECT_MINIMUM_SIZE_BYTES + 10);
        let value = Value::list(vec![Value::str(big_string.clone())]);
        let encoded = encode(&value).unwrap();
        let references = encoded.patched.patcher.commit(&store).unwrap();
        let decoded = decode(&encoded.patched.message, &references, &store, &label_factory).unwrap();
        match decoded {
            Value::List(items) => match &items.borrow()[0] {
                Value::Str(s) => assert_eq!(s.as_ref(), big_string),
                _ => panic!("expected a string"),
            },
            _ => panic!("expected a list"),
        }
    }
}
