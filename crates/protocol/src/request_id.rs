//! Representation-independent request identifiers.
//!
//! The identifier of a request is a SHA-256 over its fields, independent of
//! how the fields happen to be encoded on the wire:
//!
//! 1. For every field, hash the key and hash the value
//!    (text → UTF-8 bytes, bytes → as is, nat → unsigned LEB128,
//!    int → signed LEB128, array → concatenation of element hashes,
//!    map → the map's own identifier).
//! 2. Concatenate each key hash with its value hash.
//! 3. Sort the concatenations, join them, and hash the result.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::errors::AgentError;
use crate::identifiers::RequestId;
use crate::ports::RequestIdDeriver;
use crate::types::SubmitRequest;
use crate::value::Value;

/// Computes the identifier of a map value.
///
/// Fails for non-map input and for `null`/`bool` fields, which have no hash
/// representation.
pub fn request_id_of(value: &Value) -> Result<RequestId, AgentError> {
    let Value::Map(entries) = value else {
        return Err(AgentError::RequestId {
            message: format!("expected a map, found {}", value.kind()),
        });
    };

    let mut fields = entries
        .iter()
        .map(|(key, field)| {
            let mut pair = Vec::with_capacity(64);
            pair.extend_from_slice(&sha256(key.as_bytes()));
            pair.extend_from_slice(&hash_value(key, field)?);
            Ok(pair)
        })
        .collect::<Result<Vec<_>, AgentError>>()?;
    fields.sort();

    let mut hasher = Sha256::new();
    for pair in &fields {
        hasher.update(pair);
    }
    Ok(RequestId::new(&hasher.finalize().into()))
}

fn hash_value(key: &str, value: &Value) -> Result<[u8; 32], AgentError> {
    match value {
        Value::Text(s) => Ok(sha256(s.as_bytes())),
        Value::Bytes(b) => Ok(sha256(b)),
        Value::Nat(n) => Ok(sha256(&leb128_unsigned(*n))),
        Value::Int(n) => Ok(sha256(&leb128_signed(*n))),
        Value::Array(items) => {
            let mut hasher = Sha256::new();
            for item in items {
                hasher.update(hash_value(key, item)?);
            }
            Ok(hasher.finalize().into())
        }
        Value::Map(_) => request_id_of(value).map(|id| *id.as_bytes()),
        Value::Null | Value::Bool(_) => Err(AgentError::RequestId {
            message: format!("field '{key}' has unhashable {} value", value.kind()),
        }),
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn leb128_unsigned(mut n: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn leb128_signed(mut n: i64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        let done = (n == 0 && byte & 0x40 == 0) || (n == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// The default [`RequestIdDeriver`]: [`request_id_of`] over the request's wire map.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256RequestIdDeriver;

#[async_trait]
impl RequestIdDeriver for Sha256RequestIdDeriver {
    async fn derive(&self, request: &SubmitRequest) -> Result<RequestId, AgentError> {
        let id = request_id_of(&request.to_value())?;
        trace!(request_type = request.request_type().as_str(), %id, "derived request id");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{Blob, CanisterId};
    use crate::types::CallFields;

    fn call(arg: &[u8]) -> SubmitRequest {
        SubmitRequest::call(
            CanisterId::new(vec![0, 0, 0, 0, 0, 0, 4, 210]),
            CallFields {
                method_name: "hello".into(),
                arg: Blob::new(arg.to_vec()),
            },
        )
    }

    #[test]
    fn leb128_matches_reference_encodings() {
        assert_eq!(leb128_unsigned(0), vec![0x00]);
        assert_eq!(leb128_unsigned(624_485), vec![0xe5, 0x8e, 0x26]);
        assert_eq!(leb128_signed(-1), vec![0x7f]);
        assert_eq!(leb128_signed(-123_456), vec![0xc0, 0xbb, 0x78]);
        assert_eq!(leb128_signed(63), vec![0x3f]);
        assert_eq!(leb128_signed(64), vec![0xc0, 0x00]);
    }

    #[test]
    fn single_field_hash_matches_definition() {
        let value = Value::map([("a", Value::from("b"))]);
        let mut pair = sha256(b"a").to_vec();
        pair.extend_from_slice(&sha256(b"b"));
        let expected = sha256(&pair);
        assert_eq!(request_id_of(&value).unwrap().as_bytes(), &expected);
    }

    #[test]
    fn field_order_does_not_matter() {
        // BTreeMap already sorts keys; hash pairs sort independently of key order.
        let a = Value::map([("z", Value::Nat(1)), ("a", Value::Nat(2))]);
        let b = Value::map([("a", Value::Nat(2)), ("z", Value::Nat(1))]);
        assert_eq!(request_id_of(&a).unwrap(), request_id_of(&b).unwrap());
    }

    #[tokio::test]
    async fn identical_calls_share_an_id() {
        let deriver = Sha256RequestIdDeriver;
        let first = deriver.derive(&call(b"DIDL\x00\xfd*")).await.unwrap();
        let second = deriver.derive(&call(b"DIDL\x00\xfd*")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn different_args_give_different_ids() {
        let deriver = Sha256RequestIdDeriver;
        let first = deriver.derive(&call(b"one")).await.unwrap();
        let second = deriver.derive(&call(b"two")).await.unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn unhashable_fields_fail() {
        let err = request_id_of(&Value::map([("flag", Value::Bool(true))])).unwrap_err();
        assert!(matches!(err, AgentError::RequestId { .. }));
        assert!(request_id_of(&Value::Nat(1)).is_err());
    }
}
