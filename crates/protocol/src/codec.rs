//! Wire codec: [`Value`] to bytes and back.
//!
//! The [`Codec`] trait is the boundary between the agent and the binary
//! envelope format. [`CborCodec`] is the default: definite-length CBOR,
//! prefixed with the self-describe tag (55799) on encode, tag optional on
//! decode.

use std::convert::Infallible;

use minicbor::data::{Tag, Type};
use minicbor::{Decoder, Encoder};

use crate::errors::AgentError;
use crate::value::Value;

/// CBOR self-describe tag, written in front of every encoded body.
pub const SELF_DESCRIBE_TAG: u64 = 55799;

/// Nesting limit for decoded values.
const MAX_DEPTH: usize = 64;

/// Serializes a [`Value`] tree to bytes and back.
///
/// Implementations must round-trip: `decode(&encode(v)?)? == v` for every
/// representable `v`.
pub trait Codec: Send + Sync {
    /// Content type declared for encoded bodies.
    fn content_type(&self) -> &'static str;

    /// Encodes a value to bytes.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, AgentError>;

    /// Decodes bytes to a value.
    fn decode(&self, bytes: &[u8]) -> Result<Value, AgentError>;
}

/// The default CBOR codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl CborCodec {
    /// Content type for CBOR bodies.
    pub const CONTENT_TYPE: &'static str = "application/cbor";
}

impl Codec for CborCodec {
    fn content_type(&self) -> &'static str {
        Self::CONTENT_TYPE
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, AgentError> {
        let mut enc = Encoder::new(Vec::new());
        enc.tag(Tag::new(SELF_DESCRIBE_TAG)).map_err(encode_error)?;
        encode_value(&mut enc, value)?;
        Ok(enc.into_writer())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, AgentError> {
        let mut dec = Decoder::new(bytes);
        let value = decode_value(&mut dec, 0)?;
        if dec.position() != bytes.len() {
            return Err(AgentError::decode(format!(
                "{} trailing bytes after value",
                bytes.len() - dec.position()
            )));
        }
        Ok(value)
    }
}

fn encode_error(err: minicbor::encode::Error<Infallible>) -> AgentError {
    AgentError::Encode {
        message: err.to_string(),
    }
}

fn decode_error(err: minicbor::decode::Error) -> AgentError {
    AgentError::decode(err.to_string())
}

fn encode_value(enc: &mut Encoder<Vec<u8>>, value: &Value) -> Result<(), AgentError> {
    match value {
        Value::Null => {
            enc.null().map_err(encode_error)?;
        }
        Value::Bool(b) => {
            enc.bool(*b).map_err(encode_error)?;
        }
        Value::Nat(n) => {
            enc.u64(*n).map_err(encode_error)?;
        }
        // A non-negative Int would come back as Nat.
        Value::Int(n) if *n >= 0 => {
            return Err(AgentError::Encode {
                message: format!("non-negative integer {n} must be a Nat"),
            });
        }
        Value::Int(n) => {
            enc.i64(*n).map_err(encode_error)?;
        }
        Value::Bytes(b) => {
            enc.bytes(b).map_err(encode_error)?;
        }
        Value::Text(s) => {
            enc.str(s).map_err(encode_error)?;
        }
        Value::Array(items) => {
            enc.array(items.len() as u64).map_err(encode_error)?;
            for item in items {
                encode_value(enc, item)?;
            }
        }
        Value::Map(entries) => {
            enc.map(entries.len() as u64).map_err(encode_error)?;
            for (key, item) in entries {
                enc.str(key).map_err(encode_error)?;
                encode_value(enc, item)?;
            }
        }
    }
    Ok(())
}

fn decode_value(dec: &mut Decoder<'_>, depth: usize) -> Result<Value, AgentError> {
    if depth > MAX_DEPTH {
        return Err(AgentError::decode(format!(
            "nesting deeper than {MAX_DEPTH} levels"
        )));
    }
    let ty = dec.datatype().map_err(decode_error)?;
    let value = match ty {
        Type::Null => {
            dec.null().map_err(decode_error)?;
            Value::Null
        }
        Type::Bool => Value::Bool(dec.bool().map_err(decode_error)?),
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
            Value::Nat(dec.u64().map_err(decode_error)?)
        }
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => {
            Value::integer(dec.i64().map_err(decode_error)?)
        }
        Type::Bytes => Value::Bytes(dec.bytes().map_err(decode_error)?.to_vec()),
        Type::String => Value::Text(dec.str().map_err(decode_error)?.to_owned()),
        Type::Array => {
            let len = definite(dec.array().map_err(decode_error)?)?;
            let mut items = Vec::new();
            for _ in 0..len {
                items.push(decode_value(dec, depth + 1)?);
            }
            Value::Array(items)
        }
        Type::Map => {
            let len = definite(dec.map().map_err(decode_error)?)?;
            let mut entries = std::collections::BTreeMap::new();
            for _ in 0..len {
                let key = match dec.datatype().map_err(decode_error)? {
                    Type::String => dec.str().map_err(decode_error)?.to_owned(),
                    other => {
                        return Err(AgentError::decode(format!(
                            "map keys must be text, found {other}"
                        )))
                    }
                };
                let item = decode_value(dec, depth + 1)?;
                if entries.contains_key(&key) {
                    return Err(AgentError::decode(format!("duplicate map key '{key}'")));
                }
                entries.insert(key, item);
            }
            Value::Map(entries)
        }
        Type::Tag => {
            let tag = dec.tag().map_err(decode_error)?;
            if tag.as_u64() != SELF_DESCRIBE_TAG {
                return Err(AgentError::decode(format!(
                    "unsupported tag {}",
                    tag.as_u64()
                )));
            }
            decode_value(dec, depth + 1)?
        }
        Type::ArrayIndef | Type::MapIndef | Type::BytesIndef | Type::StringIndef => {
            return Err(AgentError::decode("indefinite-length items are not supported"));
        }
        other => {
            return Err(AgentError::decode(format!("unsupported item type {other}")));
        }
    };
    Ok(value)
}

fn definite(len: Option<u64>) -> Result<u64, AgentError> {
    len.ok_or_else(|| AgentError::decode("indefinite-length items are not supported"))
}
