//! The tree-shaped value that crosses the codec boundary.
//!
//! Logical requests are lowered to a [`Value`] before encoding, and every
//! decoded response is a [`Value`] until a facade operation narrows it to a
//! typed response. Maps are keyed by text and kept sorted so two equal trees
//! always encode to the same bytes.

use std::collections::BTreeMap;

use crate::identifiers::Blob;

/// A self-describing tree value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An unsigned integer.
    Nat(u64),
    /// A negative integer. Build it with [`Value::integer`]; the codec refuses
    /// to encode a non-negative `Int`, since it would decode as [`Value::Nat`].
    Int(i64),
    /// A byte string.
    Bytes(Vec<u8>),
    /// A UTF-8 text string.
    Text(String),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A text-keyed map.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a [`Value::Map`] from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a [`Value::Int`] or [`Value::Nat`] depending on the sign.
    pub fn integer(n: i64) -> Self {
        match u64::try_from(n) {
            Ok(nat) => Value::Nat(nat),
            Err(_) => Value::Int(n),
        }
    }

    /// Returns the entry stored under `key`, if this is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the unsigned integer, if this is a [`Value::Nat`].
    pub fn as_nat(&self) -> Option<u64> {
        match self {
            Value::Nat(n) => Some(*n),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Nat(_) => "nat",
            Value::Int(_) => "int",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Nat(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&Blob> for Value {
    fn from(blob: &Blob) -> Self {
        Value::Bytes(blob.as_slice().to_vec())
    }
}
