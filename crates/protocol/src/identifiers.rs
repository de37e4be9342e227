//! Newtype identifiers.
//!
//! Every byte string with a protocol meaning is represented as a distinct
//! newtype. This prevents accidentally passing — for example — a method
//! argument [`Blob`] where a [`CanisterId`] is expected, even though both are
//! raw bytes under the hood.
//!
//! All identifiers render as lowercase hex and parse back from hex.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for Vec<u8>-wrapped newtypes.
// Generates: struct, new(), as_slice(), into_vec(), From<Vec<u8>>, hex Display/FromStr.
// ---------------------------------------------------------------------------
macro_rules! bytes_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Creates a new value from raw bytes.
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// Returns the raw bytes.
            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }

            /// Consumes the value and returns the raw bytes.
            pub fn into_vec(self) -> Vec<u8> {
                self.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl From<&[u8]> for $name {
            fn from(bytes: &[u8]) -> Self {
                Self(bytes.to_vec())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", hex::encode(&self.0))
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                hex::decode(s.trim_start_matches("0x")).map(Self)
            }
        }
    };
}

bytes_id! {
    /// Opaque binary payload: method arguments, replies, nonces.
    Blob
}

bytes_id! {
    /// Identifies the canister a call or query is addressed to.
    ///
    /// Carried on the wire as a byte string.
    CanisterId
}

// ---------------------------------------------------------------------------
// RequestId — fixed-length content hash
// ---------------------------------------------------------------------------

/// Content-derived identifier of a submit request.
///
/// Computed by a [`crate::RequestIdDeriver`]; two submit requests with the
/// same normalized fields always yield the same identifier. Callers use it as
/// the correlation key for `request_status` lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId([u8; 32]);

impl RequestId {
    /// Length of a request id in bytes.
    pub const LEN: usize = 32;

    /// Creates a [`RequestId`] from a 32-byte digest.
    pub fn new(bytes: &[u8; 32]) -> Self {
        Self(*bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&[u8]> for RequestId {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 32]>::try_from(bytes).map(Self)
    }
}

impl From<RequestId> for Blob {
    fn from(id: RequestId) -> Self {
        Blob::new(id.0.to_vec())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Error returned when parsing a [`RequestId`] from text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseRequestIdError {
    /// The text was not valid hex.
    #[error("request id is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The decoded bytes were not exactly 32 long.
    #[error("request id must be 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for RequestId {
    type Err = ParseRequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        RequestId::try_from(bytes.as_slice()).map_err(|_| ParseRequestIdError::Length(bytes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_renders_and_parses_hex() {
        let blob = Blob::new(vec![0x44, 0x49, 0x44, 0x4c]);
        assert_eq!(blob.to_string(), "4449444c");
        assert_eq!("0x4449444c".parse::<Blob>().unwrap(), blob);
    }

    #[test]
    fn canister_id_rejects_bad_hex() {
        assert!("zz".parse::<CanisterId>().is_err());
    }

    #[test]
    fn request_id_requires_32_bytes() {
        let err = "00ff".parse::<RequestId>().unwrap_err();
        assert_eq!(err, ParseRequestIdError::Length(2));

        let text = "11".repeat(32);
        let id: RequestId = text.parse().unwrap();
        assert_eq!(id.as_bytes(), &[0x11; 32]);
        assert_eq!(id.to_string(), text);
    }
}
