//! Codec
//!
//! Turns structured identifiers into byte strings for use as storage keys,
//! and encodes request bodies on the wire.
//!
//! Storage keys must be deterministic and injective: the same value always
//! encodes to the same bytes, and two different values never share an
//! encoding. `BincodeCodec` uses fixed-width little-endian integers and no
//! length prefix on fixed-size arrays, so every field of a composite key
//! lands at a fixed offset.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{KeyServerError, Result};

/// Deterministic, injective encoder
pub trait Codec: Send + Sync {
    /// Encode a value to bytes
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value from bytes, rejecting trailing input
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Bincode with fixed-width integers
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Upper bound on decoded allocations
    const DECODE_LIMIT: u64 = 16 * 1024 * 1024;

    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
            .reject_trailing_bytes()
            .with_limit(Self::DECODE_LIMIT)
    }
}

impl Codec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        Self::options()
            .serialize(value)
            .map_err(|e| KeyServerError::Encoding(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Self::options()
            .deserialize(bytes)
            .map_err(|e| KeyServerError::Encoding(e.to_string()))
    }
}
