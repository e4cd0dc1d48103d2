//! Keyspace layout
//!
//! All logical key families share one flat, ordered engine namespace.
//! Each family owns a one-byte prefix so that, for example, a block ID can
//! never alias an encoded folder key.
//!
//! ```text
//! ┌────────┬──────────────────────────┬─────────────────────────────┐
//! │ Prefix │ Family                   │ Remainder                   │
//! ├────────┼──────────────────────────┼─────────────────────────────┤
//! │  0x01  │ block server halves      │ BlockId (32)                │
//! │  0x02  │ folder server halves     │ codec(ServerHalfId)         │
//! │  0x03  │ MAC public keys          │ UserId (16)                 │
//! └────────┴──────────────────────────┴─────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::Result;
use crate::types::{BlockId, CryptPublicKey, DirId, KeyGen, UserId};

/// Prefix byte for block server half keys.
pub const BLOCK_HALF_PREFIX: u8 = 0x01;

/// Prefix byte for folder server half keys.
pub const TLF_HALF_PREFIX: u8 = 0x02;

/// Prefix byte for MAC public key entries.
pub const MAC_PUBLIC_KEY_PREFIX: u8 = 0x03;

/// Composite identifier of one folder server half
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerHalfId {
    pub dir: DirId,
    pub key_gen: KeyGen,
    pub device_key: CryptPublicKey,
}

impl ServerHalfId {
    pub fn new(dir: DirId, key_gen: KeyGen, device_key: CryptPublicKey) -> Self {
        Self {
            dir,
            key_gen,
            device_key,
        }
    }
}

/// Storage key for a block server half
pub fn block_key(id: &BlockId) -> Vec<u8> {
    prefixed(BLOCK_HALF_PREFIX, id.as_ref())
}

/// Storage key for a folder server half
pub fn tlf_key<C: Codec>(codec: &C, id: &ServerHalfId) -> Result<Vec<u8>> {
    let encoded = codec.encode(id)?;
    Ok(prefixed(TLF_HALF_PREFIX, &encoded))
}

/// Storage key for a user's MAC public key
pub fn mac_key(user: &UserId) -> Vec<u8> {
    prefixed(MAC_PUBLIC_KEY_PREFIX, user.as_ref())
}

fn prefixed(prefix: u8, rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + rest.len());
    key.push(prefix);
    key.extend_from_slice(rest);
    key
}
