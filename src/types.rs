//! Identifier and share types
//!
//! Every identifier and share the key server handles has a fixed width.
//! Each one is its own newtype over a byte array so that a buffer of the
//! wrong length is rejected the moment it is turned into a typed value,
//! not somewhere deep inside the store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KeyServerError, Result};

/// Width of a block ID (a content hash)
pub const BLOCK_ID_LEN: usize = 32;

/// Width of a top-level folder ID
pub const DIR_ID_LEN: usize = 16;

/// Width of a user ID
pub const USER_ID_LEN: usize = 16;

/// Width of a device encryption public key
pub const CRYPT_PUBLIC_KEY_LEN: usize = 32;

/// Width of a MAC public key
pub const MAC_PUBLIC_KEY_LEN: usize = 32;

/// Width of every key server half
pub const SERVER_HALF_LEN: usize = 32;

macro_rules! fixed_bytes {
    // Identifiers print their bytes in hex.
    ($(#[$meta:meta])* public $name:ident, $len:expr) => {
        fixed_bytes!(@define $(#[$meta])* $name, $len);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }
    };

    // Shares never print their bytes.
    ($(#[$meta:meta])* secret $name:ident, $len:expr) => {
        fixed_bytes!(@define $(#[$meta])* $name, $len);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(<{} bytes>)", stringify!($name), $len)
            }
        }
    };

    (@define $(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width in bytes
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Copy from a slice, failing with `LengthMismatch` unless it is exactly `LEN` bytes
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let array: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| KeyServerError::length_mismatch($len, bytes.len()))?;
                Ok(Self(array))
            }

            /// Parse from a hex string
            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes = hex::decode(s).map_err(|e| {
                    KeyServerError::Encoding(format!("invalid hex for {}: {}", stringify!($name), e))
                })?;
                Self::from_slice(&bytes)
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn into_bytes(self) -> [u8; $len] {
                self.0
            }

            /// True for the all-zero value
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|&b| b == 0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = KeyServerError;

            fn try_from(bytes: &[u8]) -> Result<Self> {
                Self::from_slice(bytes)
            }
        }
    };
}

fixed_bytes!(
    /// Identifier for one immutable content block
    public BlockId, BLOCK_ID_LEN
);

fixed_bytes!(
    /// Identifier for a top-level folder (TLF)
    public DirId, DIR_ID_LEN
);

fixed_bytes!(
    /// Identifier for a user
    public UserId, USER_ID_LEN
);

fixed_bytes!(
    /// A device's public encryption key
    public CryptPublicKey, CRYPT_PUBLIC_KEY_LEN
);

fixed_bytes!(
    /// A user's public MAC key
    public MacPublicKey, MAC_PUBLIC_KEY_LEN
);

fixed_bytes!(
    /// Server's share of a block's symmetric encryption key
    secret BlockCryptKeyServerHalf, SERVER_HALF_LEN
);

fixed_bytes!(
    /// Server's share of a folder key, for one (folder, generation, device)
    secret TlfCryptKeyServerHalf, SERVER_HALF_LEN
);

/// Generation counter for a folder's key material
///
/// Bumped by the key-management layer on every rotation. The store only
/// uses it as part of a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyGen(pub u32);

impl KeyGen {
    /// The first generation a folder is ever keyed with
    pub const FIRST_VALID: KeyGen = KeyGen(1);

    /// The following generation, or `None` once the counter is exhausted
    pub fn next(self) -> Option<KeyGen> {
        self.0.checked_add(1).map(KeyGen)
    }
}

impl From<u32> for KeyGen {
    fn from(value: u32) -> Self {
        KeyGen(value)
    }
}

impl fmt::Display for KeyGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
