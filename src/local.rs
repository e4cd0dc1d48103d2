//! Local key server
//!
//! Stores key server halves in an engine owned by this process.
//!
//! Per-block halves are keyed by block ID. Per-folder halves are keyed by
//! the codec encoding of a (folder ID, key generation, device public key)
//! tuple. Every read checks that the stored value has exactly the width of
//! its share type; anything else is corruption and is returned as
//! `LengthMismatch`.

use std::path::Path;

use crate::codec::{BincodeCodec, Codec};
use crate::config::{Config, StorageMode};
use crate::engine::{Engine, EngineOptions};
use crate::error::{KeyServerError, Result};
use crate::key_ops::KeyOps;
use crate::keyspace::{self, ServerHalfId};
use crate::types::{
    BlockCryptKeyServerHalf, BlockId, CryptPublicKey, DirId, KeyGen, MacPublicKey,
    TlfCryptKeyServerHalf, UserId,
};

/// Key server backed by a local engine
pub struct KeyServerLocal<C: Codec = BincodeCodec> {
    codec: C,
    engine: Engine,
}

impl KeyServerLocal<BincodeCodec> {
    /// Open a store with the given backing and engine tuning from `config`
    pub fn open(storage: StorageMode, config: &Config) -> Result<Self> {
        let engine = Engine::open(EngineOptions::from_config(storage, config))?;
        Ok(Self::with_engine(BincodeCodec, engine))
    }

    /// Open a durable store whose log lives at `db_file`
    pub fn new(db_file: impl AsRef<Path>) -> Result<Self> {
        Self::open(
            StorageMode::File(db_file.as_ref().to_path_buf()),
            &Config::default(),
        )
    }

    /// Open a volatile in-memory store
    pub fn memory() -> Result<Self> {
        Self::open(StorageMode::Memory, &Config::default())
    }
}

impl<C: Codec> KeyServerLocal<C> {
    /// Wrap an already-open engine
    pub fn with_engine(codec: C, engine: Engine) -> Self {
        Self { codec, engine }
    }

    /// Flush, compact and release the engine
    pub fn close(self) -> Result<()> {
        self.engine.close()
    }

    /// The underlying engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Read `key` and check it holds exactly `expected` bytes
    fn get_checked(&self, key: &[u8], expected: usize) -> Result<Vec<u8>> {
        let data = self.engine.get(key)?.ok_or(KeyServerError::NotFound)?;
        if data.len() != expected {
            tracing::warn!(
                expected,
                actual = data.len(),
                family = key.first().copied().unwrap_or_default(),
                "Stored key server half has the wrong length"
            );
            return Err(KeyServerError::length_mismatch(expected, data.len()));
        }
        Ok(data)
    }

    fn tlf_key(&self, dir: &DirId, key_gen: KeyGen, device_key: &CryptPublicKey) -> Result<Vec<u8>> {
        keyspace::tlf_key(&self.codec, &ServerHalfId::new(*dir, key_gen, *device_key))
    }
}

impl<C: Codec> KeyOps for KeyServerLocal<C> {
    fn get_block_crypt_key_server_half(&self, id: &BlockId) -> Result<BlockCryptKeyServerHalf> {
        tracing::trace!(block = %id, "get block half");
        let data = self.get_checked(&keyspace::block_key(id), BlockCryptKeyServerHalf::LEN)?;
        BlockCryptKeyServerHalf::from_slice(&data)
    }

    fn put_block_crypt_key_server_half(
        &self,
        id: &BlockId,
        server_half: &BlockCryptKeyServerHalf,
    ) -> Result<()> {
        tracing::trace!(block = %id, "put block half");
        self.engine
            .put(&keyspace::block_key(id), server_half.as_ref())
    }

    fn delete_block_crypt_key_server_half(&self, id: &BlockId) -> Result<()> {
        tracing::trace!(block = %id, "delete block half");
        self.engine.delete(&keyspace::block_key(id))
    }

    fn get_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<TlfCryptKeyServerHalf> {
        tracing::trace!(dir = %dir, %key_gen, device = %device_key, "get tlf half");
        let key = self.tlf_key(dir, key_gen, device_key)?;
        let data = self.get_checked(&key, TlfCryptKeyServerHalf::LEN)?;
        TlfCryptKeyServerHalf::from_slice(&data)
    }

    fn put_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
        server_half: &TlfCryptKeyServerHalf,
    ) -> Result<()> {
        tracing::trace!(dir = %dir, %key_gen, device = %device_key, "put tlf half");
        let key = self.tlf_key(dir, key_gen, device_key)?;
        self.engine.put(&key, server_half.as_ref())
    }

    fn delete_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<()> {
        tracing::trace!(dir = %dir, %key_gen, device = %device_key, "delete tlf half");
        let key = self.tlf_key(dir, key_gen, device_key)?;
        self.engine.delete(&key)
    }

    fn get_mac_public_key(&self, user: &UserId) -> Result<MacPublicKey> {
        tracing::trace!(user = %user, "get mac public key");
        let data = self.get_checked(&keyspace::mac_key(user), MacPublicKey::LEN)?;
        MacPublicKey::from_slice(&data)
    }

    fn put_mac_public_key(&self, user: &UserId, key: &MacPublicKey) -> Result<()> {
        tracing::trace!(user = %user, "put mac public key");
        self.engine.put(&keyspace::mac_key(user), key.as_ref())
    }
}

impl<C: Codec> std::fmt::Debug for KeyServerLocal<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyServerLocal")
            .field("engine", &self.engine)
            .finish()
    }
}
