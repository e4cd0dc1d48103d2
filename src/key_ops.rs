//! Key access contract
//!
//! `KeyOps` is the one interface callers program against. It has two
//! implementations: [`KeyServerLocal`] over an in-process engine, and
//! [`KeyServerRemote`] over TCP. [`KeyServer`] picks one from a
//! [`Config`].

use crate::config::{Backend, Config};
use crate::error::Result;
use crate::local::KeyServerLocal;
use crate::remote::KeyServerRemote;
use crate::types::{
    BlockCryptKeyServerHalf, BlockId, CryptPublicKey, DirId, KeyGen, MacPublicKey,
    TlfCryptKeyServerHalf, UserId,
};

/// Access to key server halves
///
/// All methods are synchronous and safe to call from many threads at once.
/// Puts are unconditional upserts; deletes of absent entries succeed.
pub trait KeyOps: Send + Sync {
    /// Get the server half for a block, or `NotFound`
    fn get_block_crypt_key_server_half(&self, id: &BlockId) -> Result<BlockCryptKeyServerHalf>;

    /// Store the server half for a block
    fn put_block_crypt_key_server_half(
        &self,
        id: &BlockId,
        server_half: &BlockCryptKeyServerHalf,
    ) -> Result<()>;

    /// Remove the server half for a block
    fn delete_block_crypt_key_server_half(&self, id: &BlockId) -> Result<()>;

    /// Get the server half for one device at one key generation of a folder
    fn get_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<TlfCryptKeyServerHalf>;

    /// Store the server half for one device at one key generation of a folder
    fn put_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
        server_half: &TlfCryptKeyServerHalf,
    ) -> Result<()>;

    /// Remove the server half for one device at one key generation of a folder
    fn delete_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<()>;

    /// Get a user's MAC public key, or `NotFound`
    fn get_mac_public_key(&self, user: &UserId) -> Result<MacPublicKey>;

    /// Store a user's MAC public key
    fn put_mac_public_key(&self, user: &UserId, key: &MacPublicKey) -> Result<()>;
}

/// A key server selected by configuration
#[derive(Debug)]
pub enum KeyServer {
    Local(KeyServerLocal),
    Remote(KeyServerRemote),
}

impl KeyServer {
    /// Open the backend named by `config.backend`
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        match &config.backend {
            Backend::Local { storage } => {
                tracing::debug!(?storage, "Opening local key server");
                Ok(KeyServer::Local(KeyServerLocal::open(storage.clone(), config)?))
            }
            Backend::Remote { addr } => {
                tracing::debug!(%addr, "Connecting to remote key server");
                Ok(KeyServer::Remote(KeyServerRemote::connect(addr, config)?))
            }
        }
    }

    fn ops(&self) -> &dyn KeyOps {
        match self {
            KeyServer::Local(local) => local,
            KeyServer::Remote(remote) => remote,
        }
    }
}

impl KeyOps for KeyServer {
    fn get_block_crypt_key_server_half(&self, id: &BlockId) -> Result<BlockCryptKeyServerHalf> {
        self.ops().get_block_crypt_key_server_half(id)
    }

    fn put_block_crypt_key_server_half(
        &self,
        id: &BlockId,
        server_half: &BlockCryptKeyServerHalf,
    ) -> Result<()> {
        self.ops().put_block_crypt_key_server_half(id, server_half)
    }

    fn delete_block_crypt_key_server_half(&self, id: &BlockId) -> Result<()> {
        self.ops().delete_block_crypt_key_server_half(id)
    }

    fn get_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<TlfCryptKeyServerHalf> {
        self.ops().get_tlf_crypt_key_server_half(dir, key_gen, device_key)
    }

    fn put_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
        server_half: &TlfCryptKeyServerHalf,
    ) -> Result<()> {
        self.ops()
            .put_tlf_crypt_key_server_half(dir, key_gen, device_key, server_half)
    }

    fn delete_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<()> {
        self.ops()
            .delete_tlf_crypt_key_server_half(dir, key_gen, device_key)
    }

    fn get_mac_public_key(&self, user: &UserId) -> Result<MacPublicKey> {
        self.ops().get_mac_public_key(user)
    }

    fn put_mac_public_key(&self, user: &UserId, key: &MacPublicKey) -> Result<()> {
        self.ops().put_mac_public_key(user, key)
    }
}
