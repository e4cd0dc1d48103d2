//! # keyserver
//!
//! Storage for *key server halves*: the server's shares of split symmetric
//! keys used by an encrypted filesystem. A device combines its own half with
//! the half held here to recover a block or folder key; this store on its
//! own never holds a usable secret.
//!
//! - Fixed-width share types, validated on every read
//! - Per-block and per-(folder, generation, device) key families in one
//!   flat, prefix-partitioned namespace
//! - A log-structured engine with crash recovery, in memory or on disk
//! - The same `KeyOps` contract served locally or over TCP
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KeyOps (contract)                        │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌─────────────────────────┐      ┌──────────────────────┐
//!   │     KeyServerLocal      │◄─────│   KeyServerRemote    │
//!   │ (keyspace + length chk) │ TCP  │  (protocol client)   │
//!   └────────────┬────────────┘      └──────────────────────┘
//!                │
//!                ▼
//!   ┌─────────────────────────┐
//!   │         Engine          │
//!   │   MemTable  +  WAL      │
//!   └─────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod codec;
pub mod keyspace;
pub mod types;

pub mod engine;
pub mod memtable;
pub mod wal;

pub mod key_ops;
pub mod local;
pub mod remote;

pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::{BincodeCodec, Codec};
pub use config::{Backend, Config, StorageMode, SyncStrategy};
pub use engine::{Engine, EngineOptions};
pub use error::{KeyServerError, Result};
pub use key_ops::{KeyOps, KeyServer};
pub use keyspace::ServerHalfId;
pub use local::KeyServerLocal;
pub use remote::KeyServerRemote;
pub use types::{
    BlockCryptKeyServerHalf, BlockId, CryptPublicKey, DirId, KeyGen, MacPublicKey,
    TlfCryptKeyServerHalf, UserId,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of keyserver
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
