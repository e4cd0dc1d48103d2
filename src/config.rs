//! Configuration for the key server
//!
//! Centralized configuration with sensible defaults. The `backend` field
//! decides whether a [`KeyServer`](crate::KeyServer) is backed by a local
//! storage engine or by a remote key server reached over TCP.

use std::path::PathBuf;

use crate::error::{KeyServerError, Result};

/// Main configuration for a key server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Backend Selection
    // -------------------------------------------------------------------------
    /// Which implementation of the key access contract to use
    pub backend: Backend,

    // -------------------------------------------------------------------------
    // Storage Engine Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the engine log
    pub sync_strategy: SyncStrategy,

    /// Number of dead log records tolerated before the log is rewritten
    pub compaction_threshold: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address (server side)
    pub listen_addr: String,

    /// Number of worker threads serving connections
    pub worker_threads: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    ///
    /// A server drops a client that sends nothing for this long, which
    /// frees its worker. A client gives up waiting for a reply after it.
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Which backend serves key server halves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// An engine opened in this process
    Local { storage: StorageMode },

    /// A key server reached over TCP
    Remote { addr: String },
}

/// Where the local storage engine keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    /// Volatile, lost when the store is dropped
    Memory,

    /// Durable log file at the given path
    File(PathBuf),
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Local {
                storage: StorageMode::Memory,
            },
            sync_strategy: SyncStrategy::EveryWrite,
            compaction_threshold: 4096,
            listen_addr: "127.0.0.1:7461".to_string(),
            worker_threads: 8,
            read_timeout_ms: 30_000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config for values the rest of the crate can't work with
    pub fn validate(&self) -> Result<()> {
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(KeyServerError::Config(
                "sync strategy count must be at least 1".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(KeyServerError::Config(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        match &self.backend {
            Backend::Remote { addr } if addr.is_empty() => Err(KeyServerError::Config(
                "remote backend needs an address".to_string(),
            )),
            Backend::Local {
                storage: StorageMode::File(path),
            } if path.as_os_str().is_empty() => Err(KeyServerError::Config(
                "file storage needs a path".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Use an in-memory local engine
    pub fn memory(mut self) -> Self {
        self.config.backend = Backend::Local {
            storage: StorageMode::Memory,
        };
        self
    }

    /// Use a file-backed local engine at `path`
    pub fn db_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backend = Backend::Local {
            storage: StorageMode::File(path.into()),
        };
        self
    }

    /// Use a remote key server at `addr`
    pub fn remote(mut self, addr: impl Into<String>) -> Self {
        self.config.backend = Backend::Remote { addr: addr.into() };
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set how many dead log records trigger a rewrite
    pub fn compaction_threshold(mut self, records: usize) -> Self {
        self.config.compaction_threshold = records;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the number of connection worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
