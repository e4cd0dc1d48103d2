//! Engine Module
//!
//! The ordered byte-key storage engine underneath the key server.
//!
//! ## Responsibilities
//! - Atomic point get/put/delete
//! - Concurrent reads, serialized writes
//! - Durability through the WAL (file mode only)
//! - Crash recovery and log compaction

use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use crate::config::{Config, StorageMode, SyncStrategy};
use crate::error::{KeyServerError, Result};
use crate::memtable::MemTable;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Options for opening an engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Memory or file backing
    pub storage: StorageMode,

    /// When to fsync the log
    pub sync_strategy: SyncStrategy,

    /// Dead log records tolerated before the log is rewritten
    pub compaction_threshold: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let config = Config::default();
        Self {
            storage: StorageMode::Memory,
            sync_strategy: config.sync_strategy,
            compaction_threshold: config.compaction_threshold,
        }
    }
}

impl EngineOptions {
    /// Engine options for `storage`, with tuning taken from `config`
    pub fn from_config(storage: StorageMode, config: &Config) -> Self {
        Self {
            storage,
            sync_strategy: config.sync_strategy,
            compaction_threshold: config.compaction_threshold,
        }
    }
}

/// State touched only by writers
struct WriteState {
    /// None for in-memory engines
    wal: Option<WalWriter>,

    /// Log records that no longer describe live data
    dead_records: usize,
}

/// The storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/compact): serialized by the `writer` mutex,
///   which also owns the WAL. Order: WAL → memtable.
/// - **Reads** (get): take only the memtable's read lock, so they never
///   wait on log I/O.
///
/// Each point operation is atomic; there are no multi-key transactions.
pub struct Engine {
    options: EngineOptions,

    /// Live data
    memtable: MemTable,

    /// Serializes writers and owns the log
    writer: Mutex<WriteState>,
}

impl Engine {
    /// Open or create an engine
    ///
    /// For file storage:
    /// 1. Create the parent directory
    /// 2. Recover from the log if it exists (truncating a torn tail)
    /// 3. Replay entries into the memtable
    /// 4. Open the log for appending
    ///
    /// Any failure is reported as `StorageOpen`.
    pub fn open(options: EngineOptions) -> Result<Self> {
        let memtable = MemTable::new();

        let (wal, dead_records) = match &options.storage {
            StorageMode::Memory => (None, 0),
            StorageMode::File(path) => {
                let (wal, dead) = Self::open_log(path, &options, &memtable).map_err(|e| {
                    KeyServerError::StorageOpen(format!("{}: {}", path.display(), e))
                })?;
                (Some(wal), dead)
            }
        };

        let engine = Self {
            options,
            memtable,
            writer: Mutex::new(WriteState { wal, dead_records }),
        };

        engine.maybe_compact(&mut engine.writer.lock());

        tracing::debug!(
            storage = ?engine.options.storage,
            entries = engine.memtable.entry_count(),
            "Engine opened"
        );
        Ok(engine)
    }

    /// Open an in-memory engine with default options
    pub fn memory() -> Result<Self> {
        Self::open(EngineOptions::default())
    }

    /// Open a file-backed engine with default options
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(EngineOptions {
            storage: StorageMode::File(path.to_path_buf()),
            ..EngineOptions::default()
        })
    }

    fn open_log(
        path: &Path,
        options: &EngineOptions,
        memtable: &MemTable,
    ) -> Result<(WalWriter, usize)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut next_lsn = 1;
        let mut dead = 0;

        if path.exists() {
            let (entries, recovery) = WalRecovery::recover(path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::debug!(
                    recovered = recovery.entries_recovered,
                    torn = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery complete"
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        if memtable.put(key, value) {
                            dead += 1;
                        }
                    }
                    Operation::Delete { key } => {
                        // The delete record and the put it cancels are both dead.
                        dead += if memtable.delete(&key) { 2 } else { 1 };
                    }
                }
            }
            next_lsn = recovery.last_lsn + 1;
        }

        let wal = WalWriter::open(path, options.sync_strategy, next_lsn)?;
        Ok((wal, dead))
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.memtable.get(key))
    }

    /// Insert or overwrite a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.writer.lock();

        if let Some(wal) = state.wal.as_mut() {
            wal.append(Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            })?;
        }

        if self.memtable.put(key.to_vec(), value.to_vec()) {
            state.dead_records += 1;
        }

        self.maybe_compact(&mut state);
        Ok(())
    }

    /// Delete a key; absent keys are a no-op
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut state = self.writer.lock();

        if !self.memtable.contains(key) {
            return Ok(());
        }

        if let Some(wal) = state.wal.as_mut() {
            wal.append(Operation::Delete { key: key.to_vec() })?;
        }

        self.memtable.delete(key);
        state.dead_records += 2;

        self.maybe_compact(&mut state);
        Ok(())
    }

    /// Rewrite the log so it holds only live data
    pub fn compact(&self) -> Result<()> {
        let mut state = self.writer.lock();
        self.compact_locked(&mut state)
    }

    /// Compact once enough dead records have piled up
    ///
    /// The write that got us here is already committed, so a failed rewrite
    /// is logged and retried on a later write rather than returned.
    fn maybe_compact(&self, state: &mut WriteState) {
        if state.dead_records < self.options.compaction_threshold {
            return;
        }
        if let Err(e) = self.compact_locked(state) {
            tracing::warn!(
                dead_records = state.dead_records,
                "Log compaction failed, keeping the current log: {}",
                e
            );
        }
    }

    /// Called with the writer lock held
    fn compact_locked(&self, state: &mut WriteState) -> Result<()> {
        if let Some(wal) = state.wal.as_mut() {
            wal.rewrite(self.memtable.snapshot())?;
        }
        state.dead_records = 0;
        Ok(())
    }

    /// Force the log to disk
    pub fn sync(&self) -> Result<()> {
        let mut state = self.writer.lock();
        if let Some(wal) = state.wal.as_mut() {
            wal.sync()?;
        }
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Compacts and syncs the log. Dropping without closing is also safe;
    /// the next open replays whatever reached the log.
    pub fn close(self) -> Result<()> {
        let mut state = self.writer.lock();
        if state.wal.is_some() && state.dead_records > 0 {
            self.compact_locked(&mut state)?;
        }
        if let Some(wal) = state.wal.as_mut() {
            wal.sync()?;
        }
        tracing::debug!("Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Path of the log file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        match &self.options.storage {
            StorageMode::File(path) => Some(path.as_path()),
            StorageMode::Memory => None,
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.options.storage, StorageMode::File(_))
    }

    /// Number of live keys
    pub fn entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Approximate bytes of live keys and values
    pub fn data_size(&self) -> usize {
        self.memtable.size()
    }

    /// Current log length in bytes (0 for in-memory engines)
    pub fn log_size(&self) -> u64 {
        self.writer.lock().wal.as_ref().map_or(0, WalWriter::size)
    }

    /// Dead records accumulated since the last compaction
    pub fn dead_records(&self) -> usize {
        self.writer.lock().dead_records
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(wal) = self.writer.get_mut().wal.as_mut() {
            if let Err(e) = wal.sync() {
                tracing::warn!("Failed to sync WAL on drop: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("storage", &self.options.storage)
            .field("entries", &self.memtable.entry_count())
            .finish()
    }
}
