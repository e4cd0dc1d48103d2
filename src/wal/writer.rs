//! WAL Writer
//!
//! Handles appending entries to the WAL file and rewriting it from a
//! snapshot of live data.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::{Operation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    /// Path of the live log
    path: PathBuf,

    /// Buffered append handle
    writer: BufWriter<File>,

    /// LSN the next appended entry receives
    next_lsn: u64,

    /// When to fsync
    sync_strategy: SyncStrategy,

    /// Entries appended since the last fsync
    unsynced: usize,

    /// Current file length in bytes
    size: u64,
}

impl WalWriter {
    /// Open or create a WAL file for appending
    ///
    /// `next_lsn` must be greater than every LSN already in the file.
    pub fn open(path: &Path, sync_strategy: SyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
            size,
        })
    }

    /// Append an operation, returning the LSN it was logged under
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, operation).serialize()?;

        self.writer.write_all(&frame)?;
        self.next_lsn += 1;
        self.size += frame.len() as u64;
        self.unsynced += 1;

        match self.sync_strategy {
            SyncStrategy::EveryWrite => self.sync()?,
            SyncStrategy::EveryNEntries { count } => {
                if self.unsynced >= count {
                    self.sync()?;
                } else {
                    self.writer.flush()?;
                }
            }
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Replace the log with one `Put` per live pair
    ///
    /// The new log is written beside the old one, synced, then renamed over
    /// it, so a crash leaves either the old log or the new one intact.
    pub fn rewrite<I>(&mut self, live: I) -> Result<()>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        self.sync()?;

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = BufWriter::new(File::create(&tmp_path)?);
        let mut lsn = 1;
        let mut size = 0u64;
        for (key, value) in live {
            let frame = WalEntry::new(lsn, Operation::Put { key, value }).serialize()?;
            tmp.write_all(&frame)?;
            size += frame.len() as u64;
            lsn += 1;
        }
        tmp.flush()?;
        tmp.get_ref().sync_all()?;
        drop(tmp);

        // Opened before the rename so the handle follows the new log's inode.
        let file = OpenOptions::new().append(true).open(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path);

        self.writer = BufWriter::new(file);
        self.next_lsn = lsn;
        self.size = size;
        self.unsynced = 0;

        tracing::debug!(path = %self.path.display(), entries = lsn - 1, bytes = size, "WAL rewritten");
        Ok(())
    }

    /// Get the LSN of the last appended entry (0 if none)
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    /// Get the current file size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Make a rename durable; failure only weakens crash guarantees.
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    if parent.as_os_str().is_empty() {
        return;
    }
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        tracing::debug!("Could not sync directory {}: {}", parent.display(), e);
    }
}
