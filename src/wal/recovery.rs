//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::{KeyServerError, Result};

use super::{FrameRead, WalEntry, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of torn frames dropped from the tail (0 or 1)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

/// Parsed contents of a log buffer
struct Scan {
    entries: Vec<WalEntry>,
    result: RecoveryResult,
    valid_len: usize,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Truncate a torn frame at the end
    /// 3. Fail if damage is found anywhere but the end
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let data = fs::read(path)?;
        let mut scan = Self::scan(&data)?;

        if scan.valid_len < data.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = data.len() - scan.valid_len,
                "Truncating torn WAL tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len as u64)?;
            file.sync_all()?;
            scan.result.was_truncated = true;
        }

        Ok((scan.entries, scan.result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let data = fs::read(path)?;
        let scan = Self::scan(&data)?;
        let mut result = scan.result;
        result.was_truncated = scan.valid_len < data.len();
        Ok(result)
    }

    fn scan(data: &[u8]) -> Result<Scan> {
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut pos = 0;

        while pos < data.len() {
            match WalEntry::deserialize(&data[pos..])? {
                FrameRead::Entry(entry, frame_len) => {
                    if entry.lsn <= result.last_lsn {
                        return Err(KeyServerError::LogCorruption(format!(
                            "LSN {} at offset {} does not follow LSN {}",
                            entry.lsn, pos, result.last_lsn
                        )));
                    }
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    entries.push(entry);
                    pos += frame_len;
                }
                FrameRead::Incomplete => {
                    if let Some(offset) = Self::find_later_frame(data, pos, result.last_lsn) {
                        return Err(KeyServerError::LogCorruption(format!(
                            "frame at offset {} overruns a valid frame at offset {}",
                            pos, offset
                        )));
                    }
                    result.entries_corrupted += 1;
                    break;
                }
                FrameRead::BadLength { len } => {
                    return Err(KeyServerError::LogCorruption(format!(
                        "frame at offset {} claims {} payload bytes (max {})",
                        pos, len, MAX_PAYLOAD_SIZE
                    )));
                }
                FrameRead::BadChecksum { frame_len } => {
                    if pos + frame_len < data.len() {
                        return Err(KeyServerError::LogCorruption(format!(
                            "checksum mismatch at offset {} with {} bytes following",
                            pos,
                            data.len() - pos - frame_len
                        )));
                    }
                    result.entries_corrupted += 1;
                    break;
                }
            }
        }

        Ok(Scan {
            entries,
            result,
            valid_len: pos,
        })
    }

    /// Look for an intact frame after an incomplete one at `pos`
    ///
    /// A torn write only ever leaves a prefix of the last frame, so any
    /// checksummed frame with a newer LSN behind it means the length field
    /// at `pos` is damaged.
    fn find_later_frame(data: &[u8], pos: usize, last_lsn: u64) -> Option<usize> {
        let start = pos + HEADER_SIZE;
        if start >= data.len() {
            return None;
        }
        (start..data.len()).find(|&offset| {
            matches!(
                WalEntry::deserialize(&data[offset..]),
                Ok(FrameRead::Entry(ref entry, _)) if entry.lsn > last_lsn
            )
        })
    }
}
