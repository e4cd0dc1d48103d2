//! WAL Entry definitions
//!
//! Defines the structure of individual log frames and how they are
//! encoded to and decoded from bytes.

use serde::{Deserialize, Serialize};

use crate::error::{KeyServerError, Result};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest payload a single frame may carry
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - strictly increasing within one log file
    pub lsn: u64,

    /// The operation to replay
    pub operation: Operation,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

/// Outcome of decoding one frame from the front of a buffer
#[derive(Debug)]
pub enum FrameRead {
    /// A valid entry and the number of bytes it occupied
    Entry(WalEntry, usize),

    /// The buffer ends before the frame does (torn write)
    Incomplete,

    /// The frame is complete but its checksum does not match
    BadChecksum { frame_len: usize },

    /// The length field exceeds `MAX_PAYLOAD_SIZE`; no writer produces this
    BadLength { len: usize },
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self { lsn, operation }
    }

    /// Encode as `LSN | CRC | Len | payload`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&self.operation)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(KeyServerError::Encoding(format!(
                "WAL payload too large: {} bytes (max {})",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&Self::compute_crc(&payload).to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode the frame at the start of `bytes`
    ///
    /// A frame whose checksum matches but whose payload does not decode is
    /// reported as an error, since no torn write can produce it.
    pub fn deserialize(bytes: &[u8]) -> Result<FrameRead> {
        if bytes.len() < HEADER_SIZE {
            return Ok(FrameRead::Incomplete);
        }

        let lsn = u64::from_le_bytes(read_array(&bytes[0..8]));
        let crc = u32::from_le_bytes(read_array(&bytes[8..12]));
        let len = u32::from_le_bytes(read_array(&bytes[12..16])) as usize;

        if len > MAX_PAYLOAD_SIZE {
            return Ok(FrameRead::BadLength { len });
        }

        let frame_len = HEADER_SIZE + len;
        if bytes.len() < frame_len {
            return Ok(FrameRead::Incomplete);
        }

        let payload = &bytes[HEADER_SIZE..frame_len];
        if Self::compute_crc(payload) != crc {
            return Ok(FrameRead::BadChecksum { frame_len });
        }

        let operation: Operation = bincode::deserialize(payload).map_err(|e| {
            KeyServerError::LogCorruption(format!("undecodable entry at LSN {}: {}", lsn, e))
        })?;

        Ok(FrameRead::Entry(Self { lsn, operation }, frame_len))
    }

    pub fn compute_crc(payload: &[u8]) -> u32 {
        crc32fast::hash(payload)
    }
}

impl Operation {
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
