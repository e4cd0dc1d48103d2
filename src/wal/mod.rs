//! Write-Ahead Log (WAL) Module
//!
//! Durability for file-backed engines. Every mutation is appended here
//! before it touches the in-memory table; on open, the log is replayed to
//! rebuild that table.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Data is a bincode-encoded `Operation`,
//! stored uncompressed.

mod entry;
mod recovery;
mod writer;

pub use entry::{FrameRead, Operation, WalEntry, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
