//! MemTable Module
//!
//! The engine's authoritative view of live data.
//!
//! ## Responsibilities
//! - Point reads and writes in memory
//! - Multi-reader access through an RwLock
//! - Track approximate size
//! - Ordered snapshots for log rewrites
//!
//! ## Data Structure Choice
//! A BTreeMap keeps keys ordered, which the flat namespace relies on for
//! prefix-grouped layout. Deletes remove entries outright: the log, not
//! the table, is what remembers that a key once existed.

mod table;

pub use table::MemTable;
