//! Network Module
//!
//! TCP server side of the remote backend.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool fed by a crossbeam channel
//! - Requests routed to any `KeyOps` implementation

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
