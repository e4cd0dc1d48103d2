//! TCP Server
//!
//! Accepts connections and dispatches them to a pool of worker threads.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};

use crate::config::Config;
use crate::error::{KeyServerError, Result};
use crate::key_ops::KeyOps;

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// TCP server exposing a key server to `KeyServerRemote` clients
pub struct Server {
    config: Config,
    ops: Arc<dyn KeyOps>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
}

/// Cloneable handle that stops a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Server {
    /// Create a new server with the given config and key server
    pub fn new(config: Config, ops: Arc<dyn KeyOps>) -> Self {
        Self {
            config,
            ops,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the listen address, returning the bound address
    ///
    /// Useful with port 0 to learn the port before calling `run`.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener =
            TcpListener::bind(&self.config.listen_addr).map_err(KeyServerError::Network)?;
        listener
            .set_nonblocking(true)
            .map_err(KeyServerError::Network)?;
        let addr = listener.local_addr().map_err(KeyServerError::Network)?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Start the server (blocking until shutdown)
    ///
    /// Workers finish the connection they are serving after shutdown; they
    /// are not joined.
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let Some(listener) = self.listener.take() else {
            return Err(KeyServerError::Config("server is not bound".to_string()));
        };

        let addr = listener.local_addr().map_err(KeyServerError::Network)?;
        tracing::info!("Listening on {}", addr);
        if self.config.read_timeout_ms == 0 {
            tracing::warn!("No read timeout: idle clients can hold every worker");
        }

        let workers = self.config.worker_threads.max(1);
        let (sender, receiver) = channel::bounded::<TcpStream>(workers * 4);
        for id in 0..workers {
            let receiver = receiver.clone();
            let ops = Arc::clone(&self.ops);
            let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);
            thread::Builder::new()
                .name(format!("keyserver-worker-{}", id))
                .spawn(move || worker_loop(receiver, ops, read_ms, write_ms))
                .map_err(KeyServerError::Network)?;
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    tracing::trace!("Accepted connection from {}", peer);
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!("Dropping connection from {}: {}", peer, e);
                        continue;
                    }
                    if sender.send(stream).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Server on {} shutting down", addr);
        Ok(())
    }

    /// Get a handle that can stop the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn worker_loop(receiver: Receiver<TcpStream>, ops: Arc<dyn KeyOps>, read_ms: u64, write_ms: u64) {
    for stream in receiver.iter() {
        let mut connection = match Connection::new(stream, Arc::clone(&ops)) {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Failed to set up connection: {}", e);
                continue;
            }
        };
        if let Err(e) = connection.set_timeouts(read_ms, write_ms) {
            tracing::warn!("Failed to set timeouts for {}: {}", connection.peer_addr(), e);
            continue;
        }
        if let Err(e) = connection.handle() {
            tracing::debug!("Connection {} ended with error: {}", connection.peer_addr(), e);
        }
    }
}
