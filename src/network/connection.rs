//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{KeyServerError, Result};
use crate::key_ops::KeyOps;
use crate::protocol::{read_request, write_response, Request, Response};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// The key server requests are served from
    ops: Arc<dyn KeyOps>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, ops: Arc<dyn KeyOps>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true).map_err(KeyServerError::Network)?;

        let read_stream = stream.try_clone().map_err(KeyServerError::Network)?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            ops,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves a direction unbounded)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))
                .map_err(KeyServerError::Network)?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))
                .map_err(KeyServerError::Network)?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends responses.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let request = match read_request(&mut self.reader) {
                Ok(request) => request,
                Err(ref e) if e.is_disconnect() => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(KeyServerError::Network(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!("Closing idle connection from {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = self.send_response(Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!(
                "Received {:?} from {}",
                request.request_type(),
                self.peer_addr
            );

            let response = self.execute(request);

            if let Err(e) = self.send_response(response) {
                if e.is_disconnect() {
                    tracing::debug!(
                        "Client {} disconnected before response could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    return Ok(());
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Run a request against the key server
    fn execute(&self, request: Request) -> Response {
        let ops = &self.ops;
        let result = match request {
            Request::GetBlockHalf { id } => ops
                .get_block_crypt_key_server_half(&id)
                .map(|half| Some(half.as_ref().to_vec())),
            Request::PutBlockHalf { id, server_half } => ops
                .put_block_crypt_key_server_half(&id, &server_half)
                .map(|()| None),
            Request::DeleteBlockHalf { id } => {
                ops.delete_block_crypt_key_server_half(&id).map(|()| None)
            }
            Request::GetTlfHalf { id } => ops
                .get_tlf_crypt_key_server_half(&id.dir, id.key_gen, &id.device_key)
                .map(|half| Some(half.as_ref().to_vec())),
            Request::PutTlfHalf { id, server_half } => ops
                .put_tlf_crypt_key_server_half(&id.dir, id.key_gen, &id.device_key, &server_half)
                .map(|()| None),
            Request::DeleteTlfHalf { id } => ops
                .delete_tlf_crypt_key_server_half(&id.dir, id.key_gen, &id.device_key)
                .map(|()| None),
            Request::GetMacPublicKey { user } => ops
                .get_mac_public_key(&user)
                .map(|key| Some(key.as_ref().to_vec())),
            Request::PutMacPublicKey { user, key } => {
                ops.put_mac_public_key(&user, &key).map(|()| None)
            }
            Request::Ping => Ok(Some(b"PONG".to_vec())),
        };

        if let Err(ref e) = result {
            if !e.is_not_found() {
                tracing::warn!("Request from {} failed: {}", self.peer_addr, e);
            }
        }

        Response::from_result(result)
    }

    fn send_response(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.writer, &response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
