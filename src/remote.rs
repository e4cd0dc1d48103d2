//! Remote key server
//!
//! Implements `KeyOps` by forwarding every call to a `Server` over TCP.
//! Calls through one `KeyServerRemote` share a single connection and are
//! serialized.
//!
//! A connection that fails mid-call (timeout, reset, bad frame) is thrown
//! away, since a late reply on it would otherwise be read as the answer to
//! the next request. The next call dials a fresh one. A connection the
//! server closed while idle is replaced once and the call is sent again;
//! every key operation is idempotent, so resending is safe.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{KeyServerError, Result};
use crate::key_ops::KeyOps;
use crate::keyspace::ServerHalfId;
use crate::protocol::{read_response, write_request, Request, Response};
use crate::types::{
    BlockCryptKeyServerHalf, BlockId, CryptPublicKey, DirId, KeyGen, MacPublicKey,
    TlfCryptKeyServerHalf, UserId,
};

struct ClientConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl ClientConnection {
    fn open(addr: &str, read_timeout_ms: u64, write_timeout_ms: u64) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(KeyServerError::Network)?;
        stream.set_nodelay(true).map_err(KeyServerError::Network)?;
        if read_timeout_ms > 0 {
            stream
                .set_read_timeout(Some(Duration::from_millis(read_timeout_ms)))
                .map_err(KeyServerError::Network)?;
        }
        if write_timeout_ms > 0 {
            stream
                .set_write_timeout(Some(Duration::from_millis(write_timeout_ms)))
                .map_err(KeyServerError::Network)?;
        }

        let read_stream = stream.try_clone().map_err(KeyServerError::Network)?;
        tracing::debug!("Connected to key server at {}", addr);

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    fn round_trip(&mut self, request: &Request) -> Result<Response> {
        write_request(&mut self.writer, request)?;
        read_response(&mut self.reader)
    }
}

/// Key server reached over TCP
pub struct KeyServerRemote {
    addr: String,
    read_timeout_ms: u64,
    write_timeout_ms: u64,

    /// None after a failed call, until the next call reconnects
    connection: Mutex<Option<ClientConnection>>,
}

impl KeyServerRemote {
    /// Connect to the server at `addr`, with timeouts taken from `config`
    pub fn connect(addr: &str, config: &Config) -> Result<Self> {
        let connection =
            ClientConnection::open(addr, config.read_timeout_ms, config.write_timeout_ms)?;

        Ok(Self {
            addr: addr.to_string(),
            read_timeout_ms: config.read_timeout_ms,
            write_timeout_ms: config.write_timeout_ms,
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Address this client is connected to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Round-trip a health check
    pub fn ping(&self) -> Result<()> {
        match self.call(&Request::Ping)? {
            Some(payload) if payload == b"PONG" => Ok(()),
            other => Err(KeyServerError::Protocol(format!(
                "unexpected PING reply: {:?}",
                other
            ))),
        }
    }

    fn call(&self, request: &Request) -> Result<Option<Vec<u8>>> {
        let mut slot = self.connection.lock();
        let reused = slot.is_some();

        let mut response = self.exchange(&mut *slot, request);
        if reused && matches!(&response, Err(e) if e.is_disconnect()) {
            tracing::debug!("Connection to {} was closed, reconnecting", self.addr);
            response = self.exchange(&mut *slot, request);
        }

        response?.into_result()
    }

    /// Send one request and read its reply
    ///
    /// The connection goes back into `slot` only if the exchange completed.
    fn exchange(
        &self,
        slot: &mut Option<ClientConnection>,
        request: &Request,
    ) -> Result<Response> {
        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => ClientConnection::open(&self.addr, self.read_timeout_ms, self.write_timeout_ms)?,
        };

        match connection.round_trip(request) {
            Ok(response) => {
                *slot = Some(connection);
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(
                    "Dropping connection to {} after {:?} failed: {}",
                    self.addr,
                    request.request_type(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Call and require a value, validating its width through `parse`
    fn fetch<T>(&self, request: &Request, parse: fn(&[u8]) -> Result<T>) -> Result<T> {
        match self.call(request)? {
            Some(payload) => parse(&payload),
            None => Err(KeyServerError::Protocol(format!(
                "{:?} reply carried no value",
                request.request_type()
            ))),
        }
    }

    /// Call and require an empty acknowledgement
    fn execute(&self, request: &Request) -> Result<()> {
        match self.call(request)? {
            None => Ok(()),
            Some(payload) => Err(KeyServerError::Protocol(format!(
                "{:?} reply carried {} unexpected bytes",
                request.request_type(),
                payload.len()
            ))),
        }
    }
}

impl KeyOps for KeyServerRemote {
    fn get_block_crypt_key_server_half(&self, id: &BlockId) -> Result<BlockCryptKeyServerHalf> {
        self.fetch(
            &Request::GetBlockHalf { id: *id },
            BlockCryptKeyServerHalf::from_slice,
        )
    }

    fn put_block_crypt_key_server_half(
        &self,
        id: &BlockId,
        server_half: &BlockCryptKeyServerHalf,
    ) -> Result<()> {
        self.execute(&Request::PutBlockHalf {
            id: *id,
            server_half: *server_half,
        })
    }

    fn delete_block_crypt_key_server_half(&self, id: &BlockId) -> Result<()> {
        self.execute(&Request::DeleteBlockHalf { id: *id })
    }

    fn get_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<TlfCryptKeyServerHalf> {
        self.fetch(
            &Request::GetTlfHalf {
                id: ServerHalfId::new(*dir, key_gen, *device_key),
            },
            TlfCryptKeyServerHalf::from_slice,
        )
    }

    fn put_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
        server_half: &TlfCryptKeyServerHalf,
    ) -> Result<()> {
        self.execute(&Request::PutTlfHalf {
            id: ServerHalfId::new(*dir, key_gen, *device_key),
            server_half: *server_half,
        })
    }

    fn delete_tlf_crypt_key_server_half(
        &self,
        dir: &DirId,
        key_gen: KeyGen,
        device_key: &CryptPublicKey,
    ) -> Result<()> {
        self.execute(&Request::DeleteTlfHalf {
            id: ServerHalfId::new(*dir, key_gen, *device_key),
        })
    }

    fn get_mac_public_key(&self, user: &UserId) -> Result<MacPublicKey> {
        self.fetch(
            &Request::GetMacPublicKey { user: *user },
            MacPublicKey::from_slice,
        )
    }

    fn put_mac_public_key(&self, user: &UserId, key: &MacPublicKey) -> Result<()> {
        self.execute(&Request::PutMacPublicKey {
            user: *user,
            key: *key,
        })
    }
}

impl std::fmt::Debug for KeyServerRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyServerRemote")
            .field("addr", &self.addr)
            .finish()
    }
}
