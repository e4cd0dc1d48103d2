//! Protocol framing
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Request Type
//! Payloads are bincode encodings (fixed-width integers, arrays inline):
//! - GET_BLOCK / DEL_BLOCK:  BlockId
//! - PUT_BLOCK:              (BlockId, BlockCryptKeyServerHalf)
//! - GET_TLF / DEL_TLF:      ServerHalfId
//! - PUT_TLF:                (ServerHalfId, TlfCryptKeyServerHalf)
//! - GET_MAC:                UserId
//! - PUT_MAC:                (UserId, MacPublicKey)
//! - PING:                   empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{BincodeCodec, Codec};
use crate::error::{KeyServerError, Result};

use super::{Request, RequestType, Response, Status};

/// Header size: 1 byte type/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Bytes> {
    let codec = BincodeCodec;
    let payload = match request {
        Request::GetBlockHalf { id } | Request::DeleteBlockHalf { id } => codec.encode(id)?,
        Request::PutBlockHalf { id, server_half } => codec.encode(&(id, server_half))?,
        Request::GetTlfHalf { id } | Request::DeleteTlfHalf { id } => codec.encode(id)?,
        Request::PutTlfHalf { id, server_half } => codec.encode(&(id, server_half))?,
        Request::GetMacPublicKey { user } => codec.encode(user)?,
        Request::PutMacPublicKey { user, key } => codec.encode(&(user, key))?,
        Request::Ping => Vec::new(),
    };

    Ok(frame(request.request_type() as u8, &payload))
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (type_byte, payload) = split_frame(bytes)?;
    let request_type = RequestType::try_from(type_byte).map_err(|b| {
        KeyServerError::Protocol(format!("Unknown request type: 0x{:02x}", b))
    })?;

    let codec = BincodeCodec;
    let request = match request_type {
        RequestType::GetBlockHalf => Request::GetBlockHalf {
            id: codec.decode(payload)?,
        },
        RequestType::PutBlockHalf => {
            let (id, server_half) = codec.decode(payload)?;
            Request::PutBlockHalf { id, server_half }
        }
        RequestType::DeleteBlockHalf => Request::DeleteBlockHalf {
            id: codec.decode(payload)?,
        },
        RequestType::GetTlfHalf => Request::GetTlfHalf {
            id: codec.decode(payload)?,
        },
        RequestType::PutTlfHalf => {
            let (id, server_half) = codec.decode(payload)?;
            Request::PutTlfHalf { id, server_half }
        }
        RequestType::DeleteTlfHalf => Request::DeleteTlfHalf {
            id: codec.decode(payload)?,
        },
        RequestType::GetMacPublicKey => Request::GetMacPublicKey {
            user: codec.decode(payload)?,
        },
        RequestType::PutMacPublicKey => {
            let (user, key) = codec.decode(payload)?;
            Request::PutMacPublicKey { user, key }
        }
        RequestType::Ping => {
            if !payload.is_empty() {
                return Err(KeyServerError::Protocol(format!(
                    "PING request: unexpected payload of {} bytes",
                    payload.len()
                )));
            }
            Request::Ping
        }
    };

    Ok(request)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Bytes {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes)?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::LengthMismatch,
        0x03 => Status::Error,
        _ => {
            return Err(KeyServerError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete request from a stream
///
/// Blocks until a complete request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let message = read_frame(reader)?;
    decode_request(&message)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    write_frame(writer, &bytes)
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader)?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_frame(writer, &encode_response(response))
}

// =============================================================================
// Private Helpers
// =============================================================================

fn frame(code: u8, payload: &[u8]) -> Bytes {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(code);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.freeze()
}

/// Validate a complete frame and split it into its code and payload
fn split_frame(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(KeyServerError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let code = header.get_u8();
    let payload_len = header.get_u32();
    check_payload_len(payload_len)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(KeyServerError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok((code, &bytes[HEADER_SIZE..total_len]))
}

fn check_payload_len(payload_len: u32) -> Result<()> {
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(KeyServerError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn read_frame<R: Read>(reader: &mut R) -> Result<BytesMut> {
    let mut header = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut header)
        .map_err(KeyServerError::Network)?;

    let payload_len = (&header[1..]).get_u32();
    check_payload_len(payload_len)?;

    let mut message = BytesMut::zeroed(HEADER_SIZE + payload_len as usize);
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader
        .read_exact(&mut message[HEADER_SIZE..])
        .map_err(KeyServerError::Network)?;

    Ok(message)
}

fn write_frame<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).map_err(KeyServerError::Network)?;
    writer.flush().map_err(KeyServerError::Network)?;
    Ok(())
}
