//! Response definitions
//!
//! Represents responses to clients.

use crate::error::{KeyServerError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    LengthMismatch = 0x02,
    Error = 0x03,
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (value for gets, lengths for LENGTH_MISMATCH,
    /// message for ERROR)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    /// Create a LENGTH_MISMATCH response carrying both lengths
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&(expected as u32).to_be_bytes());
        payload.extend_from_slice(&(actual as u32).to_be_bytes());
        Self {
            status: Status::LengthMismatch,
            payload: Some(payload),
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Map the outcome of a key operation onto a response
    pub fn from_result(result: Result<Option<Vec<u8>>>) -> Self {
        match result {
            Ok(payload) => Response::ok(payload),
            Err(KeyServerError::NotFound) => Response::not_found(),
            Err(KeyServerError::LengthMismatch { expected, actual }) => {
                Response::length_mismatch(expected, actual)
            }
            Err(e) => Response::error(&e.to_string()),
        }
    }

    /// Turn a received response back into the error taxonomy
    pub fn into_result(self) -> Result<Option<Vec<u8>>> {
        match self.status {
            Status::Ok => Ok(self.payload),
            Status::NotFound => Err(KeyServerError::NotFound),
            Status::LengthMismatch => {
                let payload = self.payload.unwrap_or_default();
                if payload.len() != 8 {
                    return Err(KeyServerError::Protocol(format!(
                        "LENGTH_MISMATCH payload must be 8 bytes, got {}",
                        payload.len()
                    )));
                }
                let expected = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let actual = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
                Err(KeyServerError::length_mismatch(
                    expected as usize,
                    actual as usize,
                ))
            }
            Status::Error => {
                let message = self.payload.unwrap_or_default();
                Err(KeyServerError::Remote(
                    String::from_utf8_lossy(&message).into_owned(),
                ))
            }
        }
    }
}
