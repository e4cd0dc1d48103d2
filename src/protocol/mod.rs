//! Protocol Module
//!
//! Defines the wire protocol between `KeyServerRemote` and `Server`.
//!
//! ### Request Types
//! - 0x01: GET_BLOCK  - Payload: BlockId
//! - 0x02: PUT_BLOCK  - Payload: BlockId + half
//! - 0x03: DEL_BLOCK  - Payload: BlockId
//! - 0x04: GET_TLF    - Payload: ServerHalfId
//! - 0x05: PUT_TLF    - Payload: ServerHalfId + half
//! - 0x06: DEL_TLF    - Payload: ServerHalfId
//! - 0x07: GET_MAC    - Payload: UserId
//! - 0x08: PUT_MAC    - Payload: UserId + MacPublicKey
//! - 0x09: PING       - Payload: empty
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: LENGTH_MISMATCH
//! - 0x03: ERROR

mod frame;
mod request;
mod response;

pub use frame::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use request::{Request, RequestType};
pub use response::{Response, Status};
