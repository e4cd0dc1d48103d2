//! Request definitions
//!
//! Represents calls a remote client makes against a key server.

use crate::keyspace::ServerHalfId;
use crate::types::{BlockCryptKeyServerHalf, BlockId, MacPublicKey, TlfCryptKeyServerHalf, UserId};

/// Request types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    GetBlockHalf = 0x01,
    PutBlockHalf = 0x02,
    DeleteBlockHalf = 0x03,
    GetTlfHalf = 0x04,
    PutTlfHalf = 0x05,
    DeleteTlfHalf = 0x06,
    GetMacPublicKey = 0x07,
    PutMacPublicKey = 0x08,
    Ping = 0x09,
}

impl TryFrom<u8> for RequestType {
    type Error = u8;

    fn try_from(byte: u8) -> std::result::Result<Self, u8> {
        Ok(match byte {
            0x01 => RequestType::GetBlockHalf,
            0x02 => RequestType::PutBlockHalf,
            0x03 => RequestType::DeleteBlockHalf,
            0x04 => RequestType::GetTlfHalf,
            0x05 => RequestType::PutTlfHalf,
            0x06 => RequestType::DeleteTlfHalf,
            0x07 => RequestType::GetMacPublicKey,
            0x08 => RequestType::PutMacPublicKey,
            0x09 => RequestType::Ping,
            other => return Err(other),
        })
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetBlockHalf {
        id: BlockId,
    },
    PutBlockHalf {
        id: BlockId,
        server_half: BlockCryptKeyServerHalf,
    },
    DeleteBlockHalf {
        id: BlockId,
    },
    GetTlfHalf {
        id: ServerHalfId,
    },
    PutTlfHalf {
        id: ServerHalfId,
        server_half: TlfCryptKeyServerHalf,
    },
    DeleteTlfHalf {
        id: ServerHalfId,
    },
    GetMacPublicKey {
        user: UserId,
    },
    PutMacPublicKey {
        user: UserId,
        key: MacPublicKey,
    },

    /// Health check
    Ping,
}

impl Request {
    /// Get the request type
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::GetBlockHalf { .. } => RequestType::GetBlockHalf,
            Request::PutBlockHalf { .. } => RequestType::PutBlockHalf,
            Request::DeleteBlockHalf { .. } => RequestType::DeleteBlockHalf,
            Request::GetTlfHalf { .. } => RequestType::GetTlfHalf,
            Request::PutTlfHalf { .. } => RequestType::PutTlfHalf,
            Request::DeleteTlfHalf { .. } => RequestType::DeleteTlfHalf,
            Request::GetMacPublicKey { .. } => RequestType::GetMacPublicKey,
            Request::PutMacPublicKey { .. } => RequestType::PutMacPublicKey,
            Request::Ping => RequestType::Ping,
        }
    }
}
