//! Request and response messages
//!
//! Every response carries its own `error` field: an empty string means the
//! operation succeeded, anything else is the failure message.

use serde::{Deserialize, Serialize};

/// Message type byte shared by a request and its response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    RawGet = 0x01,
    RawPut = 0x02,
    RawDelete = 0x03,
    RawScan = 0x04,
    Ping = 0x05,
}

impl MessageType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MessageType::RawGet),
            0x02 => Some(MessageType::RawPut),
            0x03 => Some(MessageType::RawDelete),
            0x04 => Some(MessageType::RawScan),
            0x05 => Some(MessageType::Ping),
            _ => None,
        }
    }
}

/// Routing metadata; passed through to storage untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub region_id: u64,
    pub peer_id: u64,
    pub term: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGetRequest {
    pub context: Context,
    pub cf: String,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPutRequest {
    pub context: Context,
    pub cf: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeleteRequest {
    pub context: Context,
    pub cf: String,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScanRequest {
    pub context: Context,
    pub cf: String,
    pub start_key: Vec<u8>,
    /// Maximum number of pairs returned
    pub limit: u32,
}

/// Any request the server accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    RawGet(RawGetRequest),
    RawPut(RawPutRequest),
    RawDelete(RawDeleteRequest),
    RawScan(RawScanRequest),
    /// Health check
    Ping,
}

impl Request {
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::RawGet(_) => MessageType::RawGet,
            Request::RawPut(_) => MessageType::RawPut,
            Request::RawDelete(_) => MessageType::RawDelete,
            Request::RawScan(_) => MessageType::RawScan,
            Request::Ping => MessageType::Ping,
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGetResponse {
    pub value: Vec<u8>,
    pub not_found: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPutResponse {
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeleteResponse {
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScanResponse {
    pub kvs: Vec<KvPair>,
    pub error: String,
}

/// Any response the server sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    RawGet(RawGetResponse),
    RawPut(RawPutResponse),
    RawDelete(RawDeleteResponse),
    RawScan(RawScanResponse),
    Pong,
}

impl Response {
    pub fn message_type(&self) -> MessageType {
        match self {
            Response::RawGet(_) => MessageType::RawGet,
            Response::RawPut(_) => MessageType::RawPut,
            Response::RawDelete(_) => MessageType::RawDelete,
            Response::RawScan(_) => MessageType::RawScan,
            Response::Pong => MessageType::Ping,
        }
    }

    /// Error reported by the operation; empty on success
    pub fn error(&self) -> &str {
        match self {
            Response::RawGet(r) => &r.error,
            Response::RawPut(r) => &r.error,
            Response::RawDelete(r) => &r.error,
            Response::RawScan(r) => &r.error,
            Response::Pong => "",
        }
    }
}
