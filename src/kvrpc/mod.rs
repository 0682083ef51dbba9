//! kvrpc Module
//!
//! Messages of the raw key-value API and their wire encoding.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │      bincode payload        │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Message Types
//! - 0x01: RAW_GET    - RawGetRequest / RawGetResponse
//! - 0x02: RAW_PUT    - RawPutRequest / RawPutResponse
//! - 0x03: RAW_DELETE - RawDeleteRequest / RawDeleteResponse
//! - 0x04: RAW_SCAN   - RawScanRequest / RawScanResponse
//! - 0x05: PING       - empty / empty
//!
//! A response uses the type byte of its request.

mod message;
mod codec;

pub use message::{
    Context, KvPair, MessageType, RawDeleteRequest, RawDeleteResponse, RawGetRequest,
    RawGetResponse, RawPutRequest, RawPutResponse, RawScanRequest, RawScanResponse, Request,
    Response,
};
pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
