//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ### Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! `Len` is big-endian. The payload is the bincode encoding of the
//! request/response struct named by `Type`; PING frames have no payload.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RawKvError, Result};
use super::{MessageType, Request, Response};

/// Header size: 1 byte message type + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (64 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

// =============================================================================
// Framing
// =============================================================================

fn frame(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(RawKvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(message_type as u8);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    Ok(message)
}

/// Split a complete frame into its type and payload
fn unframe(bytes: &[u8]) -> Result<(MessageType, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(RawKvError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let type_byte = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(RawKvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(RawKvError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let message_type = MessageType::from_u8(type_byte).ok_or_else(|| {
        RawKvError::Protocol(format!("Unknown message type: 0x{:02x}", type_byte))
    })?;

    Ok((message_type, &bytes[HEADER_SIZE..total_len]))
}

fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| RawKvError::Protocol(format!("encode failed: {}", e)))
}

fn decode_payload<T: DeserializeOwned>(message_type: MessageType, payload: &[u8]) -> Result<T> {
    bincode::deserialize(payload)
        .map_err(|e| RawKvError::Protocol(format!("{:?} payload: {}", message_type, e)))
}

fn expect_empty(message_type: MessageType, payload: &[u8]) -> Result<()> {
    if !payload.is_empty() {
        return Err(RawKvError::Protocol(format!(
            "{:?}: unexpected payload of {} bytes",
            message_type,
            payload.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let payload = match request {
        Request::RawGet(r) => encode_payload(r)?,
        Request::RawPut(r) => encode_payload(r)?,
        Request::RawDelete(r) => encode_payload(r)?,
        Request::RawScan(r) => encode_payload(r)?,
        Request::Ping => Vec::new(),
    };
    frame(request.message_type(), &payload)
}

/// Decode a request from a complete frame
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (message_type, payload) = unframe(bytes)?;
    match message_type {
        MessageType::RawGet => Ok(Request::RawGet(decode_payload(message_type, payload)?)),
        MessageType::RawPut => Ok(Request::RawPut(decode_payload(message_type, payload)?)),
        MessageType::RawDelete => Ok(Request::RawDelete(decode_payload(message_type, payload)?)),
        MessageType::RawScan => Ok(Request::RawScan(decode_payload(message_type, payload)?)),
        MessageType::Ping => {
            expect_empty(message_type, payload)?;
            Ok(Request::Ping)
        }
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let payload = match response {
        Response::RawGet(r) => encode_payload(r)?,
        Response::RawPut(r) => encode_payload(r)?,
        Response::RawDelete(r) => encode_payload(r)?,
        Response::RawScan(r) => encode_payload(r)?,
        Response::Pong => Vec::new(),
    };
    frame(response.message_type(), &payload)
}

/// Decode a response from a complete frame
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (message_type, payload) = unframe(bytes)?;
    match message_type {
        MessageType::RawGet => Ok(Response::RawGet(decode_payload(message_type, payload)?)),
        MessageType::RawPut => Ok(Response::RawPut(decode_payload(message_type, payload)?)),
        MessageType::RawDelete => Ok(Response::RawDelete(decode_payload(message_type, payload)?)),
        MessageType::RawScan => Ok(Response::RawScan(decode_payload(message_type, payload)?)),
        MessageType::Ping => {
            expect_empty(message_type, payload)?;
            Ok(Response::Pong)
        }
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame from a stream
///
/// Blocks until the frame is complete or an error occurs
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(RawKvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut message[HEADER_SIZE..])?;
    }
    Ok(message)
}

/// Read a complete request from a stream
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let message = read_frame(reader)?;
    decode_request(&message)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader)?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
