//! Column-family key codec
//!
//! ```text
//! ┌──────────────┬───────────┬──────────────┐
//! │ cf_len (4 BE)│ cf bytes  │   raw key    │
//! └──────────────┴───────────┴──────────────┘
//! ```
//!
//! The length prefix makes the encoding injective, and all keys of one
//! column family share a prefix, so byte order within a column family is
//! raw-key order.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{RawKvError, Result};

/// Size of the column family length field
pub const CF_LEN_SIZE: usize = 4;

/// Engine key for `key` in column family `cf`
pub fn key_with_cf(cf: &str, key: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(CF_LEN_SIZE + cf.len() + key.len());
    buf.put_u32(cf.len() as u32);
    buf.put_slice(cf.as_bytes());
    buf.put_slice(key);
    buf.to_vec()
}

/// Prefix shared by every engine key of `cf`
pub fn cf_prefix(cf: &str) -> Vec<u8> {
    key_with_cf(cf, &[])
}

/// Split an engine key back into `(cf, raw key)`
pub fn split_cf_key(physical: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut buf = physical;
    if buf.remaining() < CF_LEN_SIZE {
        return Err(RawKvError::Storage(format!(
            "engine key too short: {} bytes",
            physical.len()
        )));
    }

    let cf_len = buf.get_u32() as usize;
    if buf.remaining() < cf_len {
        return Err(RawKvError::Storage(format!(
            "engine key truncated: cf length {}, {} bytes left",
            cf_len,
            buf.remaining()
        )));
    }

    let cf = std::str::from_utf8(&buf[..cf_len])
        .map_err(|e| RawKvError::Storage(format!("cf name is not UTF-8: {}", e)))?
        .to_string();
    let key = buf[cf_len..].to_vec();
    Ok((cf, key))
}
