//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{RawKvError, Result};

/// Frame header size: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound for a single encoded entry (256 MB)
pub const MAX_ENTRY_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL: one committed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Mutations of the batch, in submission order
    pub batch: Vec<Mutation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// A single physical-key mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Set a key to a value
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Remove a key
    Delete { key: Vec<u8> },
}

impl Mutation {
    /// The physical key touched by this mutation
    pub fn key(&self) -> &[u8] {
        match self {
            Mutation::Set { key, .. } => key,
            Mutation::Delete { key } => key,
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, batch: Vec<Mutation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            batch,
            timestamp,
        }
    }

    /// Encode the entry as a complete frame (header + payload)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        if payload.len() > MAX_ENTRY_SIZE as usize {
            return Err(RawKvError::WalWrite(format!(
                "entry too large: {} bytes (max {})",
                payload.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&compute_crc(&payload).to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a complete frame produced by [`WalEntry::serialize`]
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(RawKvError::WalCorruption(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let header = FrameHeader::parse(&bytes[..HEADER_SIZE]);
        let total = HEADER_SIZE + header.len as usize;
        if bytes.len() < total {
            return Err(RawKvError::WalCorruption(format!(
                "incomplete payload: expected {} bytes, got {}",
                header.len,
                bytes.len() - HEADER_SIZE
            )));
        }

        let entry = header.decode_payload(&bytes[HEADER_SIZE..total])?;
        Ok((entry, total))
    }
}

/// CRC32 of a frame payload
pub(crate) fn compute_crc(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Parsed fixed-size frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8]) -> Self {
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[12..16]);

        Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        }
    }

    /// Verify the checksum and decode the payload
    pub(crate) fn decode_payload(&self, payload: &[u8]) -> Result<WalEntry> {
        let actual = compute_crc(payload);
        if actual != self.crc {
            return Err(RawKvError::WalCorruption(format!(
                "CRC mismatch at LSN {}: stored {:08x}, computed {:08x}",
                self.lsn, self.crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| RawKvError::WalCorruption(format!("undecodable entry: {}", e)))?;
        if entry.lsn != self.lsn {
            return Err(RawKvError::WalCorruption(format!(
                "LSN mismatch: header {}, payload {}",
                self.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}
