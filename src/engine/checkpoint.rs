//! Checkpoint file
//!
//! Full copy of the latest live state, written when the engine closes so
//! the WAL can be truncated.
//!
//! ## File Format
//! ```text
//! ┌──────────┬──────────┬─────────┬─────────┬──────────────────┐
//! │Magic (4) │Version(2)│ CRC (4) │ Len (8) │ bincode payload  │
//! └──────────┴──────────┴─────────┴─────────┴──────────────────┘
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RawKvError, Result};

const MAGIC: &[u8; 4] = b"RKVC";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 18;

/// Latest live state at `commit_ts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub commit_ts: u64,

    /// Physical key/value pairs in key order
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Checkpoint {
    /// Write the checkpoint atomically (temp file + rename)
    pub fn write(&self, path: &Path) -> Result<()> {
        let payload = bincode::serialize(self)?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&payload);

        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load the checkpoint at `path`; `None` if there is none
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
            return Err(RawKvError::Storage(format!(
                "{:?} is not a checkpoint file",
                path
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(RawKvError::Storage(format!(
                "unsupported checkpoint version {}",
                version
            )));
        }

        let stored_crc = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[10..18]);
        let len = u64::from_le_bytes(len) as usize;

        let payload = bytes.get(HEADER_SIZE..HEADER_SIZE + len).ok_or_else(|| {
            RawKvError::Storage(format!("checkpoint {:?} is truncated", path))
        })?;
        if crc32fast::hash(payload) != stored_crc {
            return Err(RawKvError::Storage(format!(
                "checkpoint {:?} failed CRC check",
                path
            )));
        }

        Ok(Some(bincode::deserialize(payload)?))
    }
}
