//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;
use super::reader::Frame;
use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted frame
    /// 3. Truncate the file after the last valid frame
    /// 4. Return all valid entries in order
    ///
    /// A missing file recovers as empty.
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        if !path.exists() {
            return Ok((Vec::new(), RecoveryResult::default()));
        }

        let (entries, result, valid_len) = Self::scan(path)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            tracing::warn!(
                "WAL {:?} truncated to {} bytes after LSN {}",
                path,
                valid_len,
                result.last_lsn
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        if !path.exists() {
            return Ok(RecoveryResult::default());
        }
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut valid_len = 0;

        loop {
            match reader.read_frame()? {
                Frame::Entry(entry) if entry.lsn <= result.last_lsn => {
                    tracing::warn!(
                        "WAL {:?}: LSN {} does not follow {}",
                        path,
                        entry.lsn,
                        result.last_lsn
                    );
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
                Frame::Entry(entry) => {
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    valid_len = reader.position();
                    entries.push(entry);
                }
                Frame::End => break,
                Frame::Torn => {
                    result.was_truncated = true;
                    break;
                }
                Frame::Corrupt(reason) => {
                    tracing::warn!("WAL {:?}: {}", path, reason);
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
            }
        }

        Ok((entries, result, valid_len))
    }
}
