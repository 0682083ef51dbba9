//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! Each entry goes out as one whole frame. If writing it fails partway the
//! file is cut back to the end of the previous entry; if even that fails
//! the writer refuses further appends.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{RawKvError, Result};
use super::{Mutation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    current_lsn: u64,

    /// File length up to the end of the last complete entry
    valid_len: u64,

    /// Set when a failed append could not be rolled back
    poisoned: bool,
    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// LSNs continue after the last valid entry already in the file.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = WalRecovery::verify(path)?.last_lsn;
        Self::open_at(path, sync_strategy, last_lsn)
    }

    /// Open a WAL file whose last valid LSN is already known
    pub(crate) fn open_at(path: &Path, sync_strategy: WalSyncStrategy, last_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let valid_len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            current_lsn: last_lsn,
            valid_len,
            poisoned: false,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append a batch to the WAL and return its LSN
    ///
    /// The entry reaches the OS before this returns; fsync follows the
    /// configured strategy.
    pub fn append(&mut self, batch: &[Mutation]) -> Result<u64> {
        if self.poisoned {
            return Err(RawKvError::WalWrite(format!(
                "{:?} holds a partial entry after a failed append",
                self.path
            )));
        }
        let lsn = self.current_lsn + 1;
        let frame = WalEntry::new(lsn, batch.to_vec()).serialize()?;

        if let Err(e) = self.file.write_all(&frame) {
            self.roll_back(lsn);
            return Err(RawKvError::WalWrite(format!("append LSN {}: {}", lsn, e)));
        }
        self.valid_len += frame.len() as u64;
        self.current_lsn = lsn;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Cut off whatever part of entry `lsn` reached the file
    fn roll_back(&mut self, lsn: u64) {
        match self.file.set_len(self.valid_len) {
            Ok(()) => {
                tracing::warn!("WAL append of LSN {} failed, rolled back to {} bytes", lsn, self.valid_len);
            }
            Err(e) => {
                self.poisoned = true;
                tracing::error!("WAL append of LSN {} failed and could not be rolled back: {}", lsn, e);
            }
        }
    }

    /// Whether a failed append left the file unusable
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry (after the state they describe is durable elsewhere)
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.valid_len = 0;
        self.poisoned = false;
        self.unsynced = 0;
        tracing::debug!("WAL {:?} truncated at LSN {}", self.path, self.current_lsn);
        Ok(())
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Path of the WAL file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
