//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{RawKvError, Result};
use super::entry::FrameHeader;
use super::{WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};

/// Outcome of reading one frame
#[derive(Debug)]
pub(crate) enum Frame {
    /// A valid entry
    Entry(WalEntry),
    /// Clean end of file on a frame boundary
    End,
    /// The file ends in the middle of a frame (partial write)
    Torn,
    /// A complete frame that fails validation
    Corrupt(String),
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset just past the last valid frame
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file; partial or corrupt
    /// frames are reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Torn => Err(RawKvError::WalCorruption(format!(
                "partial entry at offset {}",
                self.position
            ))),
            Frame::Corrupt(reason) => Err(RawKvError::WalCorruption(reason)),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Offset just past the last frame that was read successfully
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn read_frame(&mut self) -> Result<Frame> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header_bytes)?;
        if read == 0 {
            return Ok(Frame::End);
        }
        if read < HEADER_SIZE {
            return Ok(Frame::Torn);
        }

        let header = FrameHeader::parse(&header_bytes);
        if header.len > MAX_ENTRY_SIZE {
            return Ok(Frame::Corrupt(format!(
                "entry length {} exceeds maximum {}",
                header.len, MAX_ENTRY_SIZE
            )));
        }

        let mut payload = vec![0u8; header.len as usize];
        let read = read_full(&mut self.reader, &mut payload)?;
        if read < payload.len() {
            return Ok(Frame::Torn);
        }

        match header.decode_payload(&payload) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + payload.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(RawKvError::WalCorruption(reason)) => Ok(Frame::Corrupt(reason)),
            Err(e) => Err(e),
        }
    }
}

/// Iterator over WAL entries
///
/// Stops after the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the file allows, returning the byte count
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
